//! Call contract of the external thermal engine.
//!
//! The driver talks to the engine only through [`ThermalEngine`]. All arrays
//! are flat and tightly packed as `(x, y, z)` or `(r, g, b)` triples. Every
//! call blocks until the engine returns and is never retried by the caller.

#[cfg(feature = "native-engine")]
pub mod native;
pub mod recording;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::sim::properties::ObjectProperties;

pub use recording::{EngineCall, RecordingEngine};

/// Which per-vertex scalar the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Temperature,
    /// Engine-defined derived quantity selected by index (> 0).
    Derived(u32),
}

impl FieldKind {
    /// Maps the front-end selector: positive values pick a derived field,
    /// everything else the temperature.
    pub fn from_selector(selector: i64) -> Self {
        if selector > 0 {
            FieldKind::Derived(u32::try_from(selector).unwrap_or(u32::MAX))
        } else {
            FieldKind::Temperature
        }
    }
}

/// Capability interface of the thermal engine.
pub trait ThermalEngine {
    /// Acquires the engine for a host session.
    fn attach(&mut self, with_console: bool) -> Result<()>;

    /// Releases the engine at the end of a host session.
    fn detach(&mut self) -> Result<()>;

    /// Uploads the scene geometry.
    ///
    /// - `vertices`: `3 * Nv` positions
    /// - `vertex_colors`: `3 * Nv` colors, the engine may write into it
    /// - `indices`: `3 * Nt` mesh-local triangle corners
    /// - `objects`: one record per object, offsets partition the arrays above
    fn load_geometry(
        &mut self,
        vertices: &[f32],
        vertex_colors: &mut [f32],
        indices: &[u32],
        objects: &[ObjectProperties],
    ) -> Result<()>;

    /// Uploads the sky dome: `3 * Ns` vertices, `4 * Nq` quad corners and
    /// `Nq` irradiance values in W/m^2.
    fn load_sky(&mut self, vertices: &[f32], indices: &[u32], irradiance: &[f32]) -> Result<()>;

    /// Replaces the per-quad irradiance of the loaded sky.
    fn update_sky_values(&mut self, irradiance: &[f32]) -> Result<()>;

    /// Discards the loaded geometry and sky.
    fn unload_scene(&mut self) -> Result<()>;

    /// Integrates `step_count` steps of `step_size_hours` each and adds the
    /// elapsed time to `time_hours`.
    fn simulate(&mut self, step_size_hours: f32, step_count: u32, time_hours: &mut f32)
    -> Result<()>;

    /// Discards the accumulated simulation state.
    fn reset_simulation(&mut self) -> Result<()>;

    /// Fills `buffer` (`3 * Nv`) with vertex temperatures.
    fn vertex_temperatures(&mut self, buffer: &mut [f32]) -> Result<()>;

    /// Fills `buffer` (`3 * Nv`) with the derived field `field`.
    fn vertex_values(&mut self, buffer: &mut [f32], field: u32) -> Result<()>;

    fn set_steady_state(&mut self, enabled: bool) -> Result<()>;

    /// Reads the requested field into `buffer`.
    fn read_field(&mut self, buffer: &mut [f32], field: FieldKind) -> Result<()> {
        match field {
            FieldKind::Temperature => self.vertex_temperatures(buffer),
            FieldKind::Derived(index) => self.vertex_values(buffer, index),
        }
    }
}
