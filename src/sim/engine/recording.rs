//! In-memory engine that records every call.
//!
//! Used for dry runs and tests. It keeps the uploaded buffers, advances time
//! by `step_size * step_count`, and reports scripted per-vertex fields. When
//! no temperature field is scripted, each vertex reports the `kelvin` of its
//! object.

use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail, ensure};

use super::{FieldKind, ThermalEngine};
use crate::sim::properties::ObjectProperties;

/// One engine call with the argument sizes that matter for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Attach { with_console: bool },
    Detach,
    LoadGeometry {
        vertex_count: usize,
        triangle_count: usize,
        object_count: usize,
    },
    LoadSky { vertex_count: usize, quad_count: usize },
    UpdateSkyValues { quad_count: usize },
    UnloadScene,
    Simulate { step_size_hours: f32, step_count: u32 },
    ResetSimulation,
    VertexTemperatures { len: usize },
    VertexValues { len: usize, field: u32 },
    SetSteadyState(bool),
}

impl EngineCall {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCall::Attach { .. } => "attach",
            EngineCall::Detach => "detach",
            EngineCall::LoadGeometry { .. } => "load_geometry",
            EngineCall::LoadSky { .. } => "load_sky",
            EngineCall::UpdateSkyValues { .. } => "update_sky_values",
            EngineCall::UnloadScene => "unload_scene",
            EngineCall::Simulate { .. } => "simulate",
            EngineCall::ResetSimulation => "reset_simulation",
            EngineCall::VertexTemperatures { .. } => "vertex_temperatures",
            EngineCall::VertexValues { .. } => "vertex_values",
            EngineCall::SetSteadyState(_) => "set_steady_state",
        }
    }
}

/// Geometry as last uploaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedGeometry {
    pub vertices: Vec<f32>,
    pub vertex_colors: Vec<f32>,
    pub indices: Vec<u32>,
    pub objects: Vec<ObjectProperties>,
}

impl LoadedGeometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }
}

/// Sky as last uploaded, irradiance updates applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedSky {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub irradiance: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Vec<EngineCall>,
    attached: bool,
    geometry: Option<LoadedGeometry>,
    sky: Option<LoadedSky>,
    steady_state: bool,
    fields: HashMap<FieldKind, Vec<f32>>,
    failing: HashSet<&'static str>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the per-vertex scalar reported for `field` (one value per vertex).
    pub fn script_field(&mut self, field: FieldKind, per_vertex: Vec<f32>) {
        self.fields.insert(field, per_vertex);
    }

    /// Makes every following call named `call` (see [`EngineCall::name`]) fail.
    pub fn fail_on(&mut self, call: &'static str) {
        self.failing.insert(call);
    }

    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.iter().map(EngineCall::name).collect()
    }

    /// Number of recorded calls named `call`.
    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| c.name() == call).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn loaded_geometry(&self) -> Option<&LoadedGeometry> {
        self.geometry.as_ref()
    }

    pub fn loaded_sky(&self) -> Option<&LoadedSky> {
        self.sky.as_ref()
    }

    pub fn steady_state(&self) -> bool {
        self.steady_state
    }

    fn record(&mut self, call: EngineCall) -> Result<()> {
        let name = call.name();
        self.calls.push(call);
        if self.failing.contains(name) {
            bail!("{name} failed");
        }
        let needs_session = !matches!(name, "attach" | "detach");
        ensure!(!needs_session || self.attached, "{name}: engine not attached");
        Ok(())
    }

    fn fill_field(&self, buffer: &mut [f32], field: FieldKind) -> Result<()> {
        let Some(geometry) = &self.geometry else {
            bail!("no geometry loaded");
        };
        let vertex_count = geometry.vertex_count();
        ensure!(
            buffer.len() == vertex_count * 3,
            "field buffer holds {} floats, expected {}",
            buffer.len(),
            vertex_count * 3
        );

        let per_vertex: Vec<f32> = match self.fields.get(&field) {
            Some(values) => {
                ensure!(
                    values.len() == vertex_count,
                    "scripted field has {} values for {vertex_count} vertices",
                    values.len()
                );
                values.clone()
            }
            None => match field {
                FieldKind::Temperature => {
                    let mut values = vec![0.0; vertex_count];
                    for obj in &geometry.objects {
                        let start = obj.vertex_offset as usize;
                        let end = start + obj.vertex_count as usize;
                        let Some(slot) = values.get_mut(start..end) else {
                            bail!("object range {start}..{end} outside {vertex_count} vertices");
                        };
                        slot.fill(obj.kelvin);
                    }
                    values
                }
                FieldKind::Derived(_) => vec![0.0; vertex_count],
            },
        };

        for (triple, value) in buffer.chunks_exact_mut(3).zip(per_vertex) {
            triple.fill(value);
        }
        Ok(())
    }
}

impl ThermalEngine for RecordingEngine {
    fn attach(&mut self, with_console: bool) -> Result<()> {
        self.record(EngineCall::Attach { with_console })?;
        self.attached = true;
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        self.record(EngineCall::Detach)?;
        self.attached = false;
        self.geometry = None;
        self.sky = None;
        self.steady_state = false;
        Ok(())
    }

    fn load_geometry(
        &mut self,
        vertices: &[f32],
        vertex_colors: &mut [f32],
        indices: &[u32],
        objects: &[ObjectProperties],
    ) -> Result<()> {
        self.record(EngineCall::LoadGeometry {
            vertex_count: vertices.len() / 3,
            triangle_count: indices.len() / 3,
            object_count: objects.len(),
        })?;
        ensure!(vertices.len() % 3 == 0, "vertex array is not made of triples");
        ensure!(indices.len() % 3 == 0, "index array is not made of triangles");
        ensure!(
            vertex_colors.len() == vertices.len(),
            "color array length {} does not match vertex array length {}",
            vertex_colors.len(),
            vertices.len()
        );
        let vertex_total: u32 = objects.iter().map(|o| o.vertex_count).sum();
        let face_total: u32 = objects.iter().map(|o| o.indices_count).sum();
        ensure!(
            vertex_total as usize * 3 == vertices.len(),
            "objects cover {vertex_total} vertices, array holds {}",
            vertices.len() / 3
        );
        ensure!(
            face_total as usize * 3 == indices.len(),
            "objects cover {face_total} faces, array holds {}",
            indices.len() / 3
        );

        self.geometry = Some(LoadedGeometry {
            vertices: vertices.to_vec(),
            vertex_colors: vertex_colors.to_vec(),
            indices: indices.to_vec(),
            objects: objects.to_vec(),
        });
        Ok(())
    }

    fn load_sky(&mut self, vertices: &[f32], indices: &[u32], irradiance: &[f32]) -> Result<()> {
        self.record(EngineCall::LoadSky {
            vertex_count: vertices.len() / 3,
            quad_count: irradiance.len(),
        })?;
        ensure!(
            indices.len() == irradiance.len() * 4,
            "sky has {} quad corners for {} values",
            indices.len(),
            irradiance.len()
        );
        self.sky = Some(LoadedSky {
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
            irradiance: irradiance.to_vec(),
        });
        Ok(())
    }

    fn update_sky_values(&mut self, irradiance: &[f32]) -> Result<()> {
        self.record(EngineCall::UpdateSkyValues {
            quad_count: irradiance.len(),
        })?;
        let Some(sky) = self.sky.as_mut() else {
            bail!("no sky loaded");
        };
        ensure!(
            sky.irradiance.len() == irradiance.len(),
            "sky has {} quads, got {} values",
            sky.irradiance.len(),
            irradiance.len()
        );
        sky.irradiance.copy_from_slice(irradiance);
        Ok(())
    }

    fn unload_scene(&mut self) -> Result<()> {
        self.record(EngineCall::UnloadScene)?;
        self.geometry = None;
        self.sky = None;
        Ok(())
    }

    fn simulate(
        &mut self,
        step_size_hours: f32,
        step_count: u32,
        time_hours: &mut f32,
    ) -> Result<()> {
        self.record(EngineCall::Simulate {
            step_size_hours,
            step_count,
        })?;
        *time_hours += step_size_hours * step_count as f32;
        Ok(())
    }

    fn reset_simulation(&mut self) -> Result<()> {
        self.record(EngineCall::ResetSimulation)
    }

    fn vertex_temperatures(&mut self, buffer: &mut [f32]) -> Result<()> {
        self.record(EngineCall::VertexTemperatures { len: buffer.len() })?;
        self.fill_field(buffer, FieldKind::Temperature)
    }

    fn vertex_values(&mut self, buffer: &mut [f32], field: u32) -> Result<()> {
        self.record(EngineCall::VertexValues {
            len: buffer.len(),
            field,
        })?;
        self.fill_field(buffer, FieldKind::Derived(field))
    }

    fn set_steady_state(&mut self, enabled: bool) -> Result<()> {
        self.record(EngineCall::SetSteadyState(enabled))?;
        self.steady_state = enabled;
        Ok(())
    }
}
