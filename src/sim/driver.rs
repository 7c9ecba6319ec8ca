//! Per-evaluation synchronization and stepping of the thermal engine.
//!
//! One call to [`SimulationDriver::evaluate`] runs four stages in order:
//!
//! ```text
//! EvaluationInput ──► ChangeDetector ──► SceneBufferBuilder ──► stepping ──► ResultMapper
//!                     (dirty flags)      (upload if dirty)      (reset/step)  (field + colors)
//! ```
//!
//! Fatal input errors abort before any cached state is touched. Engine
//! failures abort the evaluation and are never retried.

use std::fmt;

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::Mesh;
use crate::sim::change::ChangeDetector;
use crate::sim::config::DriverConfig;
use crate::sim::diagnostics::Diagnostics;
use crate::sim::engine::{FieldKind, ThermalEngine};
use crate::sim::properties::SceneObject;
use crate::sim::result::ResultMapper;
use crate::sim::scene::{SceneBufferBuilder, SkyBuffers};

pub const DEFAULT_STEP_SIZE_HOURS: f64 = 0.1;
pub const DEFAULT_STEP_COUNT: i64 = 1;
pub const DEFAULT_SKY_TIMESPAN_HOURS: f64 = 1.0;
/// Requested step index meaning "no index tracking".
pub const NO_STEP_INDEX: i64 = -1;

fn default_step_size_hours() -> f64 {
    DEFAULT_STEP_SIZE_HOURS
}

fn default_step_count() -> i64 {
    DEFAULT_STEP_COUNT
}

fn default_sky_timespan_hours() -> f64 {
    DEFAULT_SKY_TIMESPAN_HOURS
}

fn default_requested_step() -> i64 {
    NO_STEP_INDEX
}

/// Everything the front end supplies for one evaluation.
///
/// The reload flags have no default and must be present in scene files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub objects: Vec<SceneObject>,
    /// One mesh per object, same order.
    pub meshes: Vec<Mesh>,
    #[serde(default)]
    pub sky_mesh: Option<Mesh>,
    /// Energy per sky face in kWh/m^2 over `sky_timespan_hours`.
    #[serde(default)]
    pub sky_values: Option<Vec<f64>>,
    #[serde(default = "default_sky_timespan_hours")]
    pub sky_timespan_hours: f64,
    pub reload_geometry: bool,
    pub reload_sky: bool,
    #[serde(default = "default_step_size_hours")]
    pub step_size_hours: f64,
    #[serde(default = "default_step_count")]
    pub step_count: i64,
    #[serde(default)]
    pub simulate: bool,
    #[serde(default)]
    pub reset: bool,
    /// A change of this value triggers a step even without `simulate`.
    #[serde(default = "default_requested_step")]
    pub requested_step: i64,
    #[serde(default)]
    pub steady_state: bool,
    /// `0` selects the temperature, positive values a derived field.
    #[serde(default)]
    pub field_selector: i64,
}

impl EvaluationInput {
    /// Input with front-end defaults and no sky.
    pub fn new(objects: Vec<SceneObject>, meshes: Vec<Mesh>) -> Self {
        Self {
            objects,
            meshes,
            sky_mesh: None,
            sky_values: None,
            sky_timespan_hours: DEFAULT_SKY_TIMESPAN_HOURS,
            reload_geometry: false,
            reload_sky: false,
            step_size_hours: DEFAULT_STEP_SIZE_HOURS,
            step_count: DEFAULT_STEP_COUNT,
            simulate: false,
            reset: false,
            requested_step: NO_STEP_INDEX,
            steady_state: false,
            field_selector: 0,
        }
    }

    pub fn with_sky(mut self, mesh: Mesh, values: Vec<f64>, timespan_hours: f64) -> Self {
        self.sky_mesh = Some(mesh);
        self.sky_values = Some(values);
        self.sky_timespan_hours = timespan_hours;
        self
    }

    /// Step size clamped to be non-negative.
    pub fn clamped_step_size(&self) -> f32 {
        self.step_size_hours.max(0.0) as f32
    }

    /// Step count clamped to be non-negative.
    pub fn clamped_step_count(&self) -> u32 {
        u32::try_from(self.step_count.max(0)).unwrap_or(u32::MAX)
    }

    pub fn field(&self) -> FieldKind {
        FieldKind::from_selector(self.field_selector)
    }

    /// Checks the inputs whose absence aborts the evaluation.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.objects.is_empty(), "No geometry supplied");
        ensure!(!self.meshes.is_empty(), "No meshes supplied");
        ensure!(
            self.objects.len() == self.meshes.len(),
            "Geometry count ({}) does not match mesh count ({})",
            self.objects.len(),
            self.meshes.len()
        );
        for (i, mesh) in self.meshes.iter().enumerate() {
            mesh.check_faces().with_context(|| format!("Invalid mesh {i}"))?;
        }
        if let Some(sky_mesh) = &self.sky_mesh {
            if self.sky_values.is_none() {
                bail!("Sky Values missing!");
            }
            sky_mesh.check_faces().context("Invalid sky mesh")?;
        }
        Ok(())
    }
}

/// Time integration state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub time_in_hours: f32,
    pub requested_step_index: i64,
    pub steady_state_enabled: bool,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            time_in_hours: 0.0,
            requested_step_index: NO_STEP_INDEX,
            steady_state_enabled: false,
        }
    }
}

/// All state that persists between evaluations of one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverState {
    pub change: ChangeDetector,
    pub simulation: SimulationState,
    /// `3 * Nv` exchange buffer: placeholder colors on upload, field values on readback.
    pub field_buffer: Vec<f32>,
    pub execution_count: u64,
}

/// What one evaluation produced.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutput {
    /// Input meshes painted with the field.
    pub meshes: Vec<Mesh>,
    /// Raw per-vertex field in mesh order.
    pub field: Vec<f32>,
    pub time_hours: f32,
    pub geometry_uploaded: bool,
    pub sky_updated: bool,
    pub stepped: bool,
    pub diagnostics: Diagnostics,
}

/// Failed engine release. Carries the engine so the release can be retried.
pub struct DetachError<E> {
    pub engine: E,
    pub error: anyhow::Error,
}

impl<E> fmt::Debug for DetachError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetachError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<E> fmt::Display for DetachError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

impl<E> std::error::Error for DetachError<E> {}

/// Drives one engine for the lifetime of a host session.
pub struct SimulationDriver<E: ThermalEngine> {
    engine: E,
    config: DriverConfig,
    builder: SceneBufferBuilder,
    mapper: ResultMapper,
    state: DriverState,
}

impl<E: ThermalEngine> SimulationDriver<E> {
    /// Acquires `engine` for a new session with fresh state.
    pub fn attach(mut engine: E, config: DriverConfig) -> Result<Self> {
        engine
            .attach(config.with_console)
            .context("Failed to attach thermal engine")?;
        log::info!("thermal engine attached");
        Ok(Self {
            engine,
            builder: SceneBufferBuilder::new(config.placeholder_seed),
            mapper: ResultMapper::new(config.gradient),
            config,
            state: DriverState::default(),
        })
    }

    /// Releases the engine and drops all session state.
    ///
    /// On failure the engine comes back inside the error.
    pub fn detach(mut self) -> Result<E, DetachError<E>> {
        self.state = DriverState::default();
        match self.engine.detach() {
            Ok(()) => {
                log::info!("thermal engine detached");
                Ok(self.engine)
            }
            Err(error) => Err(DetachError {
                engine: self.engine,
                error: error.context("Failed to detach thermal engine"),
            }),
        }
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Runs one evaluation.
    pub fn evaluate(&mut self, input: &EvaluationInput) -> Result<EvaluationOutput> {
        self.state.execution_count += 1;
        let mut diagnostics = Diagnostics::new();
        diagnostics.remark(format!(
            "execution counter = {}",
            self.state.execution_count
        ));

        input.validate()?;
        let sky_irradiance = match (&input.sky_mesh, &input.sky_values) {
            (Some(mesh), Some(values)) => Some(self.builder.sky_irradiance(
                mesh,
                values,
                input.sky_timespan_hours,
                &mut diagnostics,
            )?),
            _ => None,
        };

        let step_size = input.clamped_step_size();
        let step_count = input.clamped_step_count();
        diagnostics.remark(format!(
            "step_size = {step_size}, step_count = {step_count}"
        ));

        // Change detection
        let geometry_dirty = self
            .state
            .change
            .check_geometry(&input.meshes, input.reload_geometry);
        let sky_dirty = match &sky_irradiance {
            Some(irradiance) => self.state.change.check_sky(irradiance, input.reload_sky),
            None => false,
        };

        let mut stepping = input.simulate;
        if input.requested_step != self.state.simulation.requested_step_index {
            stepping = true;
            self.state.simulation.requested_step_index = input.requested_step;
        }

        // Upload
        let mut sky_updated = false;
        if geometry_dirty {
            self.upload_scene(input, sky_irradiance, &mut diagnostics)?;
            sky_updated = input.sky_mesh.is_some();
        } else if sky_dirty && let Some(irradiance) = &sky_irradiance {
            self.engine
                .update_sky_values(irradiance)
                .context("Failed to update sky values")?;
            sky_updated = true;
        }

        // Stepping
        if input.reset {
            self.state.simulation.time_in_hours = 0.0;
            self.engine
                .reset_simulation()
                .context("Failed to reset simulation")?;
        }
        if stepping {
            self.step(input.steady_state, step_size, step_count)?;
        }

        // Results
        let vertex_count: usize = input.meshes.iter().map(Mesh::vertex_count).sum();
        if self.state.field_buffer.len() != vertex_count * 3 {
            diagnostics.warning(format!(
                "Field buffer resized from {} to {} floats",
                self.state.field_buffer.len(),
                vertex_count * 3
            ));
            self.state.field_buffer = vec![0.0; vertex_count * 3];
        }
        ResultMapper::extract_field(&mut self.engine, &mut self.state.field_buffer, input.field())?;
        let result = self.mapper.map(&self.state.field_buffer, &input.meshes)?;

        Ok(EvaluationOutput {
            meshes: result.meshes,
            field: result.field,
            time_hours: self.state.simulation.time_in_hours,
            geometry_uploaded: geometry_dirty,
            sky_updated,
            stepped: stepping,
            diagnostics,
        })
    }

    /// Replaces the engine scene with freshly built geometry and sky buffers.
    fn upload_scene(
        &mut self,
        input: &EvaluationInput,
        sky_irradiance: Option<Vec<f32>>,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        self.engine
            .unload_scene()
            .context("Failed to unload scene")?;

        let geometry = self
            .builder
            .build_geometry(&input.objects, &input.meshes, diagnostics)?;
        self.state.field_buffer = geometry.vertex_colors.clone();
        self.engine
            .load_geometry(
                &geometry.vertices,
                &mut self.state.field_buffer,
                &geometry.indices,
                &geometry.objects,
            )
            .context("Failed to load geometry")?;

        let sky = match (&input.sky_mesh, sky_irradiance) {
            (Some(mesh), Some(irradiance)) => self.builder.build_sky(mesh, irradiance)?,
            _ => SkyBuffers::default(),
        };
        self.engine
            .load_sky(&sky.vertices, &sky.indices, &sky.irradiance)
            .context("Failed to load sky")?;
        Ok(())
    }

    /// Applies the steady-state toggle and integrates `step_count` steps.
    ///
    /// Elapsed time is only committed when the engine reports success.
    fn step(&mut self, steady_state: bool, step_size: f32, step_count: u32) -> Result<()> {
        self.engine
            .set_steady_state(steady_state)
            .context("Failed to set steady state")?;
        self.state.simulation.steady_state_enabled = steady_state;

        let mut time_hours = self.state.simulation.time_in_hours;
        self.engine
            .simulate(step_size, step_count, &mut time_hours)
            .context("Simulation step failed")?;
        self.state.simulation.time_in_hours = time_hours;
        Ok(())
    }
}
