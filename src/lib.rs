//! Incremental scene synchronization and stepping driver for an external
//! thermal simulation engine.
//!
//! Each evaluation detects which engine buffers are stale, re-uploads only
//! those, steps the simulation, and turns the per-vertex engine output into a
//! numeric field plus painted meshes. See [`sim::driver`] for the pipeline.

pub mod draw;
pub mod geom;
pub mod io;
pub mod sim;
mod uid;

// Prelude
pub use draw::Gradient;
pub use geom::mesh::{Face, Mesh, Rgb};
pub use geom::point::Point;
pub use sim::config::DriverConfig;
pub use sim::driver::{DetachError, EvaluationInput, EvaluationOutput, SimulationDriver};
pub use sim::engine::{FieldKind, RecordingEngine, ThermalEngine};
pub use sim::properties::{ObjectProperties, SceneObject};
pub use uid::UID;
