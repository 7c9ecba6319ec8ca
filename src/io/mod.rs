//! File I/O for scene inputs and evaluation outputs.

pub mod scene;

pub use scene::{read_scene, write_output, write_scene};
