//! JSON scene files.
//!
//! A scene file holds one [`EvaluationInput`]. Optional front-end inputs may
//! be left out and take their defaults; the reload flags are required.

use crate::sim::driver::{EvaluationInput, EvaluationOutput};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Writes an evaluation input to a JSON file.
pub fn write_scene(path: &Path, input: &EvaluationInput) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, input)
        .with_context(|| format!("Failed to serialize scene to: {}", path.display()))?;

    Ok(())
}

/// Reads an evaluation input from a JSON file.
pub fn read_scene(path: &Path) -> Result<EvaluationInput> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let input: EvaluationInput = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize scene from: {}", path.display()))?;

    Ok(input)
}

/// Writes an evaluation output (painted meshes, field, time, messages) as JSON.
pub fn write_output(path: &Path, output: &EvaluationOutput) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), output)
        .with_context(|| format!("Failed to serialize output to: {}", path.display()))?;
    Ok(())
}

/// Deserializes an evaluation input from a JSON string.
pub fn scene_from_str(json: &str) -> Result<EvaluationInput> {
    serde_json::from_str(json).context("Failed to deserialize scene from string")
}
