use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::draw::Gradient;

/// Session-wide driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Ask the engine to open its own console window on attach.
    pub with_console: bool,
    /// Seed of the per-object placeholder colors.
    pub placeholder_seed: u64,
    /// Ramp used to paint the extracted field.
    pub gradient: Gradient,
}

impl DriverConfig {
    pub fn new() -> Self {
        Self {
            with_console: true,
            placeholder_seed: 0,
            gradient: Gradient::GreyScale,
        }
    }

    /// Reads a JSON config. Absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config: {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new()
    }
}
