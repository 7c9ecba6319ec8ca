//! Dry run of a scene file against the in-memory engine.
//!
//! Usage: `thermosync <scene.json> [config.json] [evaluations]`

use std::path::Path;

use anyhow::{Context, Result, bail};
use thermosync::io::read_scene;
use thermosync::{DriverConfig, RecordingEngine, SimulationDriver};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        bail!("Usage: {} <scene.json> [config.json] [evaluations]", args[0]);
    }
    let input = read_scene(Path::new(&args[1]))?;
    let config = match args.get(2) {
        Some(path) => DriverConfig::from_json_file(Path::new(path))?,
        None => DriverConfig::default(),
    };
    let evaluations: u32 = match args.get(3) {
        Some(n) => n.parse().with_context(|| format!("Invalid evaluation count: {n}"))?,
        None => 1,
    };

    let mut driver = SimulationDriver::attach(RecordingEngine::new(), config)?;
    for i in 0..evaluations {
        let output = driver.evaluate(&input)?;
        for message in output.diagnostics.messages() {
            println!("{message}");
        }
        let (min, max) = output
            .field
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        println!(
            "evaluation {}: t = {:.3} h, field range [{min:.3}, {max:.3}], uploaded = {}",
            i + 1,
            output.time_hours,
            output.geometry_uploaded
        );
    }
    driver.detach()?;
    Ok(())
}
