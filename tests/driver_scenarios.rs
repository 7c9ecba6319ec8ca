use anyhow::Result;
use thermosync::sim::change::ChangeDetector;
use thermosync::sim::diagnostics::Diagnostics;
use thermosync::sim::engine::EngineCall;
use thermosync::sim::scene::SceneBufferBuilder;
use thermosync::{
    DriverConfig, EvaluationInput, Face, FieldKind, Gradient, Mesh, Point, RecordingEngine,
    SceneObject, SimulationDriver,
};

/// Triangle fan with `vertex_count` vertices.
fn fan(vertex_count: u32, z: f64) -> Mesh {
    let vertices = (0..vertex_count)
        .map(|i| {
            let a = i as f64;
            Point::new(a.cos(), a.sin(), z)
        })
        .collect();
    let faces = (1..vertex_count.saturating_sub(1))
        .map(|i| Face::triangle(0, i, i + 1))
        .collect();
    Mesh::new(vertices, faces)
}

fn sky_dome(quads: u32) -> Mesh {
    let mut vertices = Vec::new();
    for i in 0..=quads {
        vertices.push(Point::new(i as f64, 0.0, 10.0));
        vertices.push(Point::new(i as f64, 1.0, 10.0));
    }
    let faces = (0..quads)
        .map(|i| Face::quad(2 * i, 2 * i + 2, 2 * i + 3, 2 * i + 1))
        .collect();
    Mesh::new(vertices, faces)
}

fn concrete() -> SceneObject {
    SceneObject::referenced([
        ("kelvin", "293.15"),
        ("density", "2400"),
        ("heat-capacity", "880"),
    ])
}

fn scene() -> EvaluationInput {
    EvaluationInput::new(
        vec![concrete(), concrete(), concrete()],
        vec![fan(3, 0.0), fan(5, 1.0), fan(2, 2.0)],
    )
    .with_sky(sky_dome(2), vec![2.0, 1.0], 4.0)
}

fn driver() -> SimulationDriver<RecordingEngine> {
    let mut config = DriverConfig::default();
    config.with_console = false;
    SimulationDriver::attach(RecordingEngine::new(), config).unwrap()
}

#[test]
fn test_uploaded_layout() -> Result<()> {
    let mut d = driver();
    d.evaluate(&scene())?;

    let geometry = d.engine().loaded_geometry().unwrap();
    let offsets: Vec<u32> = geometry.objects.iter().map(|o| o.vertex_offset).collect();
    assert_eq!(offsets, vec![0, 3, 8]);
    assert_eq!(geometry.vertex_count(), 10);
    assert_eq!(geometry.indices.len(), 3 * (1 + 3));
    assert!(geometry.objects.iter().all(|o| o.heat_conductivity == 1.0));
    assert!(geometry.objects.iter().all(|o| o.density == 2400.0));

    let sky = d.engine().loaded_sky().unwrap();
    assert_eq!(sky.irradiance, vec![500.0, 250.0]);
    assert_eq!(sky.indices.len(), 8);
    Ok(())
}

#[test]
fn test_rebuild_idempotence() {
    let input = scene();
    let builder = SceneBufferBuilder::new(3);
    let mut diag = Diagnostics::new();
    let a = builder
        .build_geometry(&input.objects, &input.meshes, &mut diag)
        .unwrap();
    let b = builder
        .build_geometry(&input.objects, &input.meshes, &mut diag)
        .unwrap();
    assert_eq!(a, b);

    let sky_mesh = input.sky_mesh.as_ref().unwrap();
    let values = input.sky_values.as_ref().unwrap();
    let values = builder
        .sky_irradiance(sky_mesh, values, input.sky_timespan_hours, &mut diag)
        .unwrap();
    let mut det = ChangeDetector::new();
    assert!(det.check_geometry(&input.meshes, false));
    assert!(det.check_sky(&values, false));
    assert!(!det.check_geometry(&input.meshes, false));
    assert!(!det.check_sky(&values, false));
}

#[test]
fn test_irradiance_only_change() -> Result<()> {
    let mut d = driver();
    let mut input = scene();
    d.evaluate(&input)?;
    d.engine_mut().clear_calls();

    input.sky_values = Some(vec![4.0, 1.0]);
    let out = d.evaluate(&input)?;

    assert!(!out.geometry_uploaded);
    assert!(out.sky_updated);
    assert_eq!(out.time_hours, 0.0);
    assert_eq!(d.engine().count("load_geometry"), 0);
    assert_eq!(d.engine().count("simulate"), 0);
    assert_eq!(
        d.engine().calls()[0],
        EngineCall::UpdateSkyValues { quad_count: 2 }
    );
    assert_eq!(d.engine().loaded_sky().unwrap().irradiance, vec![1000.0, 250.0]);
    Ok(())
}

#[test]
fn test_timespan_only_change_updates_sky() -> Result<()> {
    let mut d = driver();
    let mut input = scene();
    input.sky_values = Some(vec![2.0, 2.0]);
    input.sky_timespan_hours = 1.0;
    d.evaluate(&input)?;
    assert_eq!(d.engine().loaded_sky().unwrap().irradiance, vec![2000.0, 2000.0]);

    input.sky_timespan_hours = 4.0;
    let out = d.evaluate(&input)?;
    assert!(!out.geometry_uploaded);
    assert!(out.sky_updated);
    assert_eq!(d.engine().count("update_sky_values"), 1);
    assert_eq!(d.engine().loaded_sky().unwrap().irradiance, vec![500.0, 500.0]);
    Ok(())
}

#[test]
fn test_surplus_sky_values_warn_once_per_evaluation() -> Result<()> {
    let mut d = driver();
    let mut input = scene();
    input.sky_values = Some(vec![2.0, 1.0, 7.0]);
    let out = d.evaluate(&input)?;
    assert!(out.geometry_uploaded);
    assert_eq!(out.diagnostics.warning_count(), 1);
    assert_eq!(d.engine().loaded_sky().unwrap().irradiance, vec![500.0, 250.0]);

    let out = d.evaluate(&input)?;
    assert_eq!(out.diagnostics.warning_count(), 1);
    Ok(())
}

#[test]
fn test_geometry_and_sky_dirty_loads_sky_once() -> Result<()> {
    let mut d = driver();
    d.evaluate(&scene())?;
    assert_eq!(d.engine().count("load_sky"), 1);
    assert_eq!(d.engine().count("update_sky_values"), 0);
    Ok(())
}

#[test]
fn test_reload_sky_flag_pushes_same_values() -> Result<()> {
    let mut d = driver();
    let mut input = scene();
    d.evaluate(&input)?;
    input.reload_sky = true;
    let out = d.evaluate(&input)?;
    assert!(out.sky_updated);
    assert_eq!(d.engine().count("update_sky_values"), 1);
    Ok(())
}

#[test]
fn test_reordered_objects_reupload() -> Result<()> {
    let mut d = driver();
    let mut input = scene();
    d.evaluate(&input)?;
    input.meshes.swap(0, 1);
    let out = d.evaluate(&input)?;
    assert!(out.geometry_uploaded);
    assert_eq!(d.engine().count("unload_scene"), 2);
    Ok(())
}

#[test]
fn test_requested_step_triggers_without_simulate_flag() -> Result<()> {
    let mut d = driver();
    let mut input = scene();
    input.step_size_hours = 0.25;
    input.step_count = 4;
    d.evaluate(&input)?;
    assert_eq!(d.engine().count("simulate"), 0);

    input.requested_step = 3;
    assert!(!input.simulate);
    let out = d.evaluate(&input)?;
    assert!(out.stepped);
    assert_eq!(out.time_hours, 1.0);
    Ok(())
}

#[test]
fn test_steady_state_with_zero_steps() -> Result<()> {
    let mut d = driver();
    let mut input = scene();
    input.simulate = true;
    input.steady_state = true;
    input.step_count = 0;
    let out = d.evaluate(&input)?;
    assert!(out.stepped);
    assert_eq!(out.time_hours, 0.0);
    assert!(d.engine().steady_state());
    assert!(d.engine().calls().contains(&EngineCall::Simulate {
        step_size_hours: 0.1,
        step_count: 0
    }));
    Ok(())
}

#[test]
fn test_time_accumulates_across_evaluations() -> Result<()> {
    let mut d = driver();
    let mut input = scene();
    input.simulate = true;
    input.step_size_hours = 0.5;
    input.step_count = 2;
    d.evaluate(&input)?;
    d.evaluate(&input)?;
    let out = d.evaluate(&input)?;
    assert_eq!(out.time_hours, 3.0);

    input.reset = true;
    input.simulate = false;
    let out = d.evaluate(&input)?;
    assert_eq!(out.time_hours, 0.0);
    Ok(())
}

#[test]
fn test_all_zero_field_maps_to_ramp_end() -> Result<()> {
    let mut d = driver();
    d.engine_mut()
        .script_field(FieldKind::Temperature, vec![0.0; 10]);
    let out = d.evaluate(&scene())?;
    let expected = Gradient::GreyScale.color_at(1.0);
    for mesh in &out.meshes {
        assert!(mesh.vertex_colors.iter().all(|c| *c == expected));
    }
    assert!(out.field.iter().all(|v| *v == 0.0));
    Ok(())
}

#[test]
fn test_hotter_vertices_are_darker() -> Result<()> {
    let mut d = driver();
    let field: Vec<f32> = (0..10).map(|i| 280.0 + i as f32).collect();
    d.engine_mut().script_field(FieldKind::Temperature, field.clone());
    let out = d.evaluate(&scene())?;
    assert_eq!(out.field, field);

    let first = out.meshes[0].vertex_colors[0].0;
    let last = out.meshes[2].vertex_colors[1].0;
    assert!(last < first);
    assert_eq!(last, 0.0);
    Ok(())
}

#[test]
fn test_failed_sky_update_is_not_retried() -> Result<()> {
    let mut d = driver();
    let mut input = scene();
    d.evaluate(&input)?;

    d.engine_mut().fail_on("update_sky_values");
    input.sky_values = Some(vec![3.0, 3.0]);
    assert!(d.evaluate(&input).is_err());

    d.engine_mut().clear_failures();
    d.engine_mut().clear_calls();
    let out = d.evaluate(&input)?;
    assert!(!out.sky_updated);
    assert_eq!(d.engine().count("update_sky_values"), 0);
    // Still the values from the first upload.
    assert_eq!(d.engine().loaded_sky().unwrap().irradiance, vec![500.0, 250.0]);

    input.reload_sky = true;
    let out = d.evaluate(&input)?;
    assert!(out.sky_updated);
    assert_eq!(d.engine().loaded_sky().unwrap().irradiance, vec![750.0, 750.0]);
    Ok(())
}

#[test]
fn test_warnings_do_not_abort() -> Result<()> {
    let mut d = driver();
    let quad = Mesh::new(
        vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(1.0, 1.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
        ],
        vec![Face::quad(0, 1, 2, 3)],
    );
    let input = EvaluationInput::new(vec![SceneObject::unreferenced()], vec![quad]);
    let out = d.evaluate(&input)?;
    // not referenced + blank id + non triangle
    assert_eq!(out.diagnostics.warning_count(), 3);
    assert_eq!(out.field, vec![0.0; 4]);
    let geometry = d.engine().loaded_geometry().unwrap();
    assert_eq!(geometry.indices, vec![0, 1, 2]);
    Ok(())
}

#[test]
fn test_sky_without_values_is_fatal() {
    let mut d = driver();
    let mut input = scene();
    input.sky_values = None;
    assert!(d.evaluate(&input).is_err());
    assert_eq!(d.engine().call_names(), vec!["attach"]);
}

#[test]
fn test_reattach_starts_fresh() -> Result<()> {
    let mut d = driver();
    let mut input = scene();
    input.simulate = true;
    d.evaluate(&input)?;
    let engine = d.detach()?;

    let mut d = SimulationDriver::attach(engine, DriverConfig::default())?;
    assert_eq!(d.state().simulation.time_in_hours, 0.0);
    assert!(d.state().change.geometry_hash().is_none());
    input.simulate = false;
    let out = d.evaluate(&input)?;
    assert!(out.geometry_uploaded);
    Ok(())
}
