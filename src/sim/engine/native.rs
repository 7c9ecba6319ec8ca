//! Bindings to the native `thermal_renderer_lib` engine.
//!
//! Geometry and field buffers are passed with their flat float counts, the sky
//! with element counts, exactly as the library expects. A negative status code
//! is reported as an error; other codes are accepted.

use std::os::raw::c_int;

use anyhow::{Result, bail};

use super::ThermalEngine;
use crate::sim::properties::ObjectProperties;

#[link(name = "thermal_renderer_lib")]
unsafe extern "C" {
    fn load(with_console: bool) -> c_int;
    fn unload() -> c_int;
    fn load_geometry(
        vertices: *const f32,
        vertex_colors: *mut f32,
        vertex_count: u32,
        indices: *const u32,
        indices_count: u32,
        object_properties: *const ObjectProperties,
        object_count: u32,
    ) -> c_int;
    fn load_sky(
        vertices: *const f32,
        vertex_count: u32,
        indices: *const u32,
        values: *const f32,
        quad_count: u32,
    ) -> c_int;
    fn unload_scene() -> c_int;
    fn update_sky_values(values: *const f32, quad_count: u32) -> c_int;
    fn simulate(step_size_hours: f32, time_step_count: u32, time_hours: *mut f32) -> c_int;
    fn reset_simulation() -> c_int;
    fn get_vertex_temperatures(vertex_temperatures: *mut f32, total_vertex_count: u32) -> c_int;
    fn get_vertex_values(values: *mut f32, total_vertex_count: u32, value_type: u32) -> c_int;
    fn set_steady_state(enabled: bool) -> c_int;
}

fn check(call: &str, status: c_int) -> Result<()> {
    if status < 0 {
        bail!("{call} returned status {status}");
    }
    Ok(())
}

fn len_u32(call: &str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| anyhow::anyhow!("{call}: buffer of {len} elements too large"))
}

/// Handle to the process-wide native engine.
///
/// The library keeps global state, so at most one handle should be attached
/// at a time.
#[derive(Debug, Default)]
pub struct NativeEngine {
    _private: (),
}

impl NativeEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThermalEngine for NativeEngine {
    fn attach(&mut self, with_console: bool) -> Result<()> {
        check("load", unsafe { load(with_console) })
    }

    fn detach(&mut self) -> Result<()> {
        check("unload", unsafe { unload() })
    }

    fn load_geometry(
        &mut self,
        vertices: &[f32],
        vertex_colors: &mut [f32],
        indices: &[u32],
        objects: &[ObjectProperties],
    ) -> Result<()> {
        if vertex_colors.len() != vertices.len() {
            bail!(
                "load_geometry: {} colors for {} vertex floats",
                vertex_colors.len(),
                vertices.len()
            );
        }
        let vertex_floats = len_u32("load_geometry", vertices.len())?;
        let index_count = len_u32("load_geometry", indices.len())?;
        let object_count = len_u32("load_geometry", objects.len())?;
        // SAFETY: every pointer is valid for the length passed next to it and
        // the engine does not keep them past the call.
        let status = unsafe {
            load_geometry(
                vertices.as_ptr(),
                vertex_colors.as_mut_ptr(),
                vertex_floats,
                indices.as_ptr(),
                index_count,
                objects.as_ptr(),
                object_count,
            )
        };
        check("load_geometry", status)
    }

    fn load_sky(&mut self, vertices: &[f32], indices: &[u32], irradiance: &[f32]) -> Result<()> {
        if indices.len() != irradiance.len() * 4 {
            bail!(
                "load_sky: {} quad corners for {} values",
                indices.len(),
                irradiance.len()
            );
        }
        let vertex_count = len_u32("load_sky", vertices.len() / 3)?;
        let quad_count = len_u32("load_sky", irradiance.len())?;
        // SAFETY: see load_geometry.
        let status = unsafe {
            load_sky(
                vertices.as_ptr(),
                vertex_count,
                indices.as_ptr(),
                irradiance.as_ptr(),
                quad_count,
            )
        };
        check("load_sky", status)
    }

    fn update_sky_values(&mut self, irradiance: &[f32]) -> Result<()> {
        let quad_count = len_u32("update_sky_values", irradiance.len())?;
        // SAFETY: see load_geometry.
        check("update_sky_values", unsafe {
            update_sky_values(irradiance.as_ptr(), quad_count)
        })
    }

    fn unload_scene(&mut self) -> Result<()> {
        check("unload_scene", unsafe { unload_scene() })
    }

    fn simulate(
        &mut self,
        step_size_hours: f32,
        step_count: u32,
        time_hours: &mut f32,
    ) -> Result<()> {
        // SAFETY: `time_hours` is a valid exclusive reference for the call.
        check("simulate", unsafe {
            simulate(step_size_hours, step_count, time_hours as *mut f32)
        })
    }

    fn reset_simulation(&mut self) -> Result<()> {
        check("reset_simulation", unsafe { reset_simulation() })
    }

    fn vertex_temperatures(&mut self, buffer: &mut [f32]) -> Result<()> {
        let len = len_u32("get_vertex_temperatures", buffer.len())?;
        // SAFETY: see load_geometry.
        check("get_vertex_temperatures", unsafe {
            get_vertex_temperatures(buffer.as_mut_ptr(), len)
        })
    }

    fn vertex_values(&mut self, buffer: &mut [f32], field: u32) -> Result<()> {
        let len = len_u32("get_vertex_values", buffer.len())?;
        // SAFETY: see load_geometry.
        check("get_vertex_values", unsafe {
            get_vertex_values(buffer.as_mut_ptr(), len, field)
        })
    }

    fn set_steady_state(&mut self, enabled: bool) -> Result<()> {
        check("set_steady_state", unsafe { set_steady_state(enabled) })
    }
}
