//! Flattening of scene objects and the sky into engine buffers.

use anyhow::{Context, Result, ensure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::Mesh;
use crate::geom::mesh::Rgb;
use crate::sim::diagnostics::Diagnostics;
use crate::sim::properties::{ObjectProperties, SceneObject};

/// Flat geometry arrays plus the per-object property table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryBuffers {
    /// `3 * Nv` positions.
    pub vertices: Vec<f32>,
    /// `3 * Nv` placeholder colors.
    pub vertex_colors: Vec<f32>,
    /// `3 * Nt` mesh-local triangle corners.
    pub indices: Vec<u32>,
    pub objects: Vec<ObjectProperties>,
}

impl GeometryBuffers {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

/// Flat sky arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkyBuffers {
    /// `3 * Ns` positions.
    pub vertices: Vec<f32>,
    /// `4 * Nq` quad corners.
    pub indices: Vec<u32>,
    /// `Nq` irradiance values in W/m^2.
    pub irradiance: Vec<f32>,
}

impl SkyBuffers {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn quad_count(&self) -> usize {
        self.irradiance.len()
    }
}

/// Converts an energy density accumulated over `timespan_hours` to a power density.
///
/// kWh/m^2 over `timespan_hours` → W/m^2.
pub fn to_power_density(energy_kwh_per_m2: f64, timespan_hours: f64) -> f32 {
    (1000.0 * energy_kwh_per_m2 / timespan_hours) as f32
}

/// Builds engine buffers from front-end data.
#[derive(Debug, Clone)]
pub struct SceneBufferBuilder {
    placeholder_seed: u64,
}

impl SceneBufferBuilder {
    pub fn new(placeholder_seed: u64) -> Self {
        Self { placeholder_seed }
    }

    /// Placeholder color of the object at `index`, stable for a given seed.
    ///
    /// It only marks objects before the first field readback.
    pub fn placeholder_color(&self, index: usize) -> Rgb {
        let mut rng = StdRng::seed_from_u64(self.placeholder_seed.wrapping_add(index as u64));
        (rng.r#gen(), rng.r#gen(), rng.r#gen())
    }

    /// Resolves the property record of every object.
    ///
    /// Invalid references are reported as warnings and fall back to defaults.
    pub fn resolve_objects(
        &self,
        objects: &[SceneObject],
        diagnostics: &mut Diagnostics,
    ) -> Vec<ObjectProperties> {
        objects
            .iter()
            .map(|obj| {
                let (props, issues) = obj.resolve();
                for issue in issues {
                    diagnostics.warning(issue.to_string());
                }
                props
            })
            .collect()
    }

    /// Flattens all meshes in object order.
    ///
    /// Offsets are a running prefix sum, so the records partition the vertex
    /// and face arrays without gaps. Faces with a distinct fourth corner are
    /// reported and reduced to their first three corners. A face corner
    /// outside its mesh is an error.
    pub fn build_geometry(
        &self,
        objects: &[SceneObject],
        meshes: &[Mesh],
        diagnostics: &mut Diagnostics,
    ) -> Result<GeometryBuffers> {
        ensure!(
            objects.len() == meshes.len(),
            "Geometry count ({}) does not match mesh count ({})",
            objects.len(),
            meshes.len()
        );
        for (i, mesh) in meshes.iter().enumerate() {
            mesh.check_faces().with_context(|| format!("Invalid mesh {i}"))?;
        }

        let mut properties = self.resolve_objects(objects, diagnostics);

        let total_vertices: usize = meshes.iter().map(Mesh::vertex_count).sum();
        let total_faces: usize = meshes.iter().map(Mesh::face_count).sum();
        let mut buffers = GeometryBuffers {
            vertices: Vec::with_capacity(total_vertices * 3),
            vertex_colors: Vec::with_capacity(total_vertices * 3),
            indices: Vec::with_capacity(total_faces * 3),
            objects: Vec::with_capacity(meshes.len()),
        };

        let mut vertex_offset = 0_u32;
        let mut face_offset = 0_u32;
        for (i, (mesh, props)) in meshes.iter().zip(properties.iter_mut()).enumerate() {
            let vertex_count =
                u32::try_from(mesh.vertex_count()).context("Too many vertices for the engine")?;
            let face_count =
                u32::try_from(mesh.face_count()).context("Too many faces for the engine")?;

            props.vertex_offset = vertex_offset;
            props.vertex_count = vertex_count;
            props.indices_offset = face_offset;
            props.indices_count = face_count;

            vertex_offset = vertex_offset
                .checked_add(vertex_count)
                .context("Too many vertices for the engine")?;
            face_offset = face_offset
                .checked_add(face_count)
                .context("Too many faces for the engine")?;

            let (r, g, b) = self.placeholder_color(i);
            for p in mesh.vertices() {
                buffers.vertices.extend_from_slice(&p.to_f32_array());
                buffers.vertex_colors.extend_from_slice(&[r, g, b]);
            }

            for face in mesh.faces() {
                if !face.is_triangle() {
                    diagnostics.warning("Non triangle encountered!");
                }
                buffers.indices.extend_from_slice(&face.triangle_indices());
            }
        }
        buffers.objects = properties;

        diagnostics.remark(format!(
            "total | vertices: {} | faces: {}",
            vertex_offset, face_offset
        ));

        Ok(buffers)
    }

    /// Converts the per-quad sky values to W/m^2.
    ///
    /// Needs at least one value per sky face. Surplus values are ignored with
    /// a warning.
    pub fn sky_irradiance(
        &self,
        sky_mesh: &Mesh,
        values: &[f64],
        timespan_hours: f64,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<f32>> {
        ensure!(
            timespan_hours.is_finite() && timespan_hours > 0.0,
            "Sky Values Timespan must be positive, got {timespan_hours}"
        );
        let quad_count = sky_mesh.face_count();
        ensure!(
            values.len() >= quad_count,
            "Sky Values missing! {} values for {quad_count} sky faces",
            values.len()
        );
        if values.len() > quad_count {
            diagnostics.warning(format!(
                "{} sky values for {quad_count} sky faces, surplus ignored",
                values.len()
            ));
        }
        Ok(values[..quad_count]
            .iter()
            .map(|v| to_power_density(*v, timespan_hours))
            .collect())
    }

    /// Flattens the sky mesh into quads carrying `irradiance` (one W/m^2 value per face).
    pub fn build_sky(&self, sky_mesh: &Mesh, irradiance: Vec<f32>) -> Result<SkyBuffers> {
        ensure!(
            irradiance.len() == sky_mesh.face_count(),
            "{} irradiance values for {} sky faces",
            irradiance.len(),
            sky_mesh.face_count()
        );
        sky_mesh.check_faces().context("Invalid sky mesh")?;
        let vertices = sky_mesh
            .vertices()
            .iter()
            .flat_map(|p| p.to_f32_array())
            .collect();
        let indices = sky_mesh
            .faces()
            .iter()
            .flat_map(|f| f.quad_indices())
            .collect();
        Ok(SkyBuffers {
            vertices,
            indices,
            irradiance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Face, Point};

    fn strip(vertex_count: usize) -> Mesh {
        let vertices: Vec<Point> = (0..vertex_count)
            .map(|i| Point::new(i as f64, (i % 2) as f64, 0.0))
            .collect();
        let faces = (0..vertex_count.saturating_sub(2) as u32)
            .map(|i| Face::triangle(i, i + 1, i + 2))
            .collect();
        Mesh::new(vertices, faces)
    }

    fn sky_dome() -> Mesh {
        Mesh::new(
            vec![
                Point::new(0.0, 0.0, 1.0),
                Point::new(1.0, 0.0, 1.0),
                Point::new(1.0, 1.0, 1.0),
                Point::new(0.0, 1.0, 1.0),
                Point::new(2.0, 0.0, 1.0),
                Point::new(2.0, 1.0, 1.0),
            ],
            vec![Face::quad(0, 1, 2, 3), Face::quad(1, 4, 5, 2)],
        )
    }

    fn objects(n: usize) -> Vec<SceneObject> {
        (0..n)
            .map(|_| SceneObject::referenced([("kelvin", "300")]))
            .collect()
    }

    #[test]
    fn test_offsets_are_prefix_sums() {
        let meshes = vec![strip(3), strip(5), strip(2)];
        let mut diag = Diagnostics::new();
        let b = SceneBufferBuilder::new(0)
            .build_geometry(&objects(3), &meshes, &mut diag)
            .unwrap();

        let offsets: Vec<u32> = b.objects.iter().map(|o| o.vertex_offset).collect();
        assert_eq!(offsets, vec![0, 3, 8]);
        assert_eq!(b.vertex_count(), 10);

        let face_offsets: Vec<u32> = b.objects.iter().map(|o| o.indices_offset).collect();
        assert_eq!(face_offsets, vec![0, 1, 4]);
        assert_eq!(b.triangle_count(), 4);

        assert_eq!(b.vertices.len(), 30);
        assert_eq!(b.vertex_colors.len(), 30);
        assert_eq!(b.indices.len(), 12);
        assert!(b.objects.iter().all(|o| o.kelvin == 300.0));
        assert_eq!(diag.warning_count(), 0);
    }

    #[test]
    fn test_count_mismatch_is_error() {
        let mut diag = Diagnostics::new();
        let err = SceneBufferBuilder::new(0)
            .build_geometry(&objects(2), &[strip(3)], &mut diag)
            .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_quad_is_truncated_with_warning() {
        let mesh = Mesh::new(
            vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(1.0, 0.0, 0.0),
                Point::new(1.0, 1.0, 0.0),
                Point::new(0.0, 1.0, 0.0),
            ],
            vec![Face::quad(0, 1, 2, 3), Face::triangle(0, 2, 3)],
        );
        let mut diag = Diagnostics::new();
        let b = SceneBufferBuilder::new(0)
            .build_geometry(&objects(1), &[mesh], &mut diag)
            .unwrap();
        assert_eq!(b.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn test_invalid_reference_warns_and_defaults() {
        let mut diag = Diagnostics::new();
        let b = SceneBufferBuilder::new(0)
            .build_geometry(&[SceneObject::unreferenced()], &[strip(3)], &mut diag)
            .unwrap();
        assert_eq!(b.objects[0].kelvin, 0.0);
        assert_eq!(b.objects[0].heat_conductivity, 1.0);
        assert_eq!(b.objects[0].vertex_count, 3);
        assert_eq!(diag.warning_count(), 2);
    }

    #[test]
    fn test_build_is_deterministic() {
        let meshes = vec![strip(4), strip(3)];
        let builder = SceneBufferBuilder::new(42);
        let mut diag = Diagnostics::new();
        let a = builder.build_geometry(&objects(2), &meshes, &mut diag).unwrap();
        let b = builder.build_geometry(&objects(2), &meshes, &mut diag).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_placeholder_color_per_object() {
        let builder = SceneBufferBuilder::new(7);
        let mut diag = Diagnostics::new();
        let b = builder
            .build_geometry(&objects(2), &[strip(3), strip(3)], &mut diag)
            .unwrap();
        let first = &b.vertex_colors[0..3];
        assert!(b.vertex_colors[..9].chunks(3).all(|c| c == first));
        for c in &b.vertex_colors {
            assert!((0.0..1.0).contains(c));
        }
        assert_eq!(builder.placeholder_color(1), builder.placeholder_color(1));
    }

    #[test]
    fn test_empty_mesh_is_allowed() {
        let mut diag = Diagnostics::new();
        let b = SceneBufferBuilder::new(0)
            .build_geometry(&objects(2), &[Mesh::default(), strip(3)], &mut diag)
            .unwrap();
        assert_eq!(b.objects[0].vertex_count, 0);
        assert_eq!(b.objects[1].vertex_offset, 0);
    }

    #[test]
    fn test_power_density_conversion() {
        assert_eq!(to_power_density(2.0, 4.0), 500.0);
        assert_eq!(to_power_density(1.0, 1.0), 1000.0);
    }

    #[test]
    fn test_out_of_range_face_is_error() {
        let mut mesh = strip(3);
        mesh.faces.push(Face::triangle(0, 1, 99));
        let mut diag = Diagnostics::new();
        let err = SceneBufferBuilder::new(0)
            .build_geometry(&objects(2), &[strip(3), mesh], &mut diag)
            .unwrap_err();
        assert!(format!("{err:#}").contains("Invalid mesh 1"));
        assert!(format!("{err:#}").contains("vertex 99"));
        assert!(diag.is_empty());

        let bad_sky = Mesh::new(sky_dome().vertices, vec![Face::quad(0, 1, 2, 6)]);
        assert!(SceneBufferBuilder::new(0).build_sky(&bad_sky, vec![1.0]).is_err());
    }

    #[test]
    fn test_build_sky() {
        let builder = SceneBufferBuilder::new(0);
        let mut diag = Diagnostics::new();
        let irradiance = builder
            .sky_irradiance(&sky_dome(), &[2.0, 1.0], 4.0, &mut diag)
            .unwrap();
        let sky = builder.build_sky(&sky_dome(), irradiance).unwrap();
        assert_eq!(sky.vertex_count(), 6);
        assert_eq!(sky.quad_count(), 2);
        assert_eq!(sky.indices, vec![0, 1, 2, 3, 1, 4, 5, 2]);
        assert_eq!(sky.irradiance, vec![500.0, 250.0]);
        assert!(builder.build_sky(&sky_dome(), vec![1.0]).is_err());
    }

    #[test]
    fn test_sky_value_count() {
        let builder = SceneBufferBuilder::new(0);
        let mut diag = Diagnostics::new();
        assert!(builder.sky_irradiance(&sky_dome(), &[1.0], 1.0, &mut diag).is_err());

        let irradiance = builder
            .sky_irradiance(&sky_dome(), &[1.0, 2.0, 3.0], 1.0, &mut diag)
            .unwrap();
        assert_eq!(irradiance, vec![1000.0, 2000.0]);
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn test_sky_timespan_must_be_positive() {
        let builder = SceneBufferBuilder::new(0);
        let mut diag = Diagnostics::new();
        let dome = sky_dome();
        assert!(builder.sky_irradiance(&dome, &[1.0, 1.0], 0.0, &mut diag).is_err());
        assert!(builder.sky_irradiance(&dome, &[1.0, 1.0], -2.0, &mut diag).is_err());
        assert!(builder.sky_irradiance(&dome, &[1.0, 1.0], f64::NAN, &mut diag).is_err());
    }
}
