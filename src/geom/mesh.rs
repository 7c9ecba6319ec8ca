//! Face-vertex meshes as handed over by the front end.

use crate::Point;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Linear RGB color with channels in 0.0..=1.0.
pub type Rgb = (f32, f32, f32);

/// Mesh face with up to four corners.
///
/// Triangles repeat their third corner (`c == d`), quads use four distinct
/// corners. This mirrors the face layout of the host's mesh type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Face {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
}

impl Face {
    pub fn triangle(a: u32, b: u32, c: u32) -> Self {
        Self { a, b, c, d: c }
    }

    pub fn quad(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self { a, b, c, d }
    }

    pub fn is_triangle(&self) -> bool {
        self.c == self.d
    }

    /// First three corners. Quads lose their fourth corner.
    pub fn triangle_indices(&self) -> [u32; 3] {
        [self.a, self.b, self.c]
    }

    pub fn quad_indices(&self) -> [u32; 4] {
        [self.a, self.b, self.c, self.d]
    }
}

/// A mesh defined by vertices, faces and optional per-vertex colors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Point>,
    #[serde(default)]
    pub faces: Vec<Face>,
    /// Per-vertex colors, either empty or one entry per vertex.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vertex_colors: Vec<Rgb>,
}

impl Mesh {
    /// Creates a new mesh without vertex colors.
    pub fn new(vertices: Vec<Point>, faces: Vec<Face>) -> Self {
        Self {
            vertices,
            faces,
            vertex_colors: Vec::new(),
        }
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Fails on the first face with a corner outside the vertex list.
    pub fn check_faces(&self) -> Result<()> {
        let vertex_count = self.vertices.len();
        for (i, face) in self.faces.iter().enumerate() {
            if let Some(&corner) = face
                .quad_indices()
                .iter()
                .find(|&&k| k as usize >= vertex_count)
            {
                bail!(
                    "Face {i} references vertex {corner}, mesh has {vertex_count} vertices"
                );
            }
        }
        Ok(())
    }

    /// Replaces the vertex colors.
    ///
    /// Panics if the color count does not match the vertex count.
    pub fn set_vertex_colors(&mut self, colors: Vec<Rgb>) {
        assert_eq!(
            colors.len(),
            self.vertices.len(),
            "one color per vertex required"
        );
        self.vertex_colors = colors;
    }

    /// Returns a copy of this mesh painted with `colors`.
    pub fn with_vertex_colors(&self, colors: Vec<Rgb>) -> Self {
        let mut mesh = self.clone();
        mesh.set_vertex_colors(colors);
        mesh
    }
}
