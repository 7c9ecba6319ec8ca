//! Field readback and color mapping.

use anyhow::{Context, Result, ensure};

use crate::Mesh;
use crate::draw::Gradient;
use crate::sim::engine::{FieldKind, ThermalEngine};

/// Per-vertex field and the meshes painted with it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldResult {
    /// Raw per-vertex values in input mesh order.
    pub field: Vec<f32>,
    /// Input meshes with vertex colors from the ramp.
    pub meshes: Vec<Mesh>,
    /// Normalization divisor that was used.
    pub max_abs: f32,
}

/// Largest magnitude in `values`, or 1.0 if it is exactly zero.
pub fn normalization_max(values: &[f32]) -> f32 {
    let max = values.iter().fold(0.0_f32, |acc, v| acc.max(v.abs()));
    if max == 0.0 { 1.0 } else { max }
}

/// Position on the color ramp. Larger values map toward the ramp start.
pub fn ramp_position(value: f32, max_abs: f32) -> f32 {
    1.0 - value / max_abs
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultMapper {
    gradient: Gradient,
}

impl ResultMapper {
    pub fn new(gradient: Gradient) -> Self {
        Self { gradient }
    }

    pub fn gradient(&self) -> Gradient {
        self.gradient
    }

    /// Reads `field` into `buffer` (`3 * Nv` floats, scalar in the first channel).
    pub fn extract_field<E: ThermalEngine + ?Sized>(
        engine: &mut E,
        buffer: &mut [f32],
        field: FieldKind,
    ) -> Result<()> {
        engine
            .read_field(buffer, field)
            .with_context(|| format!("Failed to read {field:?} field"))
    }

    /// Normalizes the extracted buffer and paints a copy of every mesh.
    ///
    /// The divisor is taken over every float the engine returned.
    pub fn map(&self, buffer: &[f32], meshes: &[Mesh]) -> Result<FieldResult> {
        let vertex_count: usize = meshes.iter().map(Mesh::vertex_count).sum();
        ensure!(
            buffer.len() == vertex_count * 3,
            "Field buffer holds {} floats for {vertex_count} vertices",
            buffer.len()
        );

        let max_abs = normalization_max(buffer);
        let mut field = Vec::with_capacity(vertex_count);
        let mut painted = Vec::with_capacity(meshes.len());
        let mut triples = buffer.chunks_exact(3);

        for mesh in meshes {
            let colors = triples
                .by_ref()
                .take(mesh.vertex_count())
                .map(|triple| {
                    let value = triple[0];
                    field.push(value);
                    self.gradient.color_at(ramp_position(value, max_abs))
                })
                .collect();
            painted.push(mesh.with_vertex_colors(colors));
        }

        Ok(FieldResult {
            field,
            meshes: painted,
            max_abs,
        })
    }
}
