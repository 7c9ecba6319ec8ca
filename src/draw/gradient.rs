use serde::{Deserialize, Serialize};

use crate::geom::mesh::Rgb;

/// Color ramps used to paint normalized scalar fields onto meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gradient {
    /// Black (0.0) → white (1.0).
    #[default]
    GreyScale,
    /// Blue (0.0) → white (0.5) → red (1.0).
    Heat,
}

impl Gradient {
    /// Returns the ramp color at position `t`, clamped to 0.0..=1.0.
    ///
    /// NaN positions map to the start of the ramp.
    pub fn color_at(&self, t: f32) -> Rgb {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Gradient::GreyScale => (t, t, t),
            Gradient::Heat => heat_color(t),
        }
    }
}

fn heat_color(t: f32) -> Rgb {
    if t < 0.5 {
        let s = t * 2.0;
        (s, s, 1.0)
    } else {
        let s = (t - 0.5) * 2.0;
        (1.0, 1.0 - s, 1.0 - s)
    }
}
