//! Content hashing used to decide which engine buffers are stale.
//!
//! The hashes are order-sensitive folds over a sequence and exist only for
//! change detection. They are neither collision-free nor cryptographic.

use crate::Mesh;

const SEED: i32 = 487;
const MULTIPLIER: i32 = 31;

/// Per-element hash feeding [`sequence_hash`].
pub trait ContentHash {
    fn content_hash(&self) -> i32;
}

impl ContentHash for i32 {
    fn content_hash(&self) -> i32 {
        *self
    }
}

impl ContentHash for u32 {
    fn content_hash(&self) -> i32 {
        *self as i32
    }
}

impl ContentHash for usize {
    fn content_hash(&self) -> i32 {
        let v = *self as u64;
        (v ^ (v >> 32)) as i32
    }
}

impl ContentHash for f32 {
    fn content_hash(&self) -> i32 {
        // -0.0 and 0.0 compare equal and hash equal
        if *self == 0.0 { 0 } else { self.to_bits() as i32 }
    }
}

impl<T: ContentHash> ContentHash for &T {
    fn content_hash(&self) -> i32 {
        (*self).content_hash()
    }
}

/// Folds a sequence into `seed * 31^n + Σ h(x_i) * 31^(n-1-i)` with 32-bit wrapping.
pub fn sequence_hash<I>(sequence: I) -> i32
where
    I: IntoIterator,
    I::Item: ContentHash,
{
    sequence.into_iter().fold(SEED, |acc, item| {
        acc.wrapping_mul(MULTIPLIER)
            .wrapping_add(item.content_hash())
    })
}

/// Topology hash over `(vertex_count, face_count)` of every mesh, in order.
pub fn meshes_hash(meshes: &[Mesh]) -> i32 {
    sequence_hash(
        meshes
            .iter()
            .flat_map(|m| [m.vertex_count(), m.face_count()]),
    )
}

/// Remembers the last seen geometry and sky hashes.
///
/// `None` means nothing was seen yet, so the first check is always dirty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeDetector {
    geometry_hash: Option<i32>,
    sky_hash: Option<i32>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the geometry must be re-uploaded.
    ///
    /// The cached hash is replaced as soon as a change is seen, independent of
    /// whether the following upload succeeds.
    pub fn check_geometry(&mut self, meshes: &[Mesh], reload: bool) -> bool {
        let changed = replace_if_changed(&mut self.geometry_hash, meshes_hash(meshes));
        changed || reload
    }

    /// Returns true if the sky irradiance must be re-uploaded.
    ///
    /// Takes the converted W/m^2 values, so a new timespan over the same
    /// energies is a change too. Same caching policy as [`Self::check_geometry`].
    pub fn check_sky(&mut self, irradiance: &[f32], reload: bool) -> bool {
        let changed = replace_if_changed(&mut self.sky_hash, sequence_hash(irradiance));
        changed || reload
    }

    pub fn geometry_hash(&self) -> Option<i32> {
        self.geometry_hash
    }

    pub fn sky_hash(&self) -> Option<i32> {
        self.sky_hash
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn replace_if_changed(cached: &mut Option<i32>, new_hash: i32) -> bool {
    if *cached == Some(new_hash) {
        return false;
    }
    *cached = Some(new_hash);
    true
}
