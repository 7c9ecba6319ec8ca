//! Color encodings for simulation fields.

pub mod gradient;

pub use gradient::Gradient;
