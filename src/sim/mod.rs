pub mod change;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod engine;
pub mod properties;
pub mod result;
pub mod scene;
