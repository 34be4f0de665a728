//! Parameter definitions with physical units and documented semantics.
//!
//! All tunables are collected here with:
//! - Physical units (meters, seconds, m/s, etc.)
//! - Documented ranges and meanings
//! - `validate()` checks for the invariants the pipeline relies on

mod ocean;
mod render;

// Re-export all types
pub use ocean::{
    SimulationSettings, SpectrumParams, CASCADE_BAND_MODES, CASCADE_SIZE_RATIO, GRAVITY,
    MAX_RESOLUTION,
};
pub use render::{ExportConfig, MeshConfig};
