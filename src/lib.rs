//! Tidewright library - Spectral FFT ocean wave synthesis

pub mod cli;
pub mod error;
pub mod export;
pub mod gpu;
pub mod ocean;
pub mod params;

pub use error::{OceanError, Result};
