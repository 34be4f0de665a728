//! Spectral ocean synthesis: Phillips spectrum, dispersion-driven evolution,
//! ping-pong inverse FFT and displacement/normal derivation.

pub mod barrier;
pub mod command;
pub mod cpu;
pub mod derive;
pub mod evolve;
pub mod fft;
pub mod field;
pub mod mesh;
pub mod pipeline;
pub mod spectrum;
pub mod system;
pub mod variant;

// Re-export public types
pub use barrier::{
    BufferKind, ResourceId, ResourceState, ResourceStateCoordinator, StateTracker, Transition,
};
pub use command::{Command, CommandStream, Dispatch, Kernel};
pub use cpu::CpuBackend;
pub use derive::{DerivationConstants, DisplacementNormalDeriver};
pub use evolve::SpectrumEvolver;
pub use fft::{ButterflyTable, FftDirection, FftExecutor, FftStageParams};
pub use field::{Complex32, FrequencyField, OceanMaps, OutputField, PingPongBuffer, PingPongSlot};
pub use mesh::{uv_for_world, OceanMesh, Vertex};
pub use pipeline::{ComputeBackend, FrameRecording, OceanPipeline};
pub use spectrum::{SpectrumConstants, SpectrumInitializer};
pub use system::OceanSystem;
pub use variant::PipelineVariant;
