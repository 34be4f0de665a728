//! wgpu compute executor for the ocean pipeline.

mod backend;
mod context;

pub use backend::GpuBackend;
pub use context::GpuContext;
