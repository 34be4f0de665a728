//! Crate-wide error type.

use thiserror::Error;

use crate::ocean::barrier::{ResourceId, ResourceState};

pub type Result<T> = std::result::Result<T, OceanError>;

#[derive(Debug, Error)]
pub enum OceanError {
    #[error("Resolution must be a power of two between 1 and {max}, got {got}")]
    InvalidResolution { got: u32, max: u32 },

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Cascade {cascade} out of range (pipeline has {count})")]
    CascadeOutOfRange { cascade: usize, count: usize },

    #[error("Resource {resource:?} is {actual:?}, expected {expected:?}")]
    Hazard {
        resource: ResourceId,
        expected: ResourceState,
        actual: ResourceState,
    },

    #[error("Failed to find suitable GPU adapter")]
    NoAdapter,

    #[error("Failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Kernel `{kernel}` failed to build: {message}")]
    KernelCreation { kernel: &'static str, message: String },

    #[error("Buffer `{buffer}` needs {size} bytes but the device allows {limit}")]
    BufferTooLarge {
        buffer: &'static str,
        size: u64,
        limit: u64,
    },

    #[error("GPU resource creation failed: {0}")]
    ResourceCreation(String),

    #[error("Failed to map GPU staging buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Staging-map channel closed before completion")]
    ChannelClosed,

    #[error("Image export failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OceanError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
