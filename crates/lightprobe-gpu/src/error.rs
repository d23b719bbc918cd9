//! Error types for device setup and readback.

/// Errors that can occur while setting up the GPU or reading pixels back.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    /// No adapter, hardware or fallback, could be found.
    #[error("no GPU adapter available: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    /// The adapter lacks a device feature the compositor enables.
    #[error("adapter lacks required features: {0:?}")]
    MissingFeatures(wgpu::Features),

    /// The adapter cannot blend into or filter the float color format.
    #[error("adapter cannot use {format:?} as needed, missing {missing:?}")]
    FormatUnsupported {
        format: wgpu::TextureFormat,
        missing: wgpu::TextureFormatFeatureFlags,
    },

    /// Device creation was refused.
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    /// Waiting for submitted work failed.
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    /// The staging buffer could not be mapped for reading.
    #[error("failed to map readback buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    /// The map callback was dropped without reporting a result.
    #[error("readback was cancelled before completion")]
    ReadbackCancelled,
}
