//! Lightprobe GPU: wgpu render passes for compositing and export.
//!
//! This crate owns every GPU resource: uploaded probe textures, the sphere
//! mesh buffers, the accumulation and export targets and the cached render
//! pipelines. All work is submitted and waited on synchronously.

pub mod compositor;
pub mod error;
pub mod export;
pub mod mesh;
pub mod pipeline;
pub mod readback;
pub mod target;
pub mod texture;
pub mod uniforms;

pub use compositor::{Compositor, OverlayStyle};
pub use error::GpuError;
pub use export::{ExportDriver, ExportKind};
pub use target::RenderTarget;
pub use texture::{GpuTexture, GpuUploader};

use tracing::{info, warn};

/// Format of the accumulation buffer and every export target.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Depth attachment format of render targets.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Device features the compositor needs: filtered sampling of float probe
/// textures, and format capabilities taken from the adapter rather than the
/// guaranteed baseline, which never includes blending into `Rgba32Float`.
pub fn required_features() -> wgpu::Features {
    wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES | wgpu::Features::FLOAT32_FILTERABLE
}

/// Capabilities [`COLOR_FORMAT`] must have: additive blending for the
/// accumulate pass, alpha blending for the overlay and filtered sampling.
pub fn required_format_flags() -> wgpu::TextureFormatFeatureFlags {
    wgpu::TextureFormatFeatureFlags::BLENDABLE | wgpu::TextureFormatFeatureFlags::FILTERABLE
}

/// Check an adapter's device features and [`COLOR_FORMAT`] capabilities.
pub fn check_adapter(
    features: wgpu::Features,
    color_format: wgpu::TextureFormatFeatureFlags,
) -> Result<(), GpuError> {
    let missing = required_features().difference(features);
    if !missing.is_empty() {
        return Err(GpuError::MissingFeatures(missing));
    }
    let missing = required_format_flags().difference(color_format);
    if !missing.is_empty() {
        return Err(GpuError::FormatUnsupported {
            format: COLOR_FORMAT,
            missing,
        });
    }
    Ok(())
}

/// A headless device and its queue.
#[derive(Debug, Clone)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Open a headless device, blocking until it is ready.
    pub fn new() -> Result<Self, GpuError> {
        pollster::block_on(Self::request())
    }

    /// Open a headless device. Falls back to a software adapter when no
    /// hardware adapter is present.
    pub async fn request() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                ..Default::default()
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(error = %e, "no hardware adapter, trying fallback");
                instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::LowPower,
                        force_fallback_adapter: true,
                        ..Default::default()
                    })
                    .await?
            }
        };

        check_adapter(
            adapter.features(),
            adapter.get_texture_format_features(COLOR_FORMAT).flags,
        )?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lightprobe_device"),
                required_features: required_features(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let info = adapter.get_info();
        info!(adapter = %info.name, backend = ?info.backend, "GPU device ready");
        Ok(Self { device, queue })
    }
}
