//! Probe textures on the GPU.

use lightprobe_core::image::ProbeImage;
use lightprobe_core::store::TextureUpload;
use tracing::{debug, warn};

use crate::COLOR_FORMAT;

/// An uploaded probe photograph. Dropping it releases the texture.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    /// Upload a [`ProbeImage`] as an `Rgba32Float` sampled texture.
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, image: &ProbeImage) -> Self {
        let width = image.width.max(1);
        let height = image.height.max(1);
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lightprobe_probe_texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        if pixels_fill(image, width, height) {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(&image.pixels),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 16),
                    rows_per_image: Some(height),
                },
                size,
            );
        } else {
            warn!(
                width,
                height,
                pixels = image.pixels.len(),
                "probe pixels do not match dimensions, texture left blank"
            );
        }
        debug!(width, height, "probe texture uploaded");

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }
}

/// Whether `image` carries exactly one texel per pixel of a
/// `width × height` texture.
fn pixels_fill(image: &ProbeImage, width: u32, height: u32) -> bool {
    image.pixels.len() == (width as usize) * (height as usize)
}

/// Texture upload collaborator for an [`ImageStore`](lightprobe_core::ImageStore)
/// of [`GpuTexture`]s.
pub struct GpuUploader<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
}

impl<'a> GpuUploader<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self { device, queue }
    }
}

impl TextureUpload for GpuUploader<'_> {
    type Texture = GpuTexture;

    fn upload(&mut self, image: &ProbeImage) -> GpuTexture {
        GpuTexture::upload(self.device, self.queue, image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixels_fill_requires_exact_count() {
        let mut image = ProbeImage::filled(4, 3, [1.0; 4]);
        assert!(pixels_fill(&image, 4, 3));
        image.pixels.pop();
        assert!(!pixels_fill(&image, 4, 3));

        // Empty images upload as a single blank texel.
        let empty = ProbeImage::filled(0, 0, [1.0; 4]);
        assert!(!pixels_fill(&empty, empty.width.max(1), empty.height.max(1)));
    }
}
