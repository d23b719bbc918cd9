//! GPU-to-CPU readback of render targets. Every read blocks until the GPU
//! has finished all submitted work.

use lightprobe_core::image::FloatImage;
use tracing::debug;

use crate::GpuError;
use crate::target::RenderTarget;

/// Bytes per `Rgba32Float` texel.
const BYTES_PER_PIXEL: u32 = 16;

/// Row pitch of a texture-to-buffer copy of `width` texels.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * BYTES_PER_PIXEL).div_ceil(align) * align
}

/// Strip row padding from mapped bytes, yielding `width × height` RGBA texels.
///
/// `data` must be 4-byte aligned, as mapped GPU memory is.
pub fn unpad_rows(data: &[u8], width: u32, height: u32, padded_row: u32) -> Vec<[f32; 4]> {
    let row_bytes = (width * BYTES_PER_PIXEL) as usize;
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for row in 0..height as usize {
        let start = row * padded_row as usize;
        pixels.extend_from_slice(bytemuck::cast_slice::<u8, [f32; 4]>(
            &data[start..start + row_bytes],
        ));
    }
    pixels
}

/// Download the color texture of `target`, keeping `channels` components
/// per pixel. Blocks until complete.
///
/// `staging_cache` keeps the staging buffer alive between calls and grows
/// it when a larger target is read.
pub fn read_target(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    target: &RenderTarget,
    channels: u8,
    staging_cache: &mut Option<wgpu::Buffer>,
) -> Result<FloatImage, GpuError> {
    let (width, height) = target.size();
    let padded_row = padded_bytes_per_row(width);
    let size = padded_row as u64 * height as u64;

    let staging = match staging_cache {
        Some(buffer) if buffer.size() >= size => buffer,
        _ => staging_cache.insert(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lightprobe_readback_staging"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        })),
    };

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("lightprobe_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: target.color(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..size);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::PollType::wait_indefinitely())?;
    receiver.recv().map_err(|_| GpuError::ReadbackCancelled)??;

    let pixels = {
        let data = slice.get_mapped_range();
        unpad_rows(&data, width, height, padded_row)
    };
    staging.unmap();
    debug!(width, height, channels, "target read back");

    Ok(FloatImage::from_rgba(width, height, &pixels, channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_pitch_is_aligned() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(16), 256);
        assert_eq!(padded_bytes_per_row(17), 512);
        assert_eq!(padded_bytes_per_row(128), 2048);
    }

    #[test]
    fn test_unpad_rows_drops_padding() {
        let (width, height) = (2u32, 2u32);
        let padded = padded_bytes_per_row(width);
        let floats_per_row = (padded / 4) as usize;
        let mut floats = vec![-1.0f32; floats_per_row * height as usize];
        for row in 0..height as usize {
            for x in 0..width as usize {
                let start = row * floats_per_row + x * 4;
                floats[start..start + 4].copy_from_slice(&[row as f32, x as f32, 0.5, 1.0]);
            }
        }
        let data: &[u8] = bytemuck::cast_slice(&floats);
        let pixels = unpad_rows(data, width, height, padded);
        assert_eq!(
            pixels,
            vec![
                [0.0, 0.0, 0.5, 1.0],
                [0.0, 1.0, 0.5, 1.0],
                [1.0, 0.0, 0.5, 1.0],
                [1.0, 1.0, 0.5, 1.0],
            ]
        );
    }
}
