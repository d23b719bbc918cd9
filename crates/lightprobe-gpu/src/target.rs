//! Off-screen color + depth targets: the accumulation buffer and the
//! destination surfaces of previews and exports.

use tracing::debug;

use crate::{COLOR_FORMAT, DEPTH_FORMAT};

/// A float color texture with a matching depth attachment.
///
/// Resizing to the current size keeps the existing textures; any other
/// size reallocates both.
#[derive(Debug)]
pub struct RenderTarget {
    label: &'static str,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
    /// Bumped on every allocation.
    generation: u64,
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, label: &'static str, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let (color, color_view, depth_view) = allocate(device, label, width, height);
        Self {
            label,
            color,
            color_view,
            depth_view,
            width,
            height,
            generation: 0,
        }
    }

    /// Match the requested size. Returns `true` when storage was reallocated.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return false;
        }
        let (color, color_view, depth_view) = allocate(device, self.label, width, height);
        self.color = color;
        self.color_view = color_view;
        self.depth_view = depth_view;
        self.width = width;
        self.height = height;
        self.generation += 1;
        debug!(target = self.label, width, height, "render target reallocated");
        true
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn color(&self) -> &wgpu::Texture {
        &self.color
    }

    pub fn color_view(&self) -> &wgpu::TextureView {
        &self.color_view
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }
}

fn allocate(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::TextureView, wgpu::TextureView) {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("lightprobe_target_depth"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
    (color, color_view, depth_view)
}
