//! The compositor: accumulate → normalize → overlay.
//!
//! Every call receives a complete [`RenderRequest`] and derives all pass
//! inputs from it. Nothing about the previous call is carried over except
//! allocated targets and built pipelines.

use std::mem::size_of;
use std::num::NonZeroU64;

use glam::Vec4;
use lightprobe_core::mesh::{MeshConfig, SphereMesh};
use lightprobe_core::projection::{self, ImageMapping};
use lightprobe_core::request::{RenderFlags, RenderMode, RenderRequest};
use lightprobe_core::store::{CAPACITY, CalibratedImage, ImageStore};
use tracing::{debug, warn};

use crate::mesh::{IndexBuffer, MeshBuffers};
use crate::pipeline::{Pass, PipelineCache, PipelineKey};
use crate::target::RenderTarget;
use crate::texture::GpuTexture;
use crate::uniforms::{AccumulateUniforms, NormalizeUniforms, OverlayUniforms, UNIFORM_SLOT};
use crate::{COLOR_FORMAT, GpuContext};

/// Line widths (pixels) and colors of the grid overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Width of the mesh wireframe.
    pub wire_width: f32,
    pub wire_color: [f32; 4],
    /// Width of the equator and meridian lines.
    pub grid_width: f32,
    pub grid_color: [f32; 4],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            wire_width: 1.0,
            wire_color: [0.5, 0.5, 0.5, 0.5],
            grid_width: 3.0,
            grid_color: [1.0, 0.8, 0.2, 0.9],
        }
    }
}

/// Number of instanced copies needed for a line of `width` pixels.
fn line_instances(width: f32) -> u32 {
    if width > 1.0 { 9 } else { 1 }
}

/// Owns the accumulation buffer, mesh buffers and pipelines, and renders
/// composites into caller-provided destination targets.
pub struct Compositor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    mesh: MeshBuffers,
    pipelines: PipelineCache,
    accumulation: RenderTarget,
    sampler: wgpu::Sampler,
    accumulate_uniforms: wgpu::Buffer,
    accumulate_bind_group: wgpu::BindGroup,
    normalize_uniforms: wgpu::Buffer,
    overlay_uniforms: wgpu::Buffer,
    overlay_bind_group: wgpu::BindGroup,
    style: OverlayStyle,
}

impl Compositor {
    pub fn new(context: &GpuContext, mesh: MeshConfig, style: OverlayStyle) -> Self {
        let device = &context.device;
        let mesh = MeshBuffers::new(device, &SphereMesh::new(mesh));
        let pipelines = PipelineCache::new(device);
        let accumulation = RenderTarget::new(device, "lightprobe_accumulation", 1, 1);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lightprobe_probe_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // One slot per store image.
        let accumulate_uniforms = uniform_buffer(
            device,
            "lightprobe_accumulate_uniforms",
            CAPACITY as u64 * UNIFORM_SLOT,
        );
        let accumulate_bind_group = dynamic_bind_group(
            device,
            "lightprobe_accumulate_bind_group",
            &pipelines.accumulate_layout,
            &accumulate_uniforms,
            size_of::<AccumulateUniforms>() as u64,
        );

        let normalize_uniforms = uniform_buffer(
            device,
            "lightprobe_normalize_uniforms",
            size_of::<NormalizeUniforms>() as u64,
        );

        // Slot 0: wireframe, slot 1: grid.
        let overlay_uniforms =
            uniform_buffer(device, "lightprobe_overlay_uniforms", 2 * UNIFORM_SLOT);
        let overlay_bind_group = dynamic_bind_group(
            device,
            "lightprobe_overlay_bind_group",
            &pipelines.overlay_layout,
            &overlay_uniforms,
            size_of::<OverlayUniforms>() as u64,
        );

        Self {
            device: context.device.clone(),
            queue: context.queue.clone(),
            mesh,
            pipelines,
            accumulation,
            sampler,
            accumulate_uniforms,
            accumulate_bind_group,
            normalize_uniforms,
            overlay_uniforms,
            overlay_bind_group,
            style,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The accumulation buffer as left by the last composite: weighted
    /// color sums in `rgb`, total weight in `a`.
    pub fn accumulation(&self) -> &RenderTarget {
        &self.accumulation
    }

    pub fn pipelines(&self) -> &PipelineCache {
        &self.pipelines
    }

    pub fn style(&self) -> OverlayStyle {
        self.style
    }

    pub fn set_style(&mut self, style: OverlayStyle) {
        self.style = style;
    }

    /// Render `request` into `destination`, resizing it and the
    /// accumulation buffer to the requested size first.
    ///
    /// Submits one command buffer; does not wait for it.
    pub fn composite(
        &mut self,
        store: &ImageStore<GpuTexture>,
        request: &RenderRequest,
        destination: &mut RenderTarget,
    ) {
        let (width, height) = (request.width.max(1), request.height.max(1));
        self.accumulation.resize(&self.device, width, height);
        destination.resize(&self.device, width, height);

        let selected = store.selected_image();
        let transform =
            projection::view_transform(request, selected.map(|img| (img.width, img.height)));
        let view_proj = transform.view_proj();

        let spherical = request.mode.is_spherical();
        let images = if spherical {
            store.contributing(request.flags.contains(RenderFlags::BLEND_ALL))
        } else {
            selected.into_iter().collect()
        };
        let single = images.len() == 1;
        debug!(
            mode = request.mode.label(),
            width,
            height,
            images = images.len(),
            "composite"
        );

        let mut sources = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            let mapping = ImageMapping::new(&image.calibration, image.width, image.height);
            let uniforms = AccumulateUniforms::new(view_proj, &mapping, request.mode, single);
            self.queue.write_buffer(
                &self.accumulate_uniforms,
                i as u64 * UNIFORM_SLOT,
                bytemuck::bytes_of(&uniforms),
            );
            sources.push(self.source_bind_group(&image.texture));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lightprobe_composite_encoder"),
            });

        // ── Accumulate ──────────────────────────────────────────
        let pass_kind = if spherical {
            Pass::AccumulateSphere
        } else {
            Pass::AccumulateImage
        };
        let accumulate = self.pipelines.get(
            &self.device,
            PipelineKey::new(pass_kind, request.mode, COLOR_FORMAT),
        );
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lightprobe_accumulate_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.accumulation.color_view(),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.accumulation.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            match &accumulate {
                Some(pipeline) if !sources.is_empty() => {
                    pass.set_pipeline(pipeline);
                    if spherical {
                        pass.set_vertex_buffer(0, self.mesh.vertices.slice(..));
                        pass.set_index_buffer(
                            self.mesh.triangles.buffer.slice(..),
                            wgpu::IndexFormat::Uint32,
                        );
                    }
                    for (i, source) in sources.iter().enumerate() {
                        let offset = (i as u64 * UNIFORM_SLOT) as wgpu::DynamicOffset;
                        pass.set_bind_group(0, &self.accumulate_bind_group, &[offset]);
                        pass.set_bind_group(1, source, &[]);
                        if spherical {
                            pass.draw_indexed(0..self.mesh.triangles.count, 0, 0..1);
                        } else {
                            pass.draw(0..6, 0..1);
                        }
                    }
                }
                Some(_) => {}
                None => warn!(
                    mode = request.mode.label(),
                    "accumulate pipeline unavailable, skipping draw"
                ),
            }
        }

        // ── Normalize ───────────────────────────────────────────
        let normalize = NormalizeUniforms::new(
            request.exposure,
            request.flags.contains(RenderFlags::QUALITY),
        );
        self.queue
            .write_buffer(&self.normalize_uniforms, 0, bytemuck::bytes_of(&normalize));
        let normalize_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lightprobe_normalize_bind_group"),
            layout: &self.pipelines.normalize_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.normalize_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(self.accumulation.color_view()),
                },
            ],
        });
        let normalize_pipeline = self.pipelines.get(
            &self.device,
            PipelineKey::new(Pass::Normalize, request.mode, COLOR_FORMAT),
        );
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lightprobe_normalize_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: destination.color_view(),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            match &normalize_pipeline {
                Some(pipeline) => {
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, &normalize_bind_group, &[]);
                    pass.draw(0..3, 0..1);
                }
                None => warn!("normalize pipeline unavailable, skipping draw"),
            }
        }

        // ── Overlay ─────────────────────────────────────────────
        if request.flags.contains(RenderFlags::GRID) {
            self.encode_overlay(&mut encoder, request, &transform, selected, destination);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn encode_overlay(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        request: &RenderRequest,
        transform: &projection::ViewTransform,
        selected: Option<&CalibratedImage<GpuTexture>>,
        destination: &RenderTarget,
    ) {
        let mapping =
            selected.map(|img| ImageMapping::new(&img.calibration, img.width, img.height));
        if request.mode == RenderMode::Image && mapping.is_none() {
            return;
        }

        let Some(pipeline) = self.pipelines.get(
            &self.device,
            PipelineKey::new(Pass::Overlay, request.mode, COLOR_FORMAT),
        ) else {
            warn!("overlay pipeline unavailable, skipping draw");
            return;
        };

        let viewport = destination.size();
        let lines = [
            (self.style.wire_color, self.style.wire_width),
            (self.style.grid_color, self.style.grid_width),
        ];
        for (slot, (color, width)) in lines.into_iter().enumerate() {
            let uniforms = OverlayUniforms::new(
                transform.view_proj(),
                transform.view,
                mapping.as_ref(),
                request.mode,
                Vec4::from_array(color),
                viewport,
                width,
            );
            self.queue.write_buffer(
                &self.overlay_uniforms,
                slot as u64 * UNIFORM_SLOT,
                bytemuck::bytes_of(&uniforms),
            );
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lightprobe_overlay_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: destination.color_view(),
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });
        pass.set_pipeline(&pipeline);
        pass.set_vertex_buffer(0, self.mesh.vertices.slice(..));

        let draws: [(&IndexBuffer, f32); 2] = [
            (&self.mesh.wire, self.style.wire_width),
            (&self.mesh.grid, self.style.grid_width),
        ];
        for (slot, (indices, width)) in draws.into_iter().enumerate() {
            let offset = (slot as u64 * UNIFORM_SLOT) as wgpu::DynamicOffset;
            pass.set_bind_group(0, &self.overlay_bind_group, &[offset]);
            pass.set_index_buffer(indices.buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..indices.count, 0, 0..line_instances(width));
        }
    }

    fn source_bind_group(&self, texture: &GpuTexture) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lightprobe_source_bind_group"),
            layout: &self.pipelines.source_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }
}

// ── Helpers ─────────────────────────────────────────────────────

fn uniform_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Bind a uniform buffer for dynamic-offset access, one struct at a time.
fn dynamic_bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    binding_size: u64,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: NonZeroU64::new(binding_size),
            }),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_style_is_thin_wire_thick_grid() {
        let style = OverlayStyle::default();
        assert_eq!(line_instances(style.wire_width), 1);
        assert_eq!(line_instances(style.grid_width), 9);
    }
}
