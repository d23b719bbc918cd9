//! Render pipeline cache.
//!
//! Pipelines are built on first use and kept for the life of the cache,
//! keyed by pass, culling and destination format. Render modes that share
//! the same fixed-function state share a pipeline; per-mode behavior is
//! selected in the shaders through uniforms. A pipeline that fails
//! validation is logged and cached as absent so the failure is reported
//! once and draws that need it are skipped.

use std::collections::HashMap;
use std::mem::size_of;
use std::num::NonZeroU64;

use lightprobe_core::request::RenderMode;
use tracing::{debug, error};

use crate::DEPTH_FORMAT;
use crate::mesh::MeshBuffers;
use crate::uniforms::{AccumulateUniforms, NormalizeUniforms, OverlayUniforms};

/// Which pass a pipeline draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Sphere mesh sampled through each image's disc mapping.
    AccumulateSphere,
    /// The selected photograph as one flat quad.
    AccumulateImage,
    /// Fullscreen divide-by-weight into the destination.
    Normalize,
    /// Wireframe and grid lines over the finished image.
    Overlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub pass: Pass,
    pub cull_back: bool,
    pub format: wgpu::TextureFormat,
}

impl PipelineKey {
    /// Key for drawing `pass` in `mode` into a target of `format`.
    ///
    /// Only the globe is seen from outside, so it alone culls the far
    /// hemisphere; cube faces look at the inside of the sphere.
    pub fn new(pass: Pass, mode: RenderMode, format: wgpu::TextureFormat) -> Self {
        Self {
            pass,
            cull_back: pass == Pass::AccumulateSphere && mode == RenderMode::Globe,
            format,
        }
    }
}

/// Sum `src + dst` on every channel.
const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Shader modules, bind group layouts and the lazily built pipelines.
pub struct PipelineCache {
    accumulate_shader: wgpu::ShaderModule,
    normalize_shader: wgpu::ShaderModule,
    overlay_shader: wgpu::ShaderModule,
    /// Group 0 of the accumulate pass: per-image uniforms, dynamic offset.
    pub accumulate_layout: wgpu::BindGroupLayout,
    /// Group 1 of the accumulate pass: probe texture and sampler.
    pub source_layout: wgpu::BindGroupLayout,
    /// Uniforms plus the accumulation texture.
    pub normalize_layout: wgpu::BindGroupLayout,
    /// Per-draw overlay uniforms, dynamic offset.
    pub overlay_layout: wgpu::BindGroupLayout,
    accumulate_pipeline_layout: wgpu::PipelineLayout,
    normalize_pipeline_layout: wgpu::PipelineLayout,
    overlay_pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, Option<wgpu::RenderPipeline>>,
}

impl PipelineCache {
    /// Compile the shader modules and create the layouts.
    pub fn new(device: &wgpu::Device) -> Self {
        let accumulate_shader = compile(
            device,
            "lightprobe_accumulate_shader",
            include_str!("../shaders/accumulate.wgsl"),
        );
        let normalize_shader = compile(
            device,
            "lightprobe_normalize_shader",
            include_str!("../shaders/normalize.wgsl"),
        );
        let overlay_shader = compile(
            device,
            "lightprobe_overlay_shader",
            include_str!("../shaders/overlay.wgsl"),
        );

        let accumulate_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lightprobe_accumulate_layout"),
            entries: &[dynamic_uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                size_of::<AccumulateUniforms>() as u64,
            )],
        });

        let source_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lightprobe_source_layout"),
            entries: &[
                // binding 0: probe texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // binding 1: linear clamp sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let normalize_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lightprobe_normalize_layout"),
            entries: &[
                // binding 0: normalize uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(size_of::<NormalizeUniforms>() as u64),
                    },
                    count: None,
                },
                // binding 1: accumulation buffer, read with textureLoad
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let overlay_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lightprobe_overlay_layout"),
            entries: &[dynamic_uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                size_of::<OverlayUniforms>() as u64,
            )],
        });

        let accumulate_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("lightprobe_accumulate_pipeline_layout"),
                bind_group_layouts: &[&accumulate_layout, &source_layout],
                push_constant_ranges: &[],
            });
        let normalize_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("lightprobe_normalize_pipeline_layout"),
                bind_group_layouts: &[&normalize_layout],
                push_constant_ranges: &[],
            });
        let overlay_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("lightprobe_overlay_pipeline_layout"),
                bind_group_layouts: &[&overlay_layout],
                push_constant_ranges: &[],
            });

        Self {
            accumulate_shader,
            normalize_shader,
            overlay_shader,
            accumulate_layout,
            source_layout,
            normalize_layout,
            overlay_layout,
            accumulate_pipeline_layout,
            normalize_pipeline_layout,
            overlay_pipeline_layout,
            pipelines: HashMap::new(),
        }
    }

    /// The pipeline for `key`, building it on first request. `None` when it
    /// failed to build.
    pub fn get(&mut self, device: &wgpu::Device, key: PipelineKey) -> Option<wgpu::RenderPipeline> {
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.build(device, key);
            self.pipelines.insert(key, pipeline);
        }
        self.pipelines.get(&key).cloned().flatten()
    }

    /// Number of keys built so far, including failed ones.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    fn build(&self, device: &wgpu::Device, key: PipelineKey) -> Option<wgpu::RenderPipeline> {
        let vertex_layouts = [MeshBuffers::layout()];
        let accumulate_depth = Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let (label, layout, module, vs, fs, buffers, blend, primitive, depth_stencil) = match key
            .pass
        {
            Pass::AccumulateSphere => (
                "lightprobe_accumulate_sphere_pipeline",
                &self.accumulate_pipeline_layout,
                &self.accumulate_shader,
                "vs_sphere",
                "fs_sphere",
                &vertex_layouts[..],
                Some(ADDITIVE),
                wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Cw,
                    cull_mode: key.cull_back.then_some(wgpu::Face::Back),
                    ..Default::default()
                },
                accumulate_depth,
            ),
            Pass::AccumulateImage => (
                "lightprobe_accumulate_image_pipeline",
                &self.accumulate_pipeline_layout,
                &self.accumulate_shader,
                "vs_image",
                "fs_image",
                &[][..],
                Some(ADDITIVE),
                wgpu::PrimitiveState::default(),
                accumulate_depth,
            ),
            Pass::Normalize => (
                "lightprobe_normalize_pipeline",
                &self.normalize_pipeline_layout,
                &self.normalize_shader,
                "vs_fullscreen",
                "fs_normalize",
                &[][..],
                None,
                wgpu::PrimitiveState::default(),
                None,
            ),
            Pass::Overlay => (
                "lightprobe_overlay_pipeline",
                &self.overlay_pipeline_layout,
                &self.overlay_shader,
                "vs_overlay",
                "fs_overlay",
                &vertex_layouts[..],
                Some(wgpu::BlendState::ALPHA_BLENDING),
                wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::LineList,
                    ..Default::default()
                },
                None,
            ),
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some(vs),
                buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some(fs),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive,
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => {
                error!(?key, error = %err, "render pipeline failed to build");
                None
            }
            None => {
                debug!(?key, "render pipeline built");
                Some(pipeline)
            }
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────

/// Create a shader module, logging compile diagnostics.
///
/// An invalid module still yields a handle; pipelines built from it fail
/// validation and are cached as absent.
fn compile(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        error!(shader = label, error = %err, "shader failed to compile");
    }
    module
}

fn dynamic_uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    min_size: u64,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: NonZeroU64::new(min_size),
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightprobe_core::request::CubeFace;

    #[test]
    fn test_only_globe_sphere_pass_culls() {
        let format = crate::COLOR_FORMAT;
        assert!(PipelineKey::new(Pass::AccumulateSphere, RenderMode::Globe, format).cull_back);
        assert!(!PipelineKey::new(Pass::Overlay, RenderMode::Globe, format).cull_back);
        let cube = RenderMode::CubeFace(CubeFace::PosX);
        assert!(!PipelineKey::new(Pass::AccumulateSphere, cube, format).cull_back);
    }

    #[test]
    fn test_flat_modes_share_a_key() {
        let format = crate::COLOR_FORMAT;
        let chart = PipelineKey::new(Pass::AccumulateSphere, RenderMode::Chart, format);
        let polar = PipelineKey::new(Pass::AccumulateSphere, RenderMode::Polar, format);
        assert_eq!(chart, polar);
    }
}
