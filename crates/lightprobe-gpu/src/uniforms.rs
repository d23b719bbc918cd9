//! GPU-side uniform layouts. Each struct mirrors a WGSL struct field for
//! field, padded to 16-byte boundaries.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use lightprobe_core::projection::ImageMapping;
use lightprobe_core::request::RenderMode;

/// Stride between per-draw uniform slots in a dynamic-offset buffer.
pub const UNIFORM_SLOT: u64 = 256;

/// Projection selector shared by all shaders.
pub fn projection_code(mode: RenderMode) -> u32 {
    match mode {
        RenderMode::Globe => 0,
        RenderMode::Chart => 1,
        RenderMode::Polar => 2,
        RenderMode::CubeFace(_) => 3,
        RenderMode::Image => 4,
    }
}

/// Per-image parameters of the accumulate pass (`accumulate.wgsl`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct AccumulateUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub world_to_local: [[f32; 4]; 4],
    /// `xy` = disc centre, `z` = disc radius (pixels).
    pub circle: [f32; 4],
    /// `xy` = source image size (pixels).
    pub image_size: [f32; 4],
    pub projection: u32,
    /// Non-zero when this image is the only contributor.
    pub single: u32,
    pub _pad: [u32; 2],
}

impl AccumulateUniforms {
    pub fn new(view_proj: Mat4, mapping: &ImageMapping, mode: RenderMode, single: bool) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            world_to_local: Mat4::from_mat3(mapping.world_to_local).to_cols_array_2d(),
            circle: [mapping.center.x, mapping.center.y, mapping.radius, 0.0],
            image_size: [mapping.image_size.x, mapping.image_size.y, 0.0, 0.0],
            projection: projection_code(mode),
            single: u32::from(single),
            _pad: [0; 2],
        }
    }
}

/// Parameters of the normalize pass (`normalize.wgsl`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct NormalizeUniforms {
    pub exposure: f32,
    pub use_exposure: u32,
    pub quality: u32,
    pub _pad: u32,
}

impl NormalizeUniforms {
    pub fn new(exposure: Option<f32>, quality: bool) -> Self {
        Self {
            exposure: exposure.unwrap_or(0.0),
            use_exposure: u32::from(exposure.is_some()),
            quality: u32::from(quality),
            _pad: 0,
        }
    }
}

/// Parameters of one overlay line draw (`overlay.wgsl`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct OverlayUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    /// Mapping of the selected image, used in image mode.
    pub world_to_local: [[f32; 4]; 4],
    pub circle: [f32; 4],
    pub color: [f32; 4],
    /// `xy` = viewport size, `z` = half line width (pixels).
    pub viewport: [f32; 4],
    pub projection: u32,
    pub _pad: [u32; 3],
}

impl OverlayUniforms {
    pub fn new(
        view_proj: Mat4,
        view: Mat4,
        mapping: Option<&ImageMapping>,
        mode: RenderMode,
        color: Vec4,
        viewport: (u32, u32),
        line_width: f32,
    ) -> Self {
        let (world_to_local, circle) = match mapping {
            Some(m) => (
                Mat4::from_mat3(m.world_to_local),
                [m.center.x, m.center.y, m.radius, 0.0],
            ),
            None => (Mat4::IDENTITY, [0.0; 4]),
        };
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            world_to_local: world_to_local.to_cols_array_2d(),
            circle,
            color: color.to_array(),
            viewport: [
                viewport.0 as f32,
                viewport.1 as f32,
                (line_width - 1.0).max(0.0) / 2.0,
                0.0,
            ],
            projection: projection_code(mode),
            _pad: [0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightprobe_core::calibration::Calibration;
    use std::mem::size_of;

    #[test]
    fn test_uniforms_fit_one_slot_and_are_vec4_aligned() {
        for size in [
            size_of::<AccumulateUniforms>(),
            size_of::<NormalizeUniforms>(),
            size_of::<OverlayUniforms>(),
        ] {
            assert!(size as u64 <= UNIFORM_SLOT);
            assert_eq!(size % 16, 0);
        }
        assert_eq!(size_of::<AccumulateUniforms>(), 176);
        assert_eq!(size_of::<OverlayUniforms>(), 256);
    }

    #[test]
    fn test_accumulate_uniforms_carry_calibration() {
        let mapping = ImageMapping::new(&Calibration::initial(400, 300), 400, 300);
        let u = AccumulateUniforms::new(Mat4::IDENTITY, &mapping, RenderMode::Polar, true);
        assert_eq!(u.circle, [200.0, 150.0, 100.0, 0.0]);
        assert_eq!(u.image_size[..2], [400.0, 300.0]);
        assert_eq!(u.projection, 2);
        assert_eq!(u.single, 1);
        assert_eq!(u.world_to_local[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_overlay_half_width() {
        let color = Vec4::ONE;
        let thin = OverlayUniforms::new(
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            None,
            RenderMode::Chart,
            color,
            (64, 32),
            1.0,
        );
        assert_eq!(thin.viewport, [64.0, 32.0, 0.0, 0.0]);
        let thick = OverlayUniforms::new(
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            None,
            RenderMode::Chart,
            color,
            (64, 32),
            3.0,
        );
        assert_eq!(thick.viewport[2], 1.0);
    }

    #[test]
    fn test_normalize_uniforms_flags() {
        assert_eq!(NormalizeUniforms::new(None, false).use_exposure, 0);
        let u = NormalizeUniforms::new(Some(-2.0), true);
        assert_eq!((u.exposure, u.use_exposure, u.quality), (-2.0, 1, 1));
    }
}
