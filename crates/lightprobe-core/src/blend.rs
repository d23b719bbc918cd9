//! Per-pixel blend math shared by the GPU shaders and the CPU reference.
//!
//! `accumulate.wgsl` and `normalize.wgsl` mirror these functions.
//!
//! # Algorithm
//! Every contributing image adds `(rgb · w, w)` into a running sum. The
//! normalize step divides the sum by its weight, so N images with weights
//! `w₁..wₙ` resolve to `Σ(cᵢ·wᵢ) / Σ(wᵢ)`. Pixels nobody covers keep zero
//! weight and pass through untouched with zero opacity.

use crate::projection::{DiscPoint, ImageMapping};

/// False-color ramp for weight visualization, from no weight to full weight.
pub const QUALITY_RAMP: [[f32; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [1.0, 0.5, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 1.0],
];

/// Weight of one image's sample at a disc point.
///
/// Zero outside the disc or outside the photograph. Inside, a lone image
/// always weighs 1.0; when blending several, the weight falls off as
/// `1 − ρ²` toward the rim, where the mirror ball samples worst.
pub fn sample_weight(mapping: &ImageMapping, point: &DiscPoint, single: bool) -> f32 {
    if point.rho >= 1.0 || !mapping.in_image(point.position) {
        return 0.0;
    }
    if single {
        1.0
    } else {
        1.0 - point.rho * point.rho
    }
}

/// Running weighted sum for one pixel: premultiplied color in `rgb`,
/// total weight in `a`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulator(pub [f32; 4]);

impl Accumulator {
    /// Additive blend of one weighted sample.
    pub fn add(&mut self, color: [f32; 4], weight: f32) {
        for c in 0..3 {
            self.0[c] += color[c] * weight;
        }
        self.0[3] += weight;
    }

    pub fn weight(&self) -> f32 {
        self.0[3]
    }
}

/// Options of the normalize pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FinalizeOptions {
    /// Exposure in stops; `None` skips the tone curve.
    pub exposure: Option<f32>,
    /// Show the weight through [`QUALITY_RAMP`] instead of color.
    pub quality: bool,
}

/// Resolve an accumulated pixel to its output value.
pub fn finalize(sum: Accumulator, options: FinalizeOptions) -> [f32; 4] {
    let [r, g, b, w] = sum.0;
    if w <= 0.0 {
        return [r, g, b, 0.0];
    }

    let rgb = if options.quality {
        quality_color(w)
    } else {
        let rgb = [r / w, g / w, b / w];
        match options.exposure {
            Some(stops) => rgb.map(|c| expose(c, stops)),
            None => rgb,
        }
    };
    [rgb[0], rgb[1], rgb[2], 1.0]
}

/// Exposure tone curve: `1 − e^(−c·2^stops)`.
pub fn expose(c: f32, stops: f32) -> f32 {
    1.0 - (-c.max(0.0) * stops.exp2()).exp()
}

/// Interpolate [`QUALITY_RAMP`] at `clamp(weight, 0, 1)`.
pub fn quality_color(weight: f32) -> [f32; 3] {
    let last = (QUALITY_RAMP.len() - 1) as f32;
    let x = weight.clamp(0.0, 1.0) * last;
    let i = (x.floor() as usize).min(QUALITY_RAMP.len() - 2);
    let t = x - i as f32;
    let (a, b) = (QUALITY_RAMP[i], QUALITY_RAMP[i + 1]);
    std::array::from_fn(|c| a[c] + (b[c] - a[c]) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Calibration;
    use glam::{Vec2, Vec3};

    const EPSILON: f32 = 1e-5;

    fn mapping() -> ImageMapping {
        ImageMapping::new(&Calibration::initial(400, 300), 400, 300)
    }

    #[test]
    fn test_single_image_weight_is_one_inside_disc() {
        let m = mapping();
        let p = m.to_disc(Vec3::new(0.3, -0.2, 0.5)).unwrap();
        assert_eq!(sample_weight(&m, &p, true), 1.0);
        let w = sample_weight(&m, &p, false);
        assert!(w > 0.0 && w < 1.0);
    }

    #[test]
    fn test_weight_falls_to_zero_at_rim_and_outside_image() {
        let m = mapping();
        let rim = DiscPoint {
            position: Vec2::new(300.0, 150.0),
            rho: 1.0,
        };
        assert_eq!(sample_weight(&m, &rim, true), 0.0);
        let outside = DiscPoint {
            position: Vec2::new(-5.0, 150.0),
            rho: 0.5,
        };
        assert_eq!(sample_weight(&m, &outside, false), 0.0);
        let near_rim = DiscPoint {
            position: Vec2::new(299.0, 150.0),
            rho: 0.99,
        };
        assert!(sample_weight(&m, &near_rim, false) < 0.02);
    }

    #[test]
    fn test_single_sample_normalizes_to_itself() {
        let mut acc = Accumulator::default();
        acc.add([0.25, 2.0, 7.5, 1.0], 1.0);
        assert_eq!(finalize(acc, FinalizeOptions::default()), [0.25, 2.0, 7.5, 1.0]);
    }

    #[test]
    fn test_weighted_average_law() {
        let samples = [([1.0, 0.0, 0.0, 1.0], 0.2), ([0.0, 1.0, 0.0, 1.0], 0.6), ([0.0, 0.0, 3.0, 1.0], 0.1)];
        let mut acc = Accumulator::default();
        for (color, w) in samples {
            acc.add(color, w);
        }
        let out = finalize(acc, FinalizeOptions::default());
        let total: f32 = samples.iter().map(|(_, w)| w).sum();
        for c in 0..3 {
            let expected: f32 = samples.iter().map(|(col, w)| col[c] * w).sum::<f32>() / total;
            assert!((out[c] - expected).abs() < EPSILON, "channel {c}");
        }
        assert_eq!(out[3], 1.0);
    }

    #[test]
    fn test_zero_weight_is_background() {
        let out = finalize(Accumulator::default(), FinalizeOptions::default());
        assert_eq!(out, [0.0; 4]);
        let quality = FinalizeOptions {
            quality: true,
            exposure: Some(2.0),
        };
        assert_eq!(finalize(Accumulator::default(), quality), [0.0; 4]);
    }

    #[test]
    fn test_exposure_curve_is_monotonic_and_bounded() {
        assert_eq!(expose(0.0, 0.0), 0.0);
        let mut last = 0.0;
        for i in 1..20 {
            let v = expose(i as f32 * 0.5, 0.0);
            assert!(v > last && v < 1.0);
            last = v;
        }
        assert!(expose(0.5, 1.0) > expose(0.5, 0.0));
    }

    #[test]
    fn test_quality_ramp_endpoints_and_midpoints() {
        assert_eq!(quality_color(0.0), QUALITY_RAMP[0]);
        assert_eq!(quality_color(1.0), QUALITY_RAMP[7]);
        assert_eq!(quality_color(5.0), QUALITY_RAMP[7]);
        let mid = quality_color(1.5 / 7.0);
        for c in 0..3 {
            let expected = (QUALITY_RAMP[1][c] + QUALITY_RAMP[2][c]) / 2.0;
            assert!((mid[c] - expected).abs() < EPSILON);
        }
    }
}
