//! CPU reference compositor.
//!
//! Evaluates the accumulate and normalize passes analytically at every
//! destination pixel centre. The GPU compositor rasterizes the sphere mesh
//! instead, so results agree up to tessellation and filtering error. Used
//! to check the GPU path and to test the blend law without a device.

use glam::Vec2;
use tracing::debug;

use crate::blend::{self, Accumulator, FinalizeOptions};
use crate::image::{FloatImage, ProbeImage};
use crate::projection::{self, ImageMapping, Unprojected};
use crate::request::{RenderFlags, RenderMode, RenderRequest};
use crate::store::ImageStore;

/// Accumulated and finalized pixels of one reference composite.
#[derive(Debug, Clone)]
pub struct ReferenceFrame {
    pub width: u32,
    pub height: u32,
    pub accumulation: Vec<Accumulator>,
    pub output: Vec<[f32; 4]>,
}

impl ReferenceFrame {
    /// Accumulated weight at `(x, y)`.
    pub fn weight(&self, x: u32, y: u32) -> f32 {
        self.accumulation[self.index(x, y)].weight()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.output[self.index(x, y)]
    }

    pub fn to_float_image(&self, channels: u8) -> FloatImage {
        FloatImage::from_rgba(self.width, self.height, &self.output, channels)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Run the accumulate and normalize passes for `request` on the CPU.
pub fn composite(store: &ImageStore<ProbeImage>, request: &RenderRequest) -> ReferenceFrame {
    let (width, height) = (request.width.max(1), request.height.max(1));
    let selected = store.selected_image();
    let transform =
        projection::view_transform(request, selected.map(|img| (img.width, img.height)));

    let images: Vec<_> = match request.mode {
        RenderMode::Image => selected.into_iter().collect(),
        _ => store.contributing(request.flags.contains(RenderFlags::BLEND_ALL)),
    };
    let single = images.len() == 1;
    let mappings: Vec<_> = images
        .iter()
        .map(|img| ImageMapping::new(&img.calibration, img.width, img.height))
        .collect();
    debug!(
        mode = request.mode.label(),
        width,
        height,
        images = images.len(),
        "reference composite"
    );

    let options = FinalizeOptions {
        exposure: request.exposure,
        quality: request.flags.contains(RenderFlags::QUALITY),
    };

    let mut accumulation = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let ndc = Vec2::new(
                (x as f32 + 0.5) / width as f32 * 2.0 - 1.0,
                1.0 - (y as f32 + 0.5) / height as f32 * 2.0,
            );
            let mut acc = Accumulator::default();
            match projection::unproject(request.mode, &transform, ndc) {
                Unprojected::Sphere(direction) => {
                    for (img, mapping) in images.iter().zip(&mappings) {
                        let Some(point) = mapping.to_disc(direction) else {
                            continue;
                        };
                        let w = blend::sample_weight(mapping, &point, single);
                        if w > 0.0 {
                            acc.add(img.texture.sample(point.position.x, point.position.y), w);
                        }
                    }
                }
                Unprojected::Image(position) => {
                    if let (Some(img), Some(mapping)) = (images.first(), mappings.first()) {
                        if mapping.in_image(position) {
                            acc.add(img.texture.sample(position.x, position.y), 1.0);
                        }
                    }
                }
                Unprojected::Background => {}
            }
            accumulation.push(acc);
        }
    }

    let output = accumulation
        .iter()
        .map(|acc| blend::finalize(*acc, options))
        .collect();

    ReferenceFrame {
        width,
        height,
        accumulation,
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationKey;
    use crate::request::CubeFace;
    use crate::store::CpuUpload;

    const EPSILON: f32 = 1e-4;

    fn single_probe(color: [f32; 4]) -> ImageStore<ProbeImage> {
        let mut store = ImageStore::new();
        store
            .insert("probe.tif", &ProbeImage::filled(400, 300, color), &mut CpuUpload)
            .unwrap();
        store.move_circle(200.0, 150.0, 100.0).unwrap();
        store
    }

    #[test]
    fn test_polar_single_image_weight_pattern() {
        let store = single_probe([0.8, 0.4, 0.2, 1.0]);
        let request = RenderRequest::new(RenderMode::Polar, 256, 256);
        let frame = composite(&store, &request);
        let mapping = ImageMapping::new(&store.selected_image().unwrap().calibration, 400, 300);
        let transform = projection::view_transform(&request, None);

        for y in (0..256).step_by(7) {
            for x in (0..256).step_by(7) {
                let ndc = Vec2::new(
                    (x as f32 + 0.5) / 128.0 - 1.0,
                    1.0 - (y as f32 + 0.5) / 128.0,
                );
                let w = frame.weight(x, y);
                let covered = match projection::unproject(request.mode, &transform, ndc) {
                    Unprojected::Sphere(d) => mapping
                        .to_disc(d)
                        .is_some_and(|p| p.rho < 1.0 && mapping.in_image(p.position)),
                    _ => false,
                };
                if covered {
                    assert_eq!(w, 1.0, "pixel ({x}, {y})");
                    let out = frame.pixel(x, y);
                    assert!((out[0] - 0.8).abs() < EPSILON);
                    assert_eq!(out[3], 1.0);
                } else {
                    assert_eq!(w, 0.0, "pixel ({x}, {y})");
                    assert_eq!(frame.pixel(x, y), [0.0; 4]);
                }
            }
        }
        // Corners lie outside the polar disc, the centre is the north pole.
        assert_eq!(frame.weight(0, 0), 0.0);
        assert_eq!(frame.weight(128, 128), 1.0);
    }

    #[test]
    fn test_single_image_identity_through_chart() {
        let mut image = ProbeImage::filled(400, 300, [0.0; 4]);
        for (i, px) in image.pixels.iter_mut().enumerate() {
            let (x, y) = ((i % 400) as f32, (i / 400) as f32);
            *px = [x / 400.0, y / 300.0, 0.5, 1.0];
        }
        let mut store = ImageStore::new();
        store.insert("gradient.tif", &image, &mut CpuUpload).unwrap();
        let request = RenderRequest::new(RenderMode::Chart, 128, 64);
        let frame = composite(&store, &request);

        let mapping = ImageMapping::new(&store.selected_image().unwrap().calibration, 400, 300);
        let transform = projection::view_transform(&request, None);
        let ndc = Vec2::new((64.5 / 128.0) * 2.0 - 1.0, 1.0 - (20.5 / 64.0) * 2.0);
        let Unprojected::Sphere(d) = projection::unproject(request.mode, &transform, ndc) else {
            panic!("chart pixel should hit the sphere");
        };
        let p = mapping.to_disc(d).unwrap();
        let expected = image.sample(p.position.x, p.position.y);
        let out = frame.pixel(64, 20);
        for c in 0..3 {
            assert!((out[c] - expected[c]).abs() < EPSILON);
        }
    }

    #[test]
    fn test_blend_all_is_weighted_average() {
        let mut store = ImageStore::new();
        let red = ProbeImage::filled(400, 300, [1.0, 0.0, 0.0, 1.0]);
        let blue = ProbeImage::filled(400, 300, [0.0, 0.0, 1.0, 1.0]);
        store.insert("red.tif", &red, &mut CpuUpload).unwrap();
        store.insert("blue.tif", &blue, &mut CpuUpload).unwrap();
        store.select(1).unwrap();
        store.set(CalibrationKey::SphereAzimuth, 90.0).unwrap();

        let request = RenderRequest::new(RenderMode::CubeFace(CubeFace::PosZ), 16, 16)
            .with_flags(RenderFlags::BLEND_ALL);
        let frame = composite(&store, &request);

        let transform = projection::view_transform(&request, None);
        let red_map = ImageMapping::new(&store.image(0).unwrap().calibration, 400, 300);
        let blue_map = ImageMapping::new(&store.image(1).unwrap().calibration, 400, 300);
        for (x, y) in [(8, 8), (2, 3), (14, 9)] {
            let ndc = Vec2::new((x as f32 + 0.5) / 8.0 - 1.0, 1.0 - (y as f32 + 0.5) / 8.0);
            let Unprojected::Sphere(d) = projection::unproject(request.mode, &transform, ndc) else {
                panic!("cube pixel should hit the sphere");
            };
            let wr = blend::sample_weight(&red_map, &red_map.to_disc(d).unwrap(), false);
            let wb = blend::sample_weight(&blue_map, &blue_map.to_disc(d).unwrap(), false);
            let out = frame.pixel(x, y);
            assert!((frame.weight(x, y) - (wr + wb)).abs() < EPSILON);
            assert!((out[0] - wr / (wr + wb)).abs() < EPSILON);
            assert!((out[2] - wb / (wr + wb)).abs() < EPSILON);
        }
    }

    #[test]
    fn test_selected_only_ignores_other_images() {
        let mut store = single_probe([0.0, 1.0, 0.0, 1.0]);
        let red = ProbeImage::filled(400, 300, [1.0, 0.0, 0.0, 1.0]);
        store.insert("red.tif", &red, &mut CpuUpload).unwrap();
        let request = RenderRequest::new(RenderMode::Globe, 32, 32);
        let frame = composite(&store, &request);
        assert_eq!(frame.pixel(16, 16), [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(frame.weight(0, 0), 0.0);
    }

    #[test]
    fn test_hidden_images_are_skipped() {
        let mut store = single_probe([0.0, 1.0, 0.0, 1.0]);
        let red = ProbeImage::filled(400, 300, [1.0, 0.0, 0.0, 1.0]);
        let slot = store.insert("red.tif", &red, &mut CpuUpload).unwrap();
        store.set_hidden(slot, true).unwrap();
        let request = RenderRequest::new(RenderMode::Globe, 32, 32)
            .with_flags(RenderFlags::BLEND_ALL);
        let frame = composite(&store, &request);
        let out = frame.pixel(16, 16);
        assert!((out[1] - 1.0).abs() < EPSILON && out[0].abs() < EPSILON);
    }

    #[test]
    fn test_image_mode_shows_photo_with_letterbox() {
        let store = single_probe([0.3, 0.3, 0.3, 1.0]);
        // Viewport twice as wide as the 4:3 photo leaves side bars empty.
        let request = RenderRequest::new(RenderMode::Image, 80, 30);
        let frame = composite(&store, &request);
        assert_eq!(frame.weight(40, 15), 1.0);
        assert_eq!(frame.weight(1, 15), 0.0);
        assert_eq!(frame.weight(78, 15), 0.0);
    }

    #[test]
    fn test_quality_view_replaces_color() {
        let store = single_probe([0.3, 0.3, 0.3, 1.0]);
        let request =
            RenderRequest::new(RenderMode::Polar, 32, 32).with_flags(RenderFlags::QUALITY);
        let frame = composite(&store, &request);
        let out = frame.pixel(16, 16);
        assert_eq!(&out[..3], &blend::QUALITY_RAMP[7]);
    }

    #[test]
    fn test_empty_store_renders_background() {
        let store: ImageStore<ProbeImage> = ImageStore::new();
        let frame = composite(&store, &RenderRequest::new(RenderMode::Chart, 8, 4));
        assert!(frame.output.iter().all(|p| *p == [0.0; 4]));
        assert_eq!(frame.to_float_image(3).data.len(), 8 * 4 * 3);
    }
}
