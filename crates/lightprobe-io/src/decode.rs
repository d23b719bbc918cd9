//! Probe photograph decoding.

use std::path::Path;

use lightprobe_core::image::{BitDepth, ProbeImage};
use lightprobe_core::store::ImageDecoder;
use tracing::debug;

use crate::error::DecodeError;

/// Load a photograph from disk as RGBA f32.
///
/// Supports every format the `image` crate reads. Grayscale sources are
/// spread over RGB; missing alpha becomes 1.
pub fn load_probe(path: &Path) -> Result<ProbeImage, DecodeError> {
    let img = image::open(path)?;
    let color = img.color();
    let channels = color.channel_count();
    let bits = u16::from(color.bytes_per_pixel()) * 8 / u16::from(channels.max(1));

    let source_bit_depth = u8::try_from(bits)
        .ok()
        .and_then(BitDepth::from_bits)
        .filter(|_| (1..=4).contains(&channels))
        .ok_or(DecodeError::Unsupported { channels, bits })?;

    let rgba = img.to_rgba32f();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::Empty);
    }
    let pixels: Vec<[f32; 4]> = rgba.pixels().map(|p| p.0).collect();

    debug!(
        path = %path.display(),
        width,
        height,
        channels,
        depth = %source_bit_depth,
        "decoded probe image"
    );
    Ok(ProbeImage {
        width,
        height,
        channels,
        pixels,
        source_bit_depth,
    })
}

/// [`ImageDecoder`] backed by [`load_probe`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProbeDecoder;

impl ImageDecoder for ProbeDecoder {
    type Error = DecodeError;

    fn decode(&self, path: &Path) -> Result<ProbeImage, DecodeError> {
        load_probe(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, RgbImage};

    #[test]
    fn test_decode_rgb8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        RgbImage::from_pixel(4, 2, Rgb([255, 0, 0])).save(&path).unwrap();

        let probe = ProbeDecoder.decode(&path).unwrap();
        assert_eq!((probe.width, probe.height, probe.channels), (4, 2, 3));
        assert_eq!(probe.source_bit_depth, BitDepth::U8);
        assert_eq!(probe.pixels.len(), 8);
        assert_eq!(probe.pixels[5], [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_decode_gray16_spreads_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        ImageBuffer::<Luma<u16>, Vec<u16>>::from_pixel(3, 3, Luma([65535]))
            .save(&path)
            .unwrap();

        let probe = load_probe(&path).unwrap();
        assert_eq!(probe.channels, 1);
        assert_eq!(probe.source_bit_depth, BitDepth::U16);
        assert_eq!(probe.pixels[4], [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_probe(&dir.path().join("absent.png")).unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)));
    }
}
