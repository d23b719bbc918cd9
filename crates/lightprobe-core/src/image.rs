//! Decoded probe photographs, as handed over by the decode collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit depths accepted from source images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit floating point. Preferred for HDR fidelity.
    F32,
}

impl BitDepth {
    /// Map a bits-per-channel count onto a supported depth.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(Self::U8),
            16 => Some(Self::U16),
            32 => Some(Self::F32),
            _ => None,
        }
    }

    /// Bits per channel.
    pub fn bits(self) -> u8 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::F32 => 32,
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "8-bit"),
            Self::U16 => write!(f, "16-bit"),
            Self::F32 => write!(f, "32-bit float"),
        }
    }
}

/// A decoded source photograph. Always stored as RGBA f32, rows top to bottom.
#[derive(Debug, Clone)]
pub struct ProbeImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Channel count of the source file (1–4).
    pub channels: u8,
    /// Pixel data in RGBA f32 format.
    pub pixels: Vec<[f32; 4]>,
    /// Original bit depth of the source image.
    pub source_bit_depth: BitDepth,
}

impl ProbeImage {
    /// A uniformly colored image, mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, color: [f32; 4]) -> Self {
        Self {
            width,
            height,
            channels: 4,
            pixels: vec![color; (width as usize) * (height as usize)],
            source_bit_depth: BitDepth::F32,
        }
    }

    /// Texel at integer coordinates, clamped to the image edge.
    pub fn texel(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.pixels[y * self.width as usize + x]
    }

    /// Bilinear sample at pixel-space coordinates (`0.0` is the left/top edge),
    /// clamped to edge. Matches a linear, clamp-to-edge GPU sampler.
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        if self.pixels.is_empty() {
            return [0.0; 4];
        }
        let x = u - 0.5;
        let y = v - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let a = self.texel(x0, y0);
        let b = self.texel(x0 + 1, y0);
        let c = self.texel(x0, y0 + 1);
        let d = self.texel(x0 + 1, y0 + 1);

        std::array::from_fn(|i| {
            let top = a[i] + (b[i] - a[i]) * fx;
            let bottom = c[i] + (d[i] - c[i]) * fx;
            top + (bottom - top) * fy
        })
    }
}

/// Interleaved float pixels read back from a render, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    pub width: u32,
    pub height: u32,
    /// 3 (RGB) or 4 (RGBA).
    pub channels: u8,
    pub data: Vec<f32>,
}

impl FloatImage {
    /// Pack RGBA pixels, keeping the first `channels` components of each.
    pub fn from_rgba(width: u32, height: u32, pixels: &[[f32; 4]], channels: u8) -> Self {
        let n = channels.clamp(1, 4) as usize;
        Self {
            width,
            height,
            channels: n as u8,
            data: pixels.iter().flat_map(|p| p[..n].iter().copied()).collect(),
        }
    }

    /// Components of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[f32] {
        let n = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * n;
        &self.data[start..start + n]
    }
}
