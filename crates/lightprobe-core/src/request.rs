//! Per-call render parameters. Nothing here is remembered between calls.

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// One face of the six-face cube output, in export order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CubeFace {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl CubeFace {
    /// All faces in export page order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Output projection of a composite call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    /// The selected source photograph, flat, for calibration.
    Image,
    /// Perspective view of the sphere from outside.
    Globe,
    /// Equirectangular map.
    Chart,
    /// Azimuthal disc (dome) map.
    Polar,
    /// One face of a cube map, seen from the sphere centre.
    CubeFace(CubeFace),
}

impl RenderMode {
    /// Whether this mode renders the sphere mesh (everything but `Image`).
    pub fn is_spherical(self) -> bool {
        !matches!(self, Self::Image)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Globe => "globe",
            Self::Chart => "chart",
            Self::Polar => "polar",
            Self::CubeFace(_) => "cube",
        }
    }
}

/// Render option bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderFlags(u32);

impl RenderFlags {
    pub const NONE: Self = Self(0);
    /// Draw the wireframe and grid overlay.
    pub const GRID: Self = Self(1);
    /// Replace color with a false-color view of the blend weight.
    pub const QUALITY: Self = Self(1 << 1);
    /// Blend every visible loaded image instead of only the selected one.
    pub const BLEND_ALL: Self = Self(1 << 2);
    /// Keep the alpha channel in exported pixels.
    pub const ALPHA: Self = Self(1 << 3);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: Self, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for RenderFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RenderFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Complete description of one composite call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub mode: RenderMode,
    pub flags: RenderFlags,
    /// Destination width in pixels.
    pub width: u32,
    /// Destination height in pixels.
    pub height: u32,
    /// View offset. Yaw/pitch in degrees for `Globe`; an offset of the view
    /// centre in the mode's own plane coordinates for `Chart`, `Polar` and
    /// `Image` (chart units, disc units, source pixels). Ignored for cube faces.
    pub pan: [f32; 2],
    /// Magnification, 1.0 shows the whole projection. Ignored for cube faces.
    pub zoom: f32,
    /// Exposure in stops. `None` leaves linear values untouched.
    pub exposure: Option<f32>,
}

impl RenderRequest {
    pub fn new(mode: RenderMode, width: u32, height: u32) -> Self {
        Self {
            mode,
            flags: RenderFlags::NONE,
            width,
            height,
            pan: [0.0, 0.0],
            zoom: 1.0,
            exposure: None,
        }
    }

    pub fn with_flags(mut self, flags: RenderFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = Some(exposure);
        self
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    /// Channel count of read-back pixels.
    pub fn channels(&self) -> u8 {
        if self.flags.contains(RenderFlags::ALPHA) {
            4
        } else {
            3
        }
    }
}
