//! View/projection selection per render mode, and the per-image mapping
//! from a direction on the sphere to a point in that image's fisheye disc.
//!
//! All matrices target wgpu clip space (depth in `[0, 1]`, y up).
//!
//! # Disc model
//! The probe is a mirror ball. In an image's local frame the camera looks
//! down −z, so the local +z direction reflects straight back into the lens
//! and lands on the disc centre, while −z grazes the rim. A local direction
//! `l` lands at normalized radius `ρ = √((1 − l.z) / 2)`:
//! ```text
//! u = cx + r · l.x / √(2 (1 + l.z))
//! v = cy − r · l.y / √(2 (1 + l.z))
//! ```

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4Swizzles};

use crate::calibration::Calibration;
use crate::request::{CubeFace, RenderMode, RenderRequest};

const GLOBE_NEAR: f32 = 2.0;
const GLOBE_FAR: f32 = 10.0;
const GLOBE_DISTANCE: f32 = 5.0;
const CUBE_NEAR: f32 = 0.1;
const CUBE_FAR: f32 = 10.0;
/// Radius of the polar layout's disc.
pub const POLAR_RADIUS: f32 = 2.0;
/// Aspect ratio (width / height) of the chart layout.
pub const CHART_ASPECT: f32 = 2.0;

/// Projection and view matrices for one destination surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub projection: Mat4,
    pub view: Mat4,
}

impl ViewTransform {
    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Select the view transform for `request`.
///
/// `image_size` is the selected image's size and is only consulted in
/// [`RenderMode::Image`], where it defaults to a unit square.
pub fn view_transform(request: &RenderRequest, image_size: Option<(u32, u32)>) -> ViewTransform {
    let aspect = request.aspect();
    let zoom = request.zoom.max(1e-3);
    let [pan_x, pan_y] = request.pan;

    match request.mode {
        RenderMode::Globe => {
            let fovy = 2.0 * (1.0 / (2.0 * zoom)).atan();
            ViewTransform {
                projection: Mat4::perspective_rh(fovy, aspect, GLOBE_NEAR, GLOBE_FAR),
                view: Mat4::from_translation(Vec3::new(0.0, 0.0, -GLOBE_DISTANCE))
                    * Mat4::from_rotation_x(pan_y.to_radians())
                    * Mat4::from_rotation_y(pan_x.to_radians()),
            }
        }
        RenderMode::CubeFace(face) => ViewTransform {
            projection: Mat4::perspective_rh(FRAC_PI_2, 1.0, CUBE_NEAR, CUBE_FAR),
            view: cube_face_view(face),
        },
        RenderMode::Chart => {
            // Fit in display units, where the chart is twice as wide as tall.
            let (hw, hh) = fit_half_extents(0.5 * CHART_ASPECT, 0.5, aspect);
            let hw = hw / CHART_ASPECT;
            ortho_view(Vec2::new(0.5 + pan_x, 0.5 + pan_y), hw / zoom, hh / zoom, false)
        }
        RenderMode::Polar => {
            let (hw, hh) = fit_half_extents(POLAR_RADIUS, POLAR_RADIUS, aspect);
            ortho_view(Vec2::new(pan_x, pan_y), hw / zoom, hh / zoom, false)
        }
        RenderMode::Image => {
            let (w, h) = image_size.unwrap_or((1, 1));
            let (w, h) = (w.max(1) as f32, h.max(1) as f32);
            let (hw, hh) = fit_half_extents(w / 2.0, h / 2.0, aspect);
            let center = Vec2::new(w / 2.0 + pan_x, h / 2.0 + pan_y);
            ortho_view(center, hw / zoom, hh / zoom, true)
        }
    }
}

/// Grow the natural half extents of a layout so it fits a viewport of the
/// given aspect without distortion.
fn fit_half_extents(half_w: f32, half_h: f32, aspect: f32) -> (f32, f32) {
    if aspect >= half_w / half_h {
        (half_h * aspect, half_h)
    } else {
        (half_w, half_w / aspect)
    }
}

fn ortho_view(center: Vec2, half_w: f32, half_h: f32, y_down: bool) -> ViewTransform {
    let (bottom, top) = if y_down {
        (center.y + half_h, center.y - half_h)
    } else {
        (center.y - half_h, center.y + half_h)
    };
    ViewTransform {
        projection: Mat4::orthographic_rh(
            center.x - half_w,
            center.x + half_w,
            bottom,
            top,
            -1.0,
            1.0,
        ),
        view: Mat4::IDENTITY,
    }
}

/// Looking direction and up vector of each cube face, seen from the centre.
pub fn cube_face_basis(face: CubeFace) -> (Vec3, Vec3) {
    match face {
        CubeFace::PosX => (Vec3::X, Vec3::Y),
        CubeFace::NegX => (Vec3::NEG_X, Vec3::Y),
        CubeFace::PosY => (Vec3::Y, Vec3::NEG_Z),
        CubeFace::NegY => (Vec3::NEG_Y, Vec3::Z),
        CubeFace::PosZ => (Vec3::Z, Vec3::Y),
        CubeFace::NegZ => (Vec3::NEG_Z, Vec3::Y),
    }
}

pub fn cube_face_view(face: CubeFace) -> Mat4 {
    let (dir, up) = cube_face_basis(face);
    Mat4::look_at_rh(Vec3::ZERO, dir, up)
}

/// Local-to-world rotation of an image's disc: roll about the viewing axis
/// first, then elevation, then azimuth.
pub fn orientation(calibration: &Calibration) -> Mat3 {
    Mat3::from_rotation_y(calibration.sphere_azimuth.to_radians())
        * Mat3::from_rotation_x(-calibration.sphere_elevation.to_radians())
        * Mat3::from_rotation_z(calibration.sphere_roll.to_radians())
}

/// Where a sphere direction lands in an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscPoint {
    /// Pixel-space position in the source image (y down).
    pub position: Vec2,
    /// Normalized distance from the disc centre, 1.0 on the rim.
    pub rho: f32,
}

/// Sphere-to-disc mapping of one calibrated image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageMapping {
    pub world_to_local: Mat3,
    pub center: Vec2,
    pub radius: f32,
    pub image_size: Vec2,
}

impl ImageMapping {
    pub fn new(calibration: &Calibration, width: u32, height: u32) -> Self {
        Self {
            world_to_local: orientation(calibration).transpose(),
            center: Vec2::new(calibration.circle_x, calibration.circle_y),
            radius: calibration.circle_radius,
            image_size: Vec2::new(width as f32, height as f32),
        }
    }

    /// Map a world direction into the image. `None` only for the single
    /// direction that grazes the rim (the disc's antipode).
    pub fn to_disc(&self, direction: Vec3) -> Option<DiscPoint> {
        let l = self.world_to_local * direction.normalize_or_zero();
        let denom = (2.0 * (1.0 + l.z)).max(0.0).sqrt();
        if denom < 1e-6 {
            return None;
        }
        Some(DiscPoint {
            position: self.center + self.radius * Vec2::new(l.x, -l.y) / denom,
            rho: ((1.0 - l.z) / 2.0).max(0.0).sqrt(),
        })
    }

    /// Whether a pixel-space position lies within the image bounds.
    pub fn in_image(&self, position: Vec2) -> bool {
        position.cmpge(Vec2::ZERO).all() && position.cmple(self.image_size).all()
    }
}

/// Direction on the unit sphere for chart coordinates in `[0, 1]²`.
pub fn chart_to_direction(chart: Vec2) -> Option<Vec3> {
    if chart.cmplt(Vec2::ZERO).any() || chart.cmpgt(Vec2::ONE).any() {
        return None;
    }
    let azimuth = 2.0 * PI * chart.x - PI;
    let elevation = PI * chart.y - FRAC_PI_2;
    Some(spherical(elevation, azimuth))
}

/// Direction on the unit sphere for a point of the polar disc.
pub fn polar_to_direction(polar: Vec2) -> Option<Vec3> {
    let radius = polar.length();
    if radius > POLAR_RADIUS {
        return None;
    }
    let y = 1.0 - radius / POLAR_RADIUS;
    let elevation = PI * y - FRAC_PI_2;
    let azimuth = polar.y.atan2(polar.x);
    Some(spherical(elevation, azimuth))
}

fn spherical(elevation: f32, azimuth: f32) -> Vec3 {
    Vec3::new(
        azimuth.sin() * elevation.cos(),
        elevation.sin(),
        azimuth.cos() * elevation.cos(),
    )
}

/// Invert `view_transform` at a clip-space point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unprojected {
    /// A direction on the sphere.
    Sphere(Vec3),
    /// A pixel-space position in the selected image (image mode).
    Image(Vec2),
    /// Nothing is drawn here.
    Background,
}

/// Find what a destination pixel shows, given its clip-space position.
pub fn unproject(mode: RenderMode, transform: &ViewTransform, ndc: Vec2) -> Unprojected {
    let inverse = transform.view_proj().inverse();
    let point = |z: f32| {
        let p = inverse * ndc.extend(z).extend(1.0);
        p.xyz() / p.w
    };

    let direction = match mode {
        RenderMode::Image => return Unprojected::Image(point(0.5).truncate()),
        RenderMode::Chart => chart_to_direction(point(0.5).truncate()),
        RenderMode::Polar => polar_to_direction(point(0.5).truncate()),
        RenderMode::CubeFace(_) => Some((point(1.0) - point(0.0)).normalize()),
        RenderMode::Globe => {
            let origin = point(0.0);
            let dir = (point(1.0) - origin).normalize();
            let b = origin.dot(dir);
            let c = origin.length_squared() - 1.0;
            let disc = b * b - c;
            (disc >= 0.0).then(|| (origin + dir * (-b - disc.sqrt())).normalize())
        }
    };
    direction.map_or(Unprojected::Background, Unprojected::Sphere)
}
