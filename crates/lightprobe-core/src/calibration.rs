//! Per-image calibration: where the fisheye disc sits in the photograph and
//! how that disc is oriented on the probe sphere.

use serde::{Deserialize, Serialize};

/// Names one of the six calibration scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationKey {
    /// Disc center, x (pixels).
    CircleX,
    /// Disc center, y (pixels, downward).
    CircleY,
    /// Disc radius (pixels).
    CircleRadius,
    /// Disc orientation, elevation (degrees).
    SphereElevation,
    /// Disc orientation, azimuth (degrees).
    SphereAzimuth,
    /// Disc orientation, roll (degrees).
    SphereRoll,
}

impl CalibrationKey {
    /// Human-readable label for UI and log output.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CircleX => "circle_x",
            Self::CircleY => "circle_y",
            Self::CircleRadius => "circle_radius",
            Self::SphereElevation => "sphere_elevation",
            Self::SphereAzimuth => "sphere_azimuth",
            Self::SphereRoll => "sphere_roll",
        }
    }

    /// Every key, in declaration order.
    pub fn all() -> &'static [Self] {
        const ALL: [CalibrationKey; 6] = [
            CalibrationKey::CircleX,
            CalibrationKey::CircleY,
            CalibrationKey::CircleRadius,
            CalibrationKey::SphereElevation,
            CalibrationKey::SphereAzimuth,
            CalibrationKey::SphereRoll,
        ];
        &ALL
    }
}

/// The six calibration values of one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub circle_x: f32,
    pub circle_y: f32,
    pub circle_radius: f32,
    pub sphere_elevation: f32,
    pub sphere_azimuth: f32,
    pub sphere_roll: f32,
}

impl Calibration {
    /// Starting guess for a freshly loaded image: disc centered in the frame
    /// with a radius of a third of the image height. Not a detected value.
    pub fn initial(width: u32, height: u32) -> Self {
        Self {
            circle_x: width as f32 / 2.0,
            circle_y: height as f32 / 2.0,
            circle_radius: height as f32 / 3.0,
            sphere_elevation: 0.0,
            sphere_azimuth: 0.0,
            sphere_roll: 0.0,
        }
    }

    pub fn get(&self, key: CalibrationKey) -> f32 {
        match key {
            CalibrationKey::CircleX => self.circle_x,
            CalibrationKey::CircleY => self.circle_y,
            CalibrationKey::CircleRadius => self.circle_radius,
            CalibrationKey::SphereElevation => self.sphere_elevation,
            CalibrationKey::SphereAzimuth => self.sphere_azimuth,
            CalibrationKey::SphereRoll => self.sphere_roll,
        }
    }

    pub fn set(&mut self, key: CalibrationKey, value: f32) {
        let field = match key {
            CalibrationKey::CircleX => &mut self.circle_x,
            CalibrationKey::CircleY => &mut self.circle_y,
            CalibrationKey::CircleRadius => &mut self.circle_radius,
            CalibrationKey::SphereElevation => &mut self.sphere_elevation,
            CalibrationKey::SphereAzimuth => &mut self.sphere_azimuth,
            CalibrationKey::SphereRoll => &mut self.sphere_roll,
        };
        *field = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_guess_centers_disc() {
        let c = Calibration::initial(400, 300);
        assert_eq!(c.circle_x, 200.0);
        assert_eq!(c.circle_y, 150.0);
        assert_eq!(c.circle_radius, 100.0);
        assert_eq!(c.sphere_elevation, 0.0);
    }

    #[test]
    fn test_set_then_get_every_key() {
        let mut c = Calibration::initial(10, 10);
        for (i, key) in CalibrationKey::all().iter().enumerate() {
            c.set(*key, i as f32 + 0.5);
        }
        for (i, key) in CalibrationKey::all().iter().enumerate() {
            assert_eq!(c.get(*key), i as f32 + 0.5, "key {}", key.label());
        }
    }

    #[test]
    fn test_key_serializes_snake_case() {
        let json = serde_json::to_string(&CalibrationKey::SphereElevation).unwrap();
        assert_eq!(json, "\"sphere_elevation\"");
    }
}
