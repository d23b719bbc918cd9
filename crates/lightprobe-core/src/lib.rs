//! Lightprobe Core: domain layer for stitching mirror-ball photographs.
//!
//! This crate holds the calibration model, the image store, the sphere
//! mesh, per-mode view selection and the blend math, plus a CPU reference
//! compositor. No GPU or file-format dependencies.

pub mod blend;
pub mod calibration;
pub mod image;
pub mod mesh;
pub mod project;
pub mod projection;
pub mod reference;
pub mod request;
pub mod store;

// Re-exports for convenience.
pub use calibration::{Calibration, CalibrationKey};
pub use image::{BitDepth, FloatImage, ProbeImage};
pub use mesh::{MeshConfig, SphereMesh, SphereVertex};
pub use project::{Project, ProjectEntry, ProjectError};
pub use projection::{ImageMapping, ViewTransform, view_transform};
pub use request::{CubeFace, RenderFlags, RenderMode, RenderRequest};
pub use store::{CAPACITY, CalibratedImage, ImageDecoder, ImageStore, StoreError, TextureUpload};
