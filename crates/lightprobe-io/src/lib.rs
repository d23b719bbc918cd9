//! File collaborators for lightprobe: probe photograph decoding and float
//! TIFF export.
//!
//! Decoding goes through the `image` crate and accepts 1–4 channel images
//! at 8, 16 or 32 bits per channel. Exports are 32-bit float TIFF files
//! tagged with a linear sRGB ICC profile; cube exports are written as one
//! six-page file.

mod decode;
mod encode;
mod error;
pub mod icc;

pub use decode::{ProbeDecoder, load_probe};
pub use encode::write_float_tiff;
pub use error::{DecodeError, EncodeError};
