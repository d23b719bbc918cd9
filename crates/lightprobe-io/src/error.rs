use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("unsupported pixel layout: {channels} channels at {bits} bits")]
    Unsupported { channels: u8, bits: u16 },
    #[error("image has zero dimensions")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("nothing to write to {}", .0.display())]
    NoPages(PathBuf),
    #[error("page {page} has {channels} channels, expected 3 or 4")]
    Channels { page: usize, channels: u8 },
    #[error("page {page} holds {actual} samples, expected {expected}")]
    Length {
        page: usize,
        expected: usize,
        actual: usize,
    },
}
