//! 32-bit float TIFF export.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use lightprobe_core::image::FloatImage;
use tiff::encoder::{TiffEncoder, TiffKind, colortype};
use tiff::tags::Tag;
use tracing::info;

use crate::error::EncodeError;
use crate::icc::{TIFF_ICC_TAG, linear_srgb_profile};

/// Write `pages` as one float TIFF, one directory per page, each tagged
/// with the linear sRGB profile.
///
/// A chart or polar export is a single page; a cube export is six.
pub fn write_float_tiff(path: &Path, pages: &[FloatImage]) -> Result<(), EncodeError> {
    if pages.is_empty() {
        return Err(EncodeError::NoPages(path.to_path_buf()));
    }
    for (page, image) in pages.iter().enumerate() {
        validate(page, image)?;
    }

    let profile = linear_srgb_profile();
    let mut writer = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(&mut writer)?;
    for image in pages {
        match image.channels {
            4 => write_page::<_, colortype::RGBA32Float, _>(&mut encoder, image, &profile)?,
            _ => write_page::<_, colortype::RGB32Float, _>(&mut encoder, image, &profile)?,
        }
    }
    drop(encoder);
    writer.flush()?;

    info!(
        path = %path.display(),
        pages = pages.len(),
        width = pages[0].width,
        height = pages[0].height,
        "wrote float TIFF"
    );
    Ok(())
}

fn validate(page: usize, image: &FloatImage) -> Result<(), EncodeError> {
    if !matches!(image.channels, 3 | 4) {
        return Err(EncodeError::Channels {
            page,
            channels: image.channels,
        });
    }
    let expected = image.width as usize * image.height as usize * image.channels as usize;
    if image.data.len() != expected {
        return Err(EncodeError::Length {
            page,
            expected,
            actual: image.data.len(),
        });
    }
    Ok(())
}

fn write_page<W, C, K>(
    encoder: &mut TiffEncoder<W, K>,
    image: &FloatImage,
    profile: &[u8],
) -> Result<(), EncodeError>
where
    W: Write + Seek,
    C: colortype::ColorType<Inner = f32>,
    K: TiffKind,
{
    let mut page = encoder.new_image::<C>(image.width, image.height)?;
    page.encoder().write_tag(Tag::from_u16_exhaustive(TIFF_ICC_TAG), profile)?;
    page.write_data(&image.data)?;
    Ok(())
}
