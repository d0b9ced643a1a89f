//! Thumbnail decoding.

use std::io::Cursor;

use anyhow::{Context, anyhow};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder as _, ImageReader};

use crate::types::ImageDimensions;

use super::Result;

/// RGBA pixel buffer produced from a thumbnail's encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub dimensions: ImageDimensions,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Straight-alpha RGBA8888, row-major from the top-left corner.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Decode a thumbnail served by the remote source.
///
/// The format is sniffed from the bytes (remote paths do not reliably carry an extension) and
/// EXIF orientation is applied, so the reported dimensions are the ones to display.
pub fn decode_thumbnail(data: &[u8]) -> Result<DecodedImage> {
    if data.is_empty() {
        return Err(anyhow!("empty thumbnail data"));
    }

    let reader =
        ImageReader::new(Cursor::new(data)).with_guessed_format().context("guessing image format")?;
    let mut decoder = reader.into_decoder().context("constructing thumbnail decoder")?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder).context("decoding thumbnail")?;
    if orientation != Orientation::NoTransforms {
        image.apply_orientation(orientation);
    }

    let rgba = image.into_rgba8();
    let dimensions = ImageDimensions { width: rgba.width(), height: rgba.height() };
    Ok(DecodedImage { dimensions, pixels: rgba.into_raw() })
}
