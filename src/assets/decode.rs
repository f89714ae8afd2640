use std::io::Cursor;

use image::{DynamicImage, ImageReader, RgbaImage};

use crate::foundation::error::{CardError, CardResult};

/// Source color layout as reported by the decoder, before canonicalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceMode {
    Rgba,
    Rgb,
    Gray,
    GrayAlpha,
    /// Any layout without a dedicated rule (high bit depth, float).
    Other,
}

impl SourceMode {
    fn of(img: &DynamicImage) -> Self {
        match img {
            DynamicImage::ImageRgba8(_) => Self::Rgba,
            DynamicImage::ImageRgb8(_) => Self::Rgb,
            DynamicImage::ImageLuma8(_) => Self::Gray,
            DynamicImage::ImageLumaA8(_) => Self::GrayAlpha,
            _ => Self::Other,
        }
    }
}

/// A decoded image in canonical RGBA8 together with what it was decoded from.
#[derive(Clone, Debug)]
pub struct NormalizedImage {
    pub format: Option<image::ImageFormat>,
    pub mode: SourceMode,
    pub rgba: RgbaImage,
}

/// Decode raw bytes by content sniffing and convert to straight-alpha RGBA8.
///
/// The decoder already expands paletted data: a PNG `tRNS` chunk or GIF transparent index yields
/// RGBA with the keyed entries at alpha 0, plain palettes yield RGB. 1-bit data arrives as
/// grayscale and CMYK JPEGs arrive as RGB, so every layout ends up in one of the branches below.
pub fn normalize_image(bytes: &[u8]) -> CardResult<NormalizedImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CardError::decode(format!("sniff image format: {e}")))?;
    let format = reader.format();
    if format.is_none() {
        return Err(CardError::decode("unrecognized image format"));
    }

    let img = reader
        .decode()
        .map_err(|e| CardError::decode(format!("decode image: {e}")))?;
    let mode = SourceMode::of(&img);

    let rgba = match img {
        DynamicImage::ImageRgba8(rgba) => rgba,
        other @ (DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)) => other.to_rgba8(),
        other => {
            tracing::debug!(color = ?other.color(), "uncommon color layout, converting to rgba8");
            other.to_rgba8()
        }
    };

    Ok(NormalizedImage { format, mode, rgba })
}

/// [`normalize_image`] without the provenance.
pub fn decode_rgba(bytes: &[u8]) -> CardResult<RgbaImage> {
    normalize_image(bytes).map(|n| n.rgba)
}

/// Encode an RGBA8 raster as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> CardResult<Vec<u8>> {
    use anyhow::Context as _;

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .context("encode png")?;
    Ok(buf)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
