use image::RgbaImage;

use crate::{
    config::TileStyle,
    foundation::{
        core::{PixelPos, scaled_dims},
        error::CardResult,
    },
    render::{
        composite::{paste_masked, resize_rgba},
        shape::{fill_rounded_rect, rounded_rect_mask},
    },
};

/// Turn a source image into a lineup tile.
///
/// 1. Lanczos resize by `style.scale_factor` (dimensions floored).
/// 2. Crop the top-left `side x side` square, `side = min(w, h)`.
/// 3. On a transparent `(side + 2b)^2` canvas, fill a rounded rect of radius `corner + b` with the
///    border color.
/// 4. Paste the square at `(b, b)` through a rounded-rect mask of radius `corner`.
///
/// The result is a pure function of `img` and `style`.
#[tracing::instrument(level = "trace", skip(img), fields(width = img.width(), height = img.height()))]
pub fn decorate(img: &RgbaImage, style: &TileStyle) -> CardResult<RgbaImage> {
    let (w, h) = scaled_dims(img.width(), img.height(), style.scale_factor)?;
    let resized = resize_rgba(img, w, h);

    let side = w.min(h);
    let square = image::imageops::crop_imm(&resized, 0, 0, side, side).to_image();

    let border = style.border_width;
    let out_side = side + 2 * border;
    let mut tile = RgbaImage::new(out_side, out_side);
    fill_rounded_rect(
        &mut tile,
        f64::from(style.corner_radius + border),
        style.border_color,
    );

    let mask = rounded_rect_mask(side, side, f64::from(style.corner_radius));
    let offset = i64::from(border);
    paste_masked(&mut tile, &square, PixelPos::new(offset, offset), &mask)?;

    Ok(tile)
}

#[cfg(test)]
#[path = "../../tests/unit/render/decorate.rs"]
mod tests;
