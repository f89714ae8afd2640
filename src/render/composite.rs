use image::{GrayImage, RgbaImage, imageops::FilterType};

use crate::foundation::{
    core::PixelPos,
    error::{CardError, CardResult},
};

pub type StraightRgba8 = [u8; 4];

/// Porter-Duff source-over on straight-alpha pixels.
pub fn over(dst: StraightRgba8, src: StraightRgba8) -> StraightRgba8 {
    let sa = u32::from(src[3]);
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }

    let da = u32::from(dst[3]);
    // Alphas scaled by 255*255 to stay in integers.
    let dst_w = da * (255 - sa);
    let src_w = sa * 255;
    let out_w = src_w + dst_w;

    let mut out = [0u8; 4];
    out[3] = ((out_w + 127) / 255) as u8;
    for i in 0..3 {
        let c = u32::from(src[i]) * src_w + u32::from(dst[i]) * dst_w;
        out[i] = ((c + out_w / 2) / out_w).min(255) as u8;
    }
    out
}

/// Mask-weighted replacement: `dst + (src - dst) * m/255` on every channel, alpha included.
pub fn lerp_masked(dst: StraightRgba8, src: StraightRgba8, m: u8) -> StraightRgba8 {
    match m {
        0 => dst,
        255 => src,
        _ => {
            let m = u32::from(m);
            let inv = 255 - m;
            let mut out = [0u8; 4];
            for i in 0..4 {
                out[i] = ((u32::from(src[i]) * m + u32::from(dst[i]) * inv + 127) / 255) as u8;
            }
            out
        }
    }
}

/// Overlap of a `w x h` source placed at `pos` with a `dst_w x dst_h` destination, as
/// `(dst_x, dst_y, src_x, src_y, width, height)`.
fn clip(
    dst_w: u32,
    dst_h: u32,
    w: u32,
    h: u32,
    pos: PixelPos,
) -> Option<(u32, u32, u32, u32, u32, u32)> {
    let x0 = pos.x.max(0);
    let y0 = pos.y.max(0);
    let x1 = (pos.x + i64::from(w)).min(i64::from(dst_w));
    let y1 = (pos.y + i64::from(h)).min(i64::from(dst_h));
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((
        x0 as u32,
        y0 as u32,
        (x0 - pos.x) as u32,
        (y0 - pos.y) as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    ))
}

/// Composite `src` over `dst` at `pos` using `src`'s own alpha. Out-of-bounds parts are dropped.
pub fn overlay_at(dst: &mut RgbaImage, src: &RgbaImage, pos: PixelPos) {
    let Some((dx, dy, sx, sy, w, h)) = clip(dst.width(), dst.height(), src.width(), src.height(), pos)
    else {
        return;
    };
    for y in 0..h {
        for x in 0..w {
            let s = src.get_pixel(sx + x, sy + y).0;
            let d = dst.get_pixel_mut(dx + x, dy + y);
            d.0 = over(d.0, s);
        }
    }
}

/// Paste `src` into `dst` at `pos`, weighting each pixel by `mask` (same size as `src`).
pub fn paste_masked(
    dst: &mut RgbaImage,
    src: &RgbaImage,
    pos: PixelPos,
    mask: &GrayImage,
) -> CardResult<()> {
    if mask.dimensions() != src.dimensions() {
        return Err(CardError::Other(anyhow::anyhow!(
            "paste mask {:?} does not match source {:?}",
            mask.dimensions(),
            src.dimensions()
        )));
    }
    let Some((dx, dy, sx, sy, w, h)) = clip(dst.width(), dst.height(), src.width(), src.height(), pos)
    else {
        return Ok(());
    };
    for y in 0..h {
        for x in 0..w {
            let m = mask.get_pixel(sx + x, sy + y).0[0];
            let s = src.get_pixel(sx + x, sy + y).0;
            let d = dst.get_pixel_mut(dx + x, dy + y);
            d.0 = lerp_masked(d.0, s, m);
        }
    }
    Ok(())
}

/// `top` over `bottom`, both the same size.
pub fn alpha_composite(bottom: &RgbaImage, top: &RgbaImage) -> CardResult<RgbaImage> {
    if bottom.dimensions() != top.dimensions() {
        return Err(CardError::Other(anyhow::anyhow!(
            "alpha_composite expects equal sizes, got {:?} and {:?}",
            bottom.dimensions(),
            top.dimensions()
        )));
    }
    let mut out = bottom.clone();
    for (d, s) in out.pixels_mut().zip(top.pixels()) {
        d.0 = over(d.0, s.0);
    }
    Ok(out)
}

pub fn premultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}

pub fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Lanczos resize done in premultiplied space so transparent pixels do not bleed color.
pub fn resize_rgba(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    let mut premul = img.clone();
    premultiply_in_place(&mut premul);
    let mut out = image::imageops::resize(&premul, width, height, FilterType::Lanczos3);
    unpremultiply_in_place(&mut out);
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
