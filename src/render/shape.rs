use image::{GrayImage, Luma, RgbaImage};
use kurbo::{Point, RoundedRect, Shape as _};

use crate::foundation::core::Rgba8;

/// Rounded rectangle spanning `[0, width] x [0, height]`, radius clamped to half the short side.
fn rounded_rect(width: u32, height: u32, radius: f64) -> RoundedRect {
    let w = f64::from(width);
    let h = f64::from(height);
    let r = radius.max(0.0).min(w.min(h) / 2.0);
    RoundedRect::new(0.0, 0.0, w, h, r)
}

fn covers(rr: &RoundedRect, x: u32, y: u32) -> bool {
    rr.contains(Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5))
}

/// Single-channel mask: 255 where the pixel center lies inside the rounded rect, 0 elsewhere.
pub fn rounded_rect_mask(width: u32, height: u32, radius: f64) -> GrayImage {
    let rr = rounded_rect(width, height, radius);
    GrayImage::from_fn(width, height, |x, y| {
        Luma([if covers(&rr, x, y) { 255 } else { 0 }])
    })
}

/// Overwrite every pixel of `img` inside a full-size rounded rect with `color`.
pub fn fill_rounded_rect(img: &mut RgbaImage, radius: f64, color: Rgba8) {
    let rr = rounded_rect(img.width(), img.height(), radius);
    let px = color.to_pixel();
    for (x, y, p) in img.enumerate_pixels_mut() {
        if covers(&rr, x, y) {
            *p = px;
        }
    }
}
