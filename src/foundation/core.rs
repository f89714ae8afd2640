use crate::foundation::error::{CardError, CardResult};

/// Straight (non-premultiplied) RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn to_pixel(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }

    /// `#rrggbb` form used by the SVG text path; alpha is carried separately as `fill-opacity`.
    pub fn hex_rgb(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Absolute top-left pixel coordinate on a canvas. May be negative or out of bounds; pastes clip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PixelPos {
    pub x: i64,
    pub y: i64,
}

impl PixelPos {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// One fixed paste position on the lineup background.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Slot {
    pub key: String,
    pub x: i64,
    pub y: i64,
}

impl Slot {
    pub fn new(key: impl Into<String>, x: i64, y: i64) -> Self {
        Self {
            key: key.into(),
            x,
            y,
        }
    }

    pub fn pos(&self) -> PixelPos {
        PixelPos::new(self.x, self.y)
    }
}

/// `floor(w * factor) x floor(h * factor)`. A side that floors to zero is a decode error.
pub fn scaled_dims(width: u32, height: u32, factor: f64) -> CardResult<(u32, u32)> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(CardError::input("scale factor must be > 0"));
    }
    let w = (f64::from(width) * factor).floor() as u32;
    let h = (f64::from(height) * factor).floor() as u32;
    if w == 0 || h == 0 {
        return Err(CardError::decode(format!(
            "{width}x{height} image is too small to scale by {factor}"
        )));
    }
    Ok((w, h))
}
