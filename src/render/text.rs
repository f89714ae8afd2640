//! Text burn-in with a best-effort font chain.
//!
//! Font acquisition is an ordered list of [`FontStrategy`] values tried once at startup. Vector
//! faces are rendered through `usvg`/`resvg`; the chain always ends in a built-in 5x7 bitmap
//! face, so drawing text never fails a request.

use std::{path::PathBuf, sync::Arc};

use image::RgbaImage;

use crate::{
    assets::store::AssetStore,
    config::{FontChainConfig, TextStyle},
    foundation::{
        core::{PixelPos, Rgba8},
        error::{CardError, CardResult},
    },
    render::composite::{over, overlay_at, unpremultiply_in_place},
};

/// Distance from the top of the line box to the baseline, in ems.
const ASCENT_EM: f32 = 0.905;
/// Height of the rasterized line box, in ems.
const LINE_EM: f32 = 1.4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FontStrategy {
    File(PathBuf),
    System,
    Builtin,
}

#[derive(Clone, Debug)]
enum Face {
    Vector {
        db: Arc<usvg::fontdb::Database>,
        family: String,
    },
    Builtin,
}

/// Resolved font plus a description of where it came from.
#[derive(Clone, Debug)]
pub struct TextRenderer {
    face: Face,
    source: String,
}

impl TextRenderer {
    pub fn builtin() -> Self {
        Self {
            face: Face::Builtin,
            source: "builtin".to_string(),
        }
    }

    /// Strategies from config: font files under the asset root, then system fonts if enabled.
    pub fn strategies(cfg: &FontChainConfig, assets: &AssetStore) -> Vec<FontStrategy> {
        let mut out: Vec<FontStrategy> = cfg
            .files
            .iter()
            .map(|f| FontStrategy::File(assets.resolve(f)))
            .collect();
        if cfg.system_fonts {
            out.push(FontStrategy::System);
        }
        out.push(FontStrategy::Builtin);
        out
    }

    /// First strategy that yields a usable face wins; an exhausted chain still yields the
    /// built-in face.
    pub fn from_chain(chain: &[FontStrategy]) -> Self {
        for strategy in chain {
            match try_strategy(strategy) {
                Ok(renderer) => {
                    tracing::info!(font = %renderer.source, "text font resolved");
                    return renderer;
                }
                Err(err) => {
                    tracing::debug!(strategy = ?strategy, error = %err, "font strategy unavailable");
                }
            }
        }
        Self::builtin()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.face, Face::Builtin)
    }

    /// Draw `text` with its top-left at `style.position`. Vector rendering problems degrade to
    /// the bitmap face.
    pub fn draw(&self, canvas: &mut RgbaImage, text: &str, style: &TextStyle) {
        if text.is_empty() {
            return;
        }
        if let Face::Vector { db, family } = &self.face {
            match draw_vector(db, family, canvas, text, style) {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(font = %self.source, error = %err, "vector text failed, using builtin face");
                }
            }
        }
        draw_builtin(canvas, text, style.position, style.font_size, style.color);
    }
}

fn try_strategy(strategy: &FontStrategy) -> CardResult<TextRenderer> {
    match strategy {
        FontStrategy::File(path) => {
            let mut db = usvg::fontdb::Database::new();
            db.load_font_file(path)
                .map_err(|e| CardError::asset_missing(format!("{}: {e}", path.display())))?;
            let family = db
                .faces()
                .find_map(|f| f.families.first().map(|(name, _)| name.clone()))
                .ok_or_else(|| {
                    CardError::asset_missing(format!("{}: no usable face", path.display()))
                })?;
            Ok(TextRenderer {
                face: Face::Vector {
                    db: Arc::new(db),
                    family,
                },
                source: path.display().to_string(),
            })
        }
        FontStrategy::System => {
            let mut db = usvg::fontdb::Database::new();
            db.load_system_fonts();
            let query = usvg::fontdb::Query {
                families: &[usvg::fontdb::Family::SansSerif],
                weight: usvg::fontdb::Weight::NORMAL,
                stretch: usvg::fontdb::Stretch::Normal,
                style: usvg::fontdb::Style::Normal,
            };
            let family = db
                .query(&query)
                .and_then(|id| db.face(id))
                .or_else(|| db.faces().next())
                .and_then(|f| f.families.first().map(|(name, _)| name.clone()))
                .ok_or_else(|| CardError::asset_missing("no system fonts installed"))?;
            Ok(TextRenderer {
                source: format!("system:{family}"),
                face: Face::Vector {
                    db: Arc::new(db),
                    family,
                },
            })
        }
        FontStrategy::Builtin => Ok(TextRenderer::builtin()),
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn draw_vector(
    db: &Arc<usvg::fontdb::Database>,
    family: &str,
    canvas: &mut RgbaImage,
    text: &str,
    style: &TextStyle,
) -> CardResult<()> {
    let pos = style.position;
    let w = i64::from(canvas.width()) - pos.x;
    let line_h = (style.font_size * LINE_EM).ceil() as i64;
    let h = line_h.min(i64::from(canvas.height()) - pos.y);
    if w <= 0 || h <= 0 {
        return Ok(());
    }
    let (w, h) = (w as u32, h as u32);

    let svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><text x="0" y="{baseline}" font-family="'{family}', sans-serif" font-size="{size}" fill="{fill}" fill-opacity="{opacity}" xml:space="preserve">{text}</text></svg>"#,
        baseline = style.font_size * ASCENT_EM,
        family = escape_xml(family),
        size = style.font_size,
        fill = style.color.hex_rgb(),
        opacity = f32::from(style.color.a) / 255.0,
        text = escape_xml(text),
    );

    let opts = usvg::Options {
        fontdb: Arc::clone(db),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(&svg, &opts)
        .map_err(|e| CardError::Other(anyhow::anyhow!("build text svg: {e}")))?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(w, h)
        .ok_or_else(|| CardError::Other(anyhow::anyhow!("allocate {w}x{h} text pixmap")))?;
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let mut rgba = pixmap.take();
    unpremultiply_in_place(&mut rgba);
    let layer = RgbaImage::from_raw(w, h, rgba)
        .ok_or_else(|| CardError::Other(anyhow::anyhow!("text layer size mismatch")))?;
    overlay_at(canvas, &layer, pos);
    Ok(())
}

const GLYPH_W: i64 = 5;
const GLYPH_H: i64 = 7;

/// 5x7 bitmap rows, top to bottom, bit 4 is the leftmost column.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        ' ' => [0; 7],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
        '=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '#' => [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        '&' => [0x0C, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0D],
        '*' => [0x00, 0x04, 0x15, 0x0E, 0x15, 0x04, 0x00],
        '\'' => [0x04, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

/// Dot size for the bitmap face so the cap height lands near `font_size`.
fn builtin_dot(font_size: f32) -> i64 {
    ((font_size / 8.0).round() as i64).max(1)
}

fn draw_builtin(canvas: &mut RgbaImage, text: &str, pos: PixelPos, font_size: f32, color: Rgba8) {
    let dot = builtin_dot(font_size);
    let advance = (GLYPH_W + 1) * dot;
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let px = [color.r, color.g, color.b, color.a];

    for (i, c) in text.chars().enumerate() {
        let gx = pos.x + i as i64 * advance;
        if gx >= cw {
            break;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                let x0 = gx + col * dot;
                let y0 = pos.y + row as i64 * dot;
                for y in y0.max(0)..(y0 + dot).min(ch) {
                    for x in x0.max(0)..(x0 + dot).min(cw) {
                        let p = canvas.get_pixel_mut(x as u32, y as u32);
                        p.0 = over(p.0, px);
                    }
                }
            }
        }
    }
}

/// Pixel extent of `text` drawn with the built-in face.
pub fn builtin_text_size(text: &str, font_size: f32) -> (u32, u32) {
    let dot = builtin_dot(font_size);
    let n = text.chars().count() as i64;
    if n == 0 {
        return (0, 0);
    }
    let w = n * (GLYPH_W + 1) * dot - dot;
    (w as u32, (GLYPH_H * dot) as u32)
}

#[cfg(test)]
#[path = "../../tests/unit/render/text.rs"]
mod tests;
