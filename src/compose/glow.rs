use std::{
    io::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use image::RgbaImage;

use crate::{
    assets::decode::encode_png,
    config::GlowStyle,
    fetch::{client::Fetcher, validate::validate_image_url},
    foundation::{
        core::{PixelPos, scaled_dims},
        error::{CardError, CardResult},
        ids::RequestId,
    },
    render::{
        blur::gaussian_blur_rgba,
        composite::{alpha_composite, overlay_at, resize_rgba},
    },
};

/// Which input of the overlay pipeline an error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayStage {
    Banner,
    Overlay,
}

impl OverlayStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::Overlay => "overlay",
        }
    }

    /// Re-label a fetch or decode error with the stage it happened in.
    fn wrap(self, err: CardError) -> CardError {
        match err {
            CardError::Fetch(msg) => {
                CardError::fetch(format!("Failed to download {} image: {msg}", self.as_str()))
            }
            CardError::Decode(msg) => {
                CardError::decode(format!("Failed to process {} image: {msg}", self.as_str()))
            }
            other => other,
        }
    }
}

/// Top-left offset that centers `inner` in `outer`, flooring odd remainders.
pub fn centered_offset(outer: (u32, u32), inner: (u32, u32)) -> PixelPos {
    let dx = i64::from(outer.0) - i64::from(inner.0);
    let dy = i64::from(outer.1) - i64::from(inner.1);
    PixelPos::new(dx.div_euclid(2), dy.div_euclid(2))
}

/// Blurred duplicate of `overlay` with the translucent blue layer laid over it.
pub fn glow_layer(overlay: &RgbaImage, style: &GlowStyle) -> CardResult<RgbaImage> {
    let tint = RgbaImage::from_pixel(
        overlay.width(),
        overlay.height(),
        style.glow_color.to_pixel(),
    );
    let glow = alpha_composite(overlay, &tint)?;
    if style.blur_radius > 0.0 {
        gaussian_blur_rgba(&glow, style.blur_radius)
    } else {
        Ok(glow)
    }
}

/// Scale the overlay, then paste its glow and the sharp overlay centered on the banner.
#[tracing::instrument(level = "debug", skip_all, fields(banner = ?banner.dimensions(), overlay = ?overlay.dimensions()))]
pub fn compose_glow(
    banner: &RgbaImage,
    overlay: &RgbaImage,
    style: &GlowStyle,
) -> CardResult<RgbaImage> {
    let (w, h) = scaled_dims(overlay.width(), overlay.height(), style.overlay_scale)?;
    let overlay = resize_rgba(overlay, w, h);
    let glow = glow_layer(&overlay, style)?;

    let pos = centered_offset(banner.dimensions(), overlay.dimensions());
    let mut out = banner.clone();
    overlay_at(&mut out, &glow, pos);
    overlay_at(&mut out, &overlay, pos);
    Ok(out)
}

/// Encoded overlay result. The staging file is gone by the time this value exists.
#[derive(Clone, Debug)]
pub struct StagedOutput {
    pub png: Vec<u8>,
    pub staged_path: PathBuf,
}

/// Write `png` through a named temp file and read it back. The file is removed when the guard
/// drops, which covers early returns and unwinding.
pub fn stage_png(png: &[u8], staging_dir: Option<&Path>) -> CardResult<StagedOutput> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("vimage_").suffix(".png");
    let mut file = match staging_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .context("create staging file")?;

    file.write_all(png).context("write staging file")?;
    file.flush().context("flush staging file")?;
    let staged_path = file.path().to_path_buf();
    let png = std::fs::read(&staged_path)
        .with_context(|| format!("read back {}", staged_path.display()))?;

    file.close().context("remove staging file")?;
    Ok(StagedOutput { png, staged_path })
}

/// Full glow overlay request: validate, fetch banner and overlay together, compose, stage.
#[tracing::instrument(skip_all, fields(request_id = %request_id))]
pub async fn render_overlay(
    fetcher: &Fetcher,
    style: &GlowStyle,
    staging_dir: Option<&Path>,
    overlay_url: Option<&str>,
    request_id: &RequestId,
) -> CardResult<StagedOutput> {
    let overlay_url = match overlay_url.map(str::trim) {
        Some(url) if !url.is_empty() => url,
        _ => return Err(CardError::input("Missing 'img' parameter")),
    };
    if !validate_image_url(overlay_url) {
        return Err(CardError::input("Invalid overlay image URL"));
    }

    let (banner, overlay) = tokio::join!(
        fetcher.fetch_image(&style.banner_url),
        fetcher.fetch_image(overlay_url)
    );
    let banner = banner.map_err(|e| OverlayStage::Banner.wrap(e))?;
    let overlay = overlay.map_err(|e| OverlayStage::Overlay.wrap(e))?;

    let style = style.clone();
    let staging_dir = staging_dir.map(Path::to_path_buf);
    let staged = tokio::task::spawn_blocking(move || {
        let out = compose_glow(&banner, &overlay, &style)?;
        let png = encode_png(&out)?;
        stage_png(&png, staging_dir.as_deref())
    })
    .await
    .context("join overlay render task")??;

    tracing::info!(request_id = %request_id, bytes = staged.png.len(), "overlay rendered");
    Ok(staged)
}

#[cfg(test)]
#[path = "../../tests/unit/compose/glow.rs"]
mod tests;
