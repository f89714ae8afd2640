//! Deployment configuration.
//!
//! Every constant the pipelines depend on (slot table, styling, glow parameters, fetch policy,
//! font chain) lives in one immutable [`CardConfig`], built once at startup and shared by `Arc`.
//! [`CardConfig::default`] reproduces the stock lineup deployment; a JSON file may override any
//! subset of fields.

use std::{path::Path, time::Duration};

use anyhow::Context as _;

use crate::foundation::{
    core::{PixelPos, Rgba8, Slot},
    error::{CardError, CardResult},
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CardConfig {
    /// Background canvas file, relative to the asset root.
    pub background: String,
    /// Paste positions, in paint order.
    pub slots: Vec<Slot>,
    /// Query keys starting with any of these are treated as image sources.
    pub source_prefixes: Vec<String>,
    pub default_text: String,
    /// Directory for transient overlay output files; the system temp dir when unset.
    pub staging_dir: Option<String>,
    pub style: TileStyle,
    pub text: TextStyle,
    pub glow: GlowStyle,
    pub fetch: FetchPolicy,
    pub fonts: FontChainConfig,
}

/// Decoration constants applied to every slot image.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TileStyle {
    pub scale_factor: f64,
    pub corner_radius: u32,
    pub border_width: u32,
    pub border_color: Rgba8,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub color: Rgba8,
    pub font_size: f32,
    pub position: PixelPos,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GlowStyle {
    pub banner_url: String,
    pub overlay_scale: f64,
    pub glow_color: Rgba8,
    pub blur_radius: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FetchPolicy {
    pub max_concurrency: usize,
    pub timeout_ms: u64,
    pub user_agent: String,
}

/// Ordered font acquisition strategies; the built-in bitmap face always terminates the chain.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FontChainConfig {
    /// Font files tried in order, relative to the asset root.
    pub files: Vec<String>,
    pub system_fonts: bool,
}

impl Default for CardConfig {
    fn default() -> Self {
        let slots = [
            ("lwf", 300, 40),
            ("rb", 836, 370),
            ("cb2", 706, 420),
            ("rwf", 836, 40),
            ("cf", 568, 15),
            ("lb", 300, 370),
            ("cb1", 435, 420),
            ("amf1", 430, 170),
            ("dmf", 568, 300),
            ("amf2", 706, 170),
            ("gk", 570, 460),
        ]
        .into_iter()
        .map(|(k, x, y)| Slot::new(k, x, y))
        .collect();

        let source_prefixes = [
            "ss", "amf", "cf", "dmf", "gk", "lb", "rb", "cb", "lwf", "rwf",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            background: "image.png".to_string(),
            slots,
            source_prefixes,
            default_text: "3126".to_string(),
            staging_dir: None,
            style: TileStyle::default(),
            text: TextStyle::default(),
            glow: GlowStyle::default(),
            fetch: FetchPolicy::default(),
            fonts: FontChainConfig::default(),
        }
    }
}

impl Default for TileStyle {
    fn default() -> Self {
        Self {
            scale_factor: 0.40,
            corner_radius: 14,
            border_width: 3,
            border_color: Rgba8::new(173, 216, 230, 100),
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: Rgba8::new(255, 255, 0, 255),
            font_size: 46.0,
            position: PixelPos::new(1040, 123),
        }
    }
}

impl Default for GlowStyle {
    fn default() -> Self {
        Self {
            banner_url: "https://files.catbox.moe/wn4cbr.jpeg".to_string(),
            overlay_scale: 0.70,
            glow_color: Rgba8::new(0, 0, 255, 180),
            blur_radius: 30.0,
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            timeout_ms: 15_000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
        }
    }
}

impl Default for FontChainConfig {
    fn default() -> Self {
        Self {
            files: vec!["arial.ttf".to_string(), "arial.otf".to_string()],
            system_fonts: false,
        }
    }
}

impl FetchPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CardConfig {
    /// Read a JSON config file; fields absent from the file keep their defaults.
    pub fn from_path(path: &Path) -> CardResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CardResult<()> {
        fn unit_factor(name: &str, v: f64) -> CardResult<()> {
            if !v.is_finite() || v <= 0.0 || v > 1.0 {
                return Err(CardError::input(format!("{name} must be in (0, 1], got {v}")));
            }
            Ok(())
        }

        unit_factor("style.scale_factor", self.style.scale_factor)?;
        unit_factor("glow.overlay_scale", self.glow.overlay_scale)?;

        if self.background.trim().is_empty() {
            return Err(CardError::input("background must not be empty"));
        }
        if !(self.text.font_size.is_finite() && self.text.font_size > 0.0) {
            return Err(CardError::input("text.font_size must be > 0"));
        }
        if !(self.glow.blur_radius.is_finite() && self.glow.blur_radius >= 0.0) {
            return Err(CardError::input("glow.blur_radius must be >= 0"));
        }
        if self.fetch.max_concurrency == 0 {
            return Err(CardError::input("fetch.max_concurrency must be >= 1"));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(CardError::input("fetch.timeout_ms must be >= 1"));
        }

        let mut seen = std::collections::BTreeSet::new();
        for slot in &self.slots {
            if slot.key.is_empty() {
                return Err(CardError::input("slot keys must not be empty"));
            }
            if !seen.insert(slot.key.as_str()) {
                return Err(CardError::input(format!("duplicate slot key '{}'", slot.key)));
            }
        }
        Ok(())
    }

    /// Whether a query key names an image source.
    pub fn is_source_key(&self, key: &str) -> bool {
        self.source_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    pub fn slot_keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.key.as_str())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
