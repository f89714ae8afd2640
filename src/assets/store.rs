use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::RgbaImage;

use crate::{
    assets::decode::decode_rgba,
    foundation::error::{CardError, CardResult},
};

/// Source of per-slot stand-in images used when nothing was downloaded for a key.
pub trait FallbackImages {
    fn fallback_for(&self, key: &str) -> Option<RgbaImage>;
}

/// No local stand-ins: slots without a download stay empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFallback;

impl FallbackImages for NoFallback {
    fn fallback_for(&self, _key: &str) -> Option<RgbaImage> {
        None
    }
}

/// Read-only view of the on-disk asset root (background canvas, slot fallbacks, fonts).
///
/// Nothing is cached: each request reads what it needs, so every request gets its own copy of
/// the background to mutate.
#[derive(Clone, Debug)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.root.join(Path::new(rel))
    }

    /// Load a required raster. A missing file is [`CardError::AssetMissing`]; an unreadable or
    /// undecodable one is unexpected.
    pub fn load_required(&self, rel: &str) -> CardResult<RgbaImage> {
        let path = self.resolve(rel);
        if !path.is_file() {
            return Err(CardError::asset_missing(format!(
                "required asset '{rel}' not found"
            )));
        }
        let bytes =
            std::fs::read(&path).with_context(|| format!("read asset '{}'", path.display()))?;
        decode_rgba(&bytes)
            .map_err(|e| anyhow::anyhow!("decode asset '{}': {e}", path.display()).into())
    }

    /// Load an optional raster; absence and decode failures both yield `None`.
    pub fn load_optional(&self, rel: &str) -> Option<RgbaImage> {
        let path = self.resolve(rel);
        let bytes = std::fs::read(&path).ok()?;
        match decode_rgba(&bytes) {
            Ok(img) => Some(img),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring undecodable asset");
                None
            }
        }
    }
}

impl FallbackImages for AssetStore {
    fn fallback_for(&self, key: &str) -> Option<RgbaImage> {
        self.load_optional(&format!("{key}.png"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
