use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context as _;
use image::RgbaImage;

use crate::{
    assets::{
        decode::encode_png,
        store::{AssetStore, FallbackImages},
    },
    config::CardConfig,
    fetch::client::{FetchedImages, Fetcher},
    foundation::{
        error::{CardError, CardResult},
        ids::RequestId,
    },
    render::{composite::overlay_at, decorate::decorate, text::TextRenderer},
};

/// Where a slot's image came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotSource {
    Downloaded,
    Fallback,
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotOutcome {
    pub key: String,
    pub source: SlotSource,
    /// Edge length of the pasted tile, when one was pasted.
    pub tile_side: Option<u32>,
}

/// Paint every configured slot and the text label onto `canvas`, in slot order.
///
/// Each slot prefers its downloaded image, then a local fallback, else stays empty. Tiles are
/// composited with their own alpha, so rounded corners leave the background visible.
pub fn paint_lineup(
    canvas: &mut RgbaImage,
    fetched: &FetchedImages,
    fallback: &dyn FallbackImages,
    cfg: &CardConfig,
    text_renderer: &TextRenderer,
    text: &str,
    request_id: &RequestId,
) -> Vec<SlotOutcome> {
    let mut outcomes = Vec::with_capacity(cfg.slots.len());

    for slot in &cfg.slots {
        let (source, img) = match fetched.get(&slot.key) {
            Some(img) => (SlotSource::Downloaded, Some(img.clone())),
            None => match fallback.fallback_for(&slot.key) {
                Some(img) => (SlotSource::Fallback, Some(img)),
                None => (SlotSource::Empty, None),
            },
        };

        let Some(img) = img else {
            tracing::debug!(request_id = %request_id, key = %slot.key, "no image for slot");
            outcomes.push(SlotOutcome {
                key: slot.key.clone(),
                source,
                tile_side: None,
            });
            continue;
        };

        match decorate(&img, &cfg.style) {
            Ok(tile) => {
                tracing::debug!(request_id = %request_id, key = %slot.key, source = ?source, "pasting tile");
                overlay_at(canvas, &tile, slot.pos());
                outcomes.push(SlotOutcome {
                    key: slot.key.clone(),
                    source,
                    tile_side: Some(tile.width()),
                });
            }
            Err(err) => {
                tracing::warn!(request_id = %request_id, key = %slot.key, error = %err, "could not decorate slot image");
                outcomes.push(SlotOutcome {
                    key: slot.key.clone(),
                    source: SlotSource::Empty,
                    tile_side: None,
                });
            }
        }
    }

    text_renderer.draw(canvas, text, &cfg.text);
    outcomes
}

/// Paint onto an owned copy of the background and encode the result as PNG.
pub fn compose_lineup(
    background: RgbaImage,
    fetched: &FetchedImages,
    fallback: &dyn FallbackImages,
    cfg: &CardConfig,
    text_renderer: &TextRenderer,
    text: &str,
    request_id: &RequestId,
) -> CardResult<(Vec<u8>, Vec<SlotOutcome>)> {
    let mut canvas = background;
    let outcomes = paint_lineup(
        &mut canvas,
        fetched,
        fallback,
        cfg,
        text_renderer,
        text,
        request_id,
    );
    let png = encode_png(&canvas)?;
    Ok((png, outcomes))
}

/// Rendered lineup card.
#[derive(Clone, Debug)]
pub struct LineupCard {
    pub png: Vec<u8>,
    pub slots: Vec<SlotOutcome>,
}

impl LineupCard {
    pub fn painted(&self) -> usize {
        self.slots.iter().filter(|s| s.tile_side.is_some()).count()
    }
}

/// Request-level driver for the lineup pipeline. Holds only immutable, shared state; every call
/// owns its canvas and fetch results.
#[derive(Clone)]
pub struct LineupService {
    cfg: Arc<CardConfig>,
    assets: AssetStore,
    fetcher: Fetcher,
    text: Arc<TextRenderer>,
}

impl LineupService {
    pub fn new(
        cfg: Arc<CardConfig>,
        assets: AssetStore,
        fetcher: Fetcher,
        text: Arc<TextRenderer>,
    ) -> Self {
        Self {
            cfg,
            assets,
            fetcher,
            text,
        }
    }

    pub fn config(&self) -> &CardConfig {
        &self.cfg
    }

    /// Load the background, fetch `sources`, then paint and encode on the blocking pool.
    #[tracing::instrument(skip_all, fields(request_id = %request_id, sources = sources.len()))]
    pub async fn render(
        &self,
        sources: &BTreeMap<String, String>,
        text: &str,
        request_id: &RequestId,
    ) -> CardResult<LineupCard> {
        let background = self.assets.load_required(&self.cfg.background).map_err(|e| match e {
            CardError::AssetMissing(_) => CardError::asset_missing(format!(
                "Background image '{}' not found",
                self.cfg.background
            )),
            other => other,
        })?;

        let fetched = self.fetcher.fetch_all(sources, request_id).await;
        tracing::info!(
            request_id = %request_id,
            requested = sources.len(),
            downloaded = fetched.len(),
            "downloads finished"
        );

        let service = self.clone();
        let text = text.to_string();
        let rid = request_id.clone();
        let (png, slots) = tokio::task::spawn_blocking(move || {
            compose_lineup(
                background,
                &fetched,
                &service.assets,
                &service.cfg,
                &service.text,
                &text,
                &rid,
            )
        })
        .await
        .context("join lineup render task")??;

        let card = LineupCard { png, slots };
        tracing::info!(request_id = %request_id, painted = card.painted(), "lineup rendered");
        Ok(card)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/lineup.rs"]
mod tests;
