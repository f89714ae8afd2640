//! Lineup card compositing service.
//!
//! Fetches a set of remote images concurrently, normalizes and decorates each into a fixed tile
//! style, pastes the tiles onto fixed positions of a background canvas and burns in a text
//! label. A second pipeline composites one overlay image, with a blurred glow, onto a fixed
//! banner.

#![forbid(unsafe_code)]

pub mod assets;
pub mod compose;
pub mod config;
pub mod fetch;
pub mod foundation;
pub mod render;
pub mod server;

pub use assets::store::{AssetStore, FallbackImages, NoFallback};
pub use compose::{
    glow::{OverlayStage, StagedOutput, compose_glow, render_overlay},
    lineup::{LineupCard, LineupService, SlotOutcome, SlotSource, compose_lineup, paint_lineup},
};
pub use config::{CardConfig, FetchPolicy, FontChainConfig, GlowStyle, TextStyle, TileStyle};
pub use fetch::{
    client::{FetchedImages, Fetcher},
    validate::validate_image_url,
};
pub use foundation::{
    core::{PixelPos, Rgba8, Slot},
    error::{CardError, CardResult},
    ids::RequestId,
};
pub use render::{decorate::decorate, text::TextRenderer};
pub use server::{AppState, router};
