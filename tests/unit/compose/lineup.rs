use image::Rgba;

use super::*;
use crate::{
    assets::store::NoFallback,
    config::FetchPolicy,
    foundation::core::{Rgba8, Slot},
    render::text::builtin_text_size,
};

#[path = "../../support/mod.rs"]
mod support;

const BG: [u8; 4] = [40, 60, 80, 255];
const RED: [u8; 4] = [220, 20, 20, 255];
const BLUE: [u8; 4] = [20, 20, 220, 255];

fn background() -> RgbaImage {
    RgbaImage::from_pixel(1200, 700, Rgba(BG))
}

fn fetched(pairs: &[(&str, [u8; 4])]) -> FetchedImages {
    pairs
        .iter()
        .map(|(k, px)| (k.to_string(), RgbaImage::from_pixel(300, 300, Rgba(*px))))
        .collect()
}

struct Local(Vec<&'static str>);

impl FallbackImages for Local {
    fn fallback_for(&self, key: &str) -> Option<RgbaImage> {
        self.0
            .iter()
            .any(|k| *k == key)
            .then(|| RgbaImage::from_pixel(300, 300, Rgba(BLUE)))
    }
}

fn close(a: [u8; 4], b: [u8; 4]) -> bool {
    a.iter().zip(b).all(|(x, y)| (i32::from(*x) - i32::from(y)).abs() <= 1)
}

#[test]
fn single_download_paints_only_its_slot() {
    let cfg = CardConfig::default();
    let mut canvas = background();
    let outcomes = paint_lineup(
        &mut canvas,
        &fetched(&[("gk", RED)]),
        &NoFallback,
        &cfg,
        &TextRenderer::builtin(),
        "",
        &RequestId::generate(),
    );

    assert_eq!(outcomes.len(), cfg.slots.len());
    let gk = outcomes.iter().find(|o| o.key == "gk").unwrap();
    assert_eq!(gk.source, SlotSource::Downloaded);
    assert_eq!(gk.tile_side, Some(126));
    assert!(
        outcomes
            .iter()
            .filter(|o| o.key != "gk")
            .all(|o| o.source == SlotSource::Empty && o.tile_side.is_none())
    );

    assert!(close(canvas.get_pixel(570 + 63, 460 + 63).0, RED));
    for (x, y, px) in canvas.enumerate_pixels() {
        let inside = (570..570 + 126).contains(&x) && (460..460 + 126).contains(&y);
        if !inside {
            assert_eq!(px.0, BG, "pixel ({x},{y}) changed");
        }
    }
}

#[test]
fn download_wins_over_fallback() {
    let cfg = CardConfig::default();
    let mut canvas = background();
    let outcomes = paint_lineup(
        &mut canvas,
        &fetched(&[("lb", RED)]),
        &Local(vec!["lb", "rb"]),
        &cfg,
        &TextRenderer::builtin(),
        "",
        &RequestId::generate(),
    );

    let source = |key: &str| outcomes.iter().find(|o| o.key == key).unwrap().source;
    assert_eq!(source("lb"), SlotSource::Downloaded);
    assert_eq!(source("rb"), SlotSource::Fallback);
    assert_eq!(source("cf"), SlotSource::Empty);
    assert!(close(canvas.get_pixel(300 + 63, 370 + 63).0, RED));
    assert!(close(canvas.get_pixel(836 + 63, 370 + 63).0, BLUE));
}

#[test]
fn later_slots_paint_over_earlier_ones() {
    let cfg = CardConfig {
        slots: vec![Slot::new("a", 10, 10), Slot::new("b", 10, 10)],
        ..CardConfig::default()
    };
    let mut canvas = background();
    paint_lineup(
        &mut canvas,
        &fetched(&[("b", BLUE), ("a", RED)]),
        &NoFallback,
        &cfg,
        &TextRenderer::builtin(),
        "",
        &RequestId::generate(),
    );
    assert!(close(canvas.get_pixel(10 + 63, 10 + 63).0, BLUE));
}

#[test]
fn tiny_download_leaves_its_slot_empty() {
    let cfg = CardConfig::default();
    let mut canvas = background();
    let tiny: FetchedImages = [("gk".to_string(), RgbaImage::from_pixel(2, 2, Rgba(RED)))]
        .into_iter()
        .collect();
    let outcomes = paint_lineup(
        &mut canvas,
        &tiny,
        &NoFallback,
        &cfg,
        &TextRenderer::builtin(),
        "",
        &RequestId::generate(),
    );

    let gk = outcomes.iter().find(|o| o.key == "gk").unwrap();
    assert_eq!(gk.source, SlotSource::Empty);
    assert_eq!(gk.tile_side, None);
    assert!(canvas.pixels().all(|p| p.0 == BG));
}

#[test]
fn out_of_bounds_slot_is_clipped() {
    let cfg = CardConfig {
        slots: vec![Slot::new("edge", 1150, 650)],
        ..CardConfig::default()
    };
    let mut canvas = background();
    let outcomes = paint_lineup(
        &mut canvas,
        &fetched(&[("edge", RED)]),
        &NoFallback,
        &cfg,
        &TextRenderer::builtin(),
        "",
        &RequestId::generate(),
    );
    assert_eq!(outcomes[0].tile_side, Some(126));
    assert!(close(canvas.get_pixel(1199, 699).0, RED));
}

#[test]
fn text_is_drawn_at_the_configured_position() {
    let cfg = CardConfig::default();
    let mut canvas = background();
    paint_lineup(
        &mut canvas,
        &FetchedImages::default(),
        &NoFallback,
        &cfg,
        &TextRenderer::builtin(),
        "3126",
        &RequestId::generate(),
    );

    let (tw, th) = builtin_text_size("3126", cfg.text.font_size);
    let (x0, y0) = (cfg.text.position.x as u32, cfg.text.position.y as u32);
    let mut yellow = 0;
    for (x, y, px) in canvas.enumerate_pixels() {
        let inside = (x0..x0 + tw).contains(&x) && (y0..y0 + th).contains(&y);
        if px.0 != BG {
            assert!(inside, "pixel ({x},{y}) changed outside the text box");
            if px.0 == Rgba8::new(255, 255, 0, 255).to_pixel().0 {
                yellow += 1;
            }
        }
    }
    assert!(yellow > 0);
}

#[test]
fn compose_lineup_encodes_background_sized_png() {
    let (png, outcomes) = compose_lineup(
        background(),
        &fetched(&[("cf", RED)]),
        &NoFallback,
        &CardConfig::default(),
        &TextRenderer::builtin(),
        "7",
        &RequestId::generate(),
    )
    .unwrap();
    let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (1200, 700));
    assert_eq!(outcomes.iter().filter(|o| o.tile_side.is_some()).count(), 1);
}

fn service(root: &std::path::Path) -> LineupService {
    let cfg = Arc::new(CardConfig::default());
    let fetcher = Fetcher::new(&FetchPolicy {
        timeout_ms: 2_000,
        ..FetchPolicy::default()
    })
    .unwrap();
    LineupService::new(
        cfg,
        AssetStore::new(root),
        fetcher,
        Arc::new(TextRenderer::builtin()),
    )
}

#[tokio::test]
async fn missing_background_fails_before_fetching() {
    let origin = support::spawn_origin();
    let dir = tempfile::tempdir().unwrap();
    let sources = BTreeMap::from([("gk".to_string(), origin.url("/tile.png"))]);

    let err = service(dir.path())
        .render(&sources, "3126", &RequestId::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::AssetMissing(_)));
    assert!(err.to_string().contains("Background image 'image.png' not found"));
    assert_eq!(origin.hits(), 0);
}

#[tokio::test]
async fn render_tolerates_partial_failures() {
    let origin = support::spawn_origin();
    let dir = tempfile::tempdir().unwrap();
    background().save(dir.path().join("image.png")).unwrap();
    let sources = BTreeMap::from([
        ("gk".to_string(), origin.url("/tile.png")),
        ("lb".to_string(), origin.url("/missing.png")),
        ("rb".to_string(), origin.url("/corrupt.png")),
        ("cf".to_string(), "ftp://example.com/a.png".to_string()),
    ]);

    let card = service(dir.path())
        .render(&sources, "3126", &RequestId::generate())
        .await
        .unwrap();
    assert_eq!(card.painted(), 1);

    let decoded = image::load_from_memory(&card.png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (1200, 700));
    assert!(close(
        decoded.get_pixel(570 + 63, 460 + 63).0,
        support::TILE_COLOR
    ));
}
