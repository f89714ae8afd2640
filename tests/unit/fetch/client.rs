use std::time::{Duration, Instant};

use super::*;

#[path = "../../support/mod.rs"]
mod support;

fn fetcher(timeout_ms: u64) -> Fetcher {
    Fetcher::new(&FetchPolicy {
        timeout_ms,
        ..FetchPolicy::default()
    })
    .unwrap()
}

fn sources(pairs: &[(&str, String)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn fetch_image_decodes_and_normalizes() {
    let origin = support::spawn_origin();
    let img = fetcher(5_000)
        .fetch_image(&origin.url("/tile.png"))
        .await
        .unwrap();
    assert_eq!(img.dimensions(), (300, 300));
    assert_eq!(img.get_pixel(0, 0).0, support::TILE_COLOR);
}

#[tokio::test]
async fn non_success_status_is_fetch_error() {
    let origin = support::spawn_origin();
    let err = fetcher(5_000)
        .fetch_bytes(&origin.url("/missing.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::Fetch(_)));
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn corrupt_payload_is_decode_error() {
    let origin = support::spawn_origin();
    let err = fetcher(5_000)
        .fetch_image(&origin.url("/corrupt.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, CardError::Decode(_)));
}

#[tokio::test]
async fn partial_failures_are_dropped_not_raised() {
    let origin = support::spawn_origin();
    let src = sources(&[
        ("gk", origin.url("/tile.png")),
        ("lb", origin.url("/wide.png")),
        ("rb", origin.url("/missing.png")),
        ("cf", origin.url("/corrupt.png")),
        ("dmf", origin.url("/slow.png")),
        ("lwf", "ftp://nope.example/x.png".to_string()),
        ("rwf", origin.url("/readme.txt")),
    ]);

    let started = Instant::now();
    let got = fetcher(400).fetch_all(&src, &RequestId::generate()).await;

    let keys: Vec<&str> = got.keys().collect();
    assert_eq!(keys, ["gk", "lb"]);
    assert_eq!(got.get("lb").unwrap().dimensions(), (1000, 500));
    // The slow origin hits its timeout without holding the others back for its full delay.
    assert!(started.elapsed() < Duration::from_millis(1400));
}

#[tokio::test]
async fn invalid_urls_never_reach_the_network() {
    let origin = support::spawn_origin();
    let src = sources(&[
        ("gk", origin.url("/page.html")),
        ("lb", format!("gopher{}", &origin.base[4..])),
    ]);
    let got = fetcher(5_000).fetch_all(&src, &RequestId::generate()).await;
    assert!(got.is_empty());
    assert_eq!(origin.hits(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_requests_are_capped() {
    let origin = support::spawn_origin();
    let pairs: Vec<(String, String)> = (0..12)
        .map(|i| (format!("k{i:02}"), origin.url(&format!("/held/{i}.png"))))
        .collect();
    let src: BTreeMap<String, String> = pairs.into_iter().collect();

    let got = fetcher(5_000).fetch_all(&src, &RequestId::generate()).await;
    assert_eq!(got.len(), 12);
    assert!(origin.peak_in_flight() <= 5, "peak {}", origin.peak_in_flight());
    assert!(origin.peak_in_flight() >= 2);
}
