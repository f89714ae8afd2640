use image::Rgba;

use super::*;

fn write_png(path: &Path, img: &RgbaImage) {
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

#[test]
fn missing_background_is_asset_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = AssetStore::new(dir.path());
    let err = store.load_required("image.png").unwrap_err();
    assert!(matches!(err, CardError::AssetMissing(_)));
    assert!(err.to_string().contains("image.png"));
}

#[test]
fn corrupt_background_is_unexpected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("image.png"), b"nope").unwrap();
    let store = AssetStore::new(dir.path());
    assert!(matches!(
        store.load_required("image.png"),
        Err(CardError::Other(_))
    ));
}

#[test]
fn background_loads_as_rgba() {
    let dir = tempfile::tempdir().unwrap();
    write_png(
        &dir.path().join("image.png"),
        &RgbaImage::from_pixel(4, 3, Rgba([9, 8, 7, 255])),
    );
    let store = AssetStore::new(dir.path());
    let bg = store.load_required("image.png").unwrap();
    assert_eq!(bg.dimensions(), (4, 3));
}

#[test]
fn fallback_uses_key_named_png() {
    let dir = tempfile::tempdir().unwrap();
    write_png(
        &dir.path().join("gk.png"),
        &RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255])),
    );
    std::fs::write(dir.path().join("lb.png"), b"corrupt").unwrap();

    let store = AssetStore::new(dir.path());
    assert!(store.fallback_for("gk").is_some());
    assert!(store.fallback_for("lb").is_none());
    assert!(store.fallback_for("cf").is_none());
    assert!(NoFallback.fallback_for("gk").is_none());
}
