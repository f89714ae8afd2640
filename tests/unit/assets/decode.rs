use std::io::Cursor;

use image::{GrayAlphaImage, GrayImage, ImageBuffer, Rgb, RgbImage, Rgba, RgbaImage};

use super::*;

fn encode(img: DynamicImage, format: image::ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

#[test]
fn rgba_png_is_kept_as_is() {
    let src = RgbaImage::from_raw(2, 1, vec![100, 50, 200, 128, 1, 2, 3, 0]).unwrap();
    let bytes = encode(DynamicImage::ImageRgba8(src.clone()), image::ImageFormat::Png);

    let n = normalize_image(&bytes).unwrap();
    assert_eq!(n.mode, SourceMode::Rgba);
    assert_eq!(n.format, Some(image::ImageFormat::Png));
    assert_eq!(n.rgba, src);
}

#[test]
fn rgb_gains_opaque_alpha() {
    let src = RgbImage::from_pixel(3, 2, Rgb([10, 20, 30]));
    let bytes = encode(DynamicImage::ImageRgb8(src), image::ImageFormat::Png);

    let n = normalize_image(&bytes).unwrap();
    assert_eq!(n.mode, SourceMode::Rgb);
    assert_eq!(n.rgba.dimensions(), (3, 2));
    assert!(n.rgba.pixels().all(|p| *p == Rgba([10, 20, 30, 255])));
}

#[test]
fn jpeg_is_sniffed_without_extension_and_is_opaque() {
    let src = RgbImage::from_pixel(8, 8, Rgb([200, 100, 50]));
    let bytes = encode(DynamicImage::ImageRgb8(src), image::ImageFormat::Jpeg);

    let n = normalize_image(&bytes).unwrap();
    assert_eq!(n.format, Some(image::ImageFormat::Jpeg));
    assert!(n.rgba.pixels().all(|p| p[3] == 255));
}

#[test]
fn grayscale_expands_to_truecolor() {
    let src = GrayImage::from_pixel(2, 2, image::Luma([77]));
    let bytes = encode(DynamicImage::ImageLuma8(src), image::ImageFormat::Png);

    let n = normalize_image(&bytes).unwrap();
    assert_eq!(n.mode, SourceMode::Gray);
    assert!(n.rgba.pixels().all(|p| *p == Rgba([77, 77, 77, 255])));
}

#[test]
fn grayscale_alpha_keeps_alpha() {
    let src = GrayAlphaImage::from_raw(2, 1, vec![50, 0, 60, 255]).unwrap();
    let bytes = encode(DynamicImage::ImageLumaA8(src), image::ImageFormat::Png);

    let n = normalize_image(&bytes).unwrap();
    assert_eq!(n.mode, SourceMode::GrayAlpha);
    assert_eq!(n.rgba.get_pixel(0, 0)[3], 0);
    assert_eq!(*n.rgba.get_pixel(1, 0), Rgba([60, 60, 60, 255]));
}

#[test]
fn palette_transparency_survives() {
    // GIF stores a palette with a transparent index; alpha-0 pixels map onto it.
    let mut src = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
    src.put_pixel(1, 1, Rgba([0, 0, 0, 0]));
    let bytes = encode(DynamicImage::ImageRgba8(src), image::ImageFormat::Gif);

    let n = normalize_image(&bytes).unwrap();
    assert_eq!(n.format, Some(image::ImageFormat::Gif));
    assert_eq!(n.rgba.get_pixel(1, 1)[3], 0);
    assert_eq!(n.rgba.get_pixel(0, 0)[3], 255);
}

#[test]
fn high_bit_depth_falls_back_to_conversion() {
    let src: ImageBuffer<Rgba<u16>, Vec<u16>> =
        ImageBuffer::from_pixel(2, 2, Rgba([65535, 0, 0, 65535]));
    let bytes = encode(DynamicImage::ImageRgba16(src), image::ImageFormat::Png);

    let n = normalize_image(&bytes).unwrap();
    assert_eq!(n.mode, SourceMode::Other);
    assert!(n.rgba.pixels().all(|p| *p == Rgba([255, 0, 0, 255])));
}

#[test]
fn garbage_is_a_decode_error() {
    let err = normalize_image(b"definitely not an image").unwrap_err();
    assert!(matches!(err, CardError::Decode(_)));

    // Valid PNG signature, truncated body.
    let mut bytes = encode(
        DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
        image::ImageFormat::Png,
    );
    bytes.truncate(20);
    assert!(matches!(normalize_image(&bytes), Err(CardError::Decode(_))));
}

#[test]
fn encode_png_round_trips_dimensions() {
    let img = RgbaImage::from_pixel(5, 3, Rgba([1, 2, 3, 4]));
    let bytes = encode_png(&img).unwrap();
    assert_eq!(decode_rgba(&bytes).unwrap().dimensions(), (5, 3));
}
