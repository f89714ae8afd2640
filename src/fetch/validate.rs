use reqwest::Url;

/// Extensions accepted when a URL path ends in one. Compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "ico",
];

/// Human-readable format list advertised by the discovery endpoint.
pub const SUPPORTED_FORMATS: &[&str] = &["JPG/JPEG", "PNG", "GIF", "BMP", "TIFF", "WebP", "ICO"];

/// Cheap pre-filter run before any network effort.
///
/// Requires an `http`/`https` URL. When the last path segment carries an extension it must be an
/// image extension; extension-less paths pass, leaving the final verdict to fetch and decode.
pub fn validate_image_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return false;
    }

    let last = url
        .path_segments()
        .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
        .unwrap_or("");
    match last.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        }
        None => true,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/fetch/validate.rs"]
mod tests;
