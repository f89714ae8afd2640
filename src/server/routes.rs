use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    compose::glow::render_overlay,
    config::CardConfig,
    fetch::validate::{SUPPORTED_FORMATS, validate_image_url},
    foundation::{error::CardError, ids::RequestId},
    server::AppState,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A pipeline failure bound to the request it happened in.
#[derive(Debug)]
pub struct ApiError {
    pub err: CardError,
    pub request_id: RequestId,
}

impl ApiError {
    pub fn new(err: CardError, request_id: &RequestId) -> Self {
        Self {
            err,
            request_id: request_id.clone(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.err {
            CardError::Input(_) => StatusCode::BAD_REQUEST,
            CardError::AssetMissing(_) => StatusCode::NOT_FOUND,
            CardError::Fetch(_) | CardError::Decode(_) | CardError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let rid = self.request_id.as_str();
        let body = match &self.err {
            CardError::Input(msg) => {
                tracing::warn!(request_id = %rid, error = %msg, "rejected request");
                json!({ "error": msg })
            }
            CardError::AssetMissing(msg) | CardError::Fetch(msg) | CardError::Decode(msg) => {
                tracing::error!(request_id = %rid, error = %msg, "request failed");
                json!({ "error": msg, "request_id": rid })
            }
            CardError::Other(err) => {
                tracing::error!(request_id = %rid, error = ?err, "unexpected error");
                json!({ "error": "An unexpected error occurred", "request_id": rid })
            }
        };

        let mut resp = (status, Json(body)).into_response();
        insert_request_id(&mut resp, &self.request_id);
        resp
    }
}

fn insert_request_id(resp: &mut Response, request_id: &RequestId) {
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}

fn png_response(png: Vec<u8>, filename: &str, request_id: &RequestId) -> Response {
    let disposition = format!("inline; filename=\"{filename}\"");
    let mut resp = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("image/png"))],
        png,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        resp.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    insert_request_id(&mut resp, request_id);
    resp
}

/// Split the query into image sources and the text label. Only the first value of a repeated
/// key counts; keys outside the configured prefixes are ignored.
pub fn collect_sources(
    params: &[(String, String)],
    cfg: &CardConfig,
) -> (BTreeMap<String, String>, Vec<String>) {
    let mut sources = BTreeMap::new();
    let mut invalid = Vec::new();
    for (key, value) in params {
        if !cfg.is_source_key(key) || sources.contains_key(key) {
            continue;
        }
        if validate_image_url(value) {
            sources.insert(key.clone(), value.clone());
        } else {
            invalid.push(format!("{key}={value}"));
        }
    }
    (sources, invalid)
}

fn first_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

pub async fn generate(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let request_id = RequestId::generate();
    tracing::info!(request_id = %request_id, "generate request");

    let (sources, invalid) = collect_sources(&params, &state.cfg);
    if !invalid.is_empty() {
        tracing::warn!(request_id = %request_id, invalid = %invalid.join(", "), "invalid image urls");
    }
    let text = first_value(&params, "text").unwrap_or(&state.cfg.default_text);

    let card = state
        .lineup
        .render(&sources, text, &request_id)
        .await
        .map_err(|e| ApiError::new(e, &request_id))?;

    let filename = format!("generated_image_{request_id}.png");
    Ok(png_response(card.png, &filename, &request_id))
}

pub async fn vimage(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let request_id = RequestId::generate();
    tracing::info!(request_id = %request_id, "vimage request");

    let staging_dir = state.cfg.staging_dir.as_deref().map(std::path::Path::new);
    let staged = render_overlay(
        &state.fetcher,
        &state.cfg.glow,
        staging_dir,
        first_value(&params, "img"),
        &request_id,
    )
    .await
    .map_err(|e| ApiError::new(e, &request_id))?;

    Ok(png_response(staged.png, "vimage_output.png", &request_id))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "message": "API is running" }))
}

pub async fn discovery(State(state): State<AppState>) -> Json<serde_json::Value> {
    let positions: Vec<&str> = state.cfg.slot_keys().collect();
    Json(json!({
        "message": "Dynamic Image Generator API",
        "usage": "/generate?lwf=<url>&amf1=<url>&text=<text>",
        "example": "/generate?gk=https://example.com/keeper.png&amf1=https://example.com/mid.jpg&text=3167",
        "supported_positions": positions,
        "supported_formats": SUPPORTED_FORMATS,
        "notes": [
            "Images are automatically converted to RGBA format",
            "Transparency is preserved where supported",
            "Invalid URLs are skipped with fallback to local images"
        ]
    }))
}

#[cfg(test)]
#[path = "../../tests/unit/server/routes.rs"]
mod tests;
