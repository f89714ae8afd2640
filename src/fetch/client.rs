use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context as _;
use image::RgbaImage;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::Instrument as _;

use crate::{
    assets::decode::normalize_image,
    config::FetchPolicy,
    fetch::validate::validate_image_url,
    foundation::{
        error::{CardError, CardResult},
        ids::RequestId,
    },
};

/// Successfully fetched and normalized images, by source key. Built once per request.
#[derive(Clone, Debug, Default)]
pub struct FetchedImages(BTreeMap<String, RgbaImage>);

impl FetchedImages {
    pub fn get(&self, key: &str) -> Option<&RgbaImage> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<(String, RgbaImage)> for FetchedImages {
    fn from_iter<T: IntoIterator<Item = (String, RgbaImage)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// HTTP image fetcher with a fixed in-flight cap.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    max_concurrency: usize,
}

impl Fetcher {
    pub fn new(policy: &FetchPolicy) -> CardResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("image/webp,image/apng,image/*,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .timeout(policy.timeout())
            .user_agent(policy.user_agent.as_str())
            .default_headers(headers)
            .build()
            .context("build http client")?;

        Ok(Self {
            client,
            max_concurrency: policy.max_concurrency.max(1),
        })
    }

    /// GET `url`; timeouts, transport errors and non-2xx statuses are [`CardError::Fetch`].
    pub async fn fetch_bytes(&self, url: &str) -> CardResult<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CardError::fetch(describe_reqwest_error(url, &e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CardError::fetch(format!("{status} for url ({url})")));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| CardError::fetch(describe_reqwest_error(url, &e)))?;
        Ok(body.to_vec())
    }

    /// Fetch and normalize one image. Decoding runs on the blocking pool.
    pub async fn fetch_image(&self, url: &str) -> CardResult<RgbaImage> {
        let bytes = self.fetch_bytes(url).await?;
        let normalized = tokio::task::spawn_blocking(move || normalize_image(&bytes))
            .await
            .context("join decode task")??;

        tracing::debug!(
            url,
            format = ?normalized.format,
            mode = ?normalized.mode,
            width = normalized.rgba.width(),
            height = normalized.rgba.height(),
            "downloaded image"
        );
        Ok(normalized.rgba)
    }

    /// Fetch every valid `key -> url` entry with at most `max_concurrency` requests in flight.
    ///
    /// Invalid URLs, failed fetches and undecodable payloads are logged and left out of the
    /// result; they never fail the call. Each task returns its own `(key, result)` and only this
    /// coordinator writes into the map, so completion order has no effect on the outcome.
    pub async fn fetch_all(
        &self,
        sources: &BTreeMap<String, String>,
        request_id: &RequestId,
    ) -> FetchedImages {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();

        for (key, url) in sources {
            if !validate_image_url(url) {
                tracing::warn!(request_id = %request_id, key = %key, url = %url, "skipping invalid url");
                continue;
            }

            let fetcher = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let key = key.clone();
            let url = url.clone();
            let span = tracing::debug_span!("fetch", request_id = %request_id, key = %key);
            join_set.spawn(
                async move {
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => {
                            tracing::debug!(url = %url, "downloading");
                            fetcher.fetch_image(&url).await
                        }
                        Err(_) => Err(CardError::fetch("fetch pool closed")),
                    };
                    (key, url, result)
                }
                .instrument(span),
            );
        }

        let mut images = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((key, _, Ok(img))) => {
                    images.insert(key, img);
                }
                Ok((key, url, Err(err))) => {
                    tracing::warn!(
                        request_id = %request_id,
                        key = %key,
                        url = %url,
                        error = %err,
                        "image unavailable"
                    );
                }
                Err(err) => {
                    tracing::error!(request_id = %request_id, error = %err, "fetch task failed");
                }
            }
        }

        FetchedImages(images)
    }
}

fn describe_reqwest_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out fetching {url}")
    } else {
        format!("{err} ({url})")
    }
}

#[cfg(test)]
#[path = "../../tests/unit/fetch/client.rs"]
mod tests;
