//! Turns remote image URLs into bytes. Each URL walks an ordered chain of
//! techniques under a per-technique timeout; a URL that exhausts the chain
//! becomes a failure entry and the batch carries on.

use crate::config::EngineConfig;
use crate::dom::{Document, RasterRequest};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

/// Bytes for one image, plus how they were obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub url: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub technique: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{url}: {}", .reasons.join("; "))]
pub struct AssetFailure {
    pub url: String,
    pub reasons: Vec<String>,
}

pub type AssetResult = std::result::Result<Asset, AssetFailure>;

/// What a technique hands back on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait(?Send)]
pub trait AcquisitionTechnique {
    fn name(&self) -> &'static str;

    async fn acquire(&self, url: &str) -> Result<Acquired>;
}

#[async_trait(?Send)]
impl<T: AcquisitionTechnique + ?Sized> AcquisitionTechnique for &T {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn acquire(&self, url: &str) -> Result<Acquired> {
        (**self).acquire(url).await
    }
}

async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<Acquired> {
    let response = client
        .get(url)
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?
        .error_for_status()?;

    let declared = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());
    // Hotlink guards answer 200 with an HTML page.
    let content_type = match declared {
        Some(t) if t.starts_with("image/") => t,
        Some(t) if t == GENERIC_CONTENT_TYPE => DEFAULT_CONTENT_TYPE.to_string(),
        Some(t) => bail!("not an image ({})", t),
        None => DEFAULT_CONTENT_TYPE.to_string(),
    };

    let bytes = response.bytes().await.context("failed to read body")?;
    if bytes.is_empty() {
        bail!("empty body");
    }
    Ok(Acquired {
        bytes: bytes.to_vec(),
        content_type,
    })
}

/// Plain GET; no referrer, no cache.
pub struct DirectFetch {
    client: reqwest::Client,
}

impl DirectFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait(?Send)]
impl AcquisitionTechnique for DirectFetch {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn acquire(&self, url: &str) -> Result<Acquired> {
        fetch_image(&self.client, url).await
    }
}

/// The same GET routed through a public CORS relay, for hosts that reject
/// direct reads.
pub struct RelayFetch {
    client: reqwest::Client,
    prefix: String,
}

impl RelayFetch {
    pub fn new(client: reqwest::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }
}

#[async_trait(?Send)]
impl AcquisitionTechnique for RelayFetch {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn acquire(&self, url: &str) -> Result<Acquired> {
        fetch_image(&self.client, &format!("{}{}", self.prefix, url)).await
    }
}

/// Render the image in the page and export it from a canvas. Recovers
/// images a host allows to display but not to fetch.
pub struct CanvasRaster<'d> {
    doc: &'d dyn Document,
    request: RasterRequest,
}

impl<'d> CanvasRaster<'d> {
    pub fn new(doc: &'d dyn Document, request: RasterRequest) -> Self {
        Self { doc, request }
    }
}

#[async_trait(?Send)]
impl AcquisitionTechnique for CanvasRaster<'_> {
    fn name(&self) -> &'static str {
        "canvas"
    }

    async fn acquire(&self, url: &str) -> Result<Acquired> {
        let bytes = self.doc.rasterize_image(url, &self.request).await?;
        if bytes.is_empty() {
            bail!("canvas export produced no data");
        }
        Ok(Acquired {
            bytes,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        })
    }
}

pub struct AssetFetcher<'a> {
    techniques: Vec<Box<dyn AcquisitionTechnique + 'a>>,
    cap: usize,
    timeout: Duration,
}

impl<'a> AssetFetcher<'a> {
    pub fn new(
        techniques: Vec<Box<dyn AcquisitionTechnique + 'a>>,
        cap: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            techniques,
            cap,
            timeout,
        }
    }

    /// Direct fetch, relay fetch, then canvas rasterization in `doc`.
    pub fn standard(doc: &'a dyn Document, config: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .referer(false)
            .user_agent(concat!("vehicle-lister/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        let raster = RasterRequest {
            quality: config.raster_quality,
            fallback_width: config.raster_fallback_width,
            fallback_height: config.raster_fallback_height,
            timeout: config.asset_timeout(),
        };
        Ok(Self::new(
            vec![
                Box::new(DirectFetch::new(client.clone())),
                Box::new(RelayFetch::new(client, config.relay_prefix.clone())),
                Box::new(CanvasRaster::new(doc, raster)),
            ],
            config.upload_cap,
            config.asset_timeout(),
        ))
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// One result per URL, in input order, for at most `cap` URLs.
    pub async fn fetch<S: AsRef<str>>(&self, urls: &[S]) -> Vec<AssetResult> {
        let total = urls.len().min(self.cap);
        let mut results = Vec::with_capacity(total);
        for (i, url) in urls.iter().take(self.cap).enumerate() {
            info!("[assets] acquiring image {}/{}: {}", i + 1, total, url.as_ref());
            results.push(self.acquire(url.as_ref()).await);
        }
        results
    }

    async fn acquire(&self, url: &str) -> AssetResult {
        let mut reasons = Vec::new();
        for technique in &self.techniques {
            match tokio::time::timeout(self.timeout, technique.acquire(url)).await {
                Ok(Ok(acquired)) => {
                    debug!(
                        "[assets] {} via {} ({} bytes, {})",
                        url,
                        technique.name(),
                        acquired.bytes.len(),
                        acquired.content_type
                    );
                    return Ok(Asset {
                        url: url.to_string(),
                        bytes: acquired.bytes,
                        content_type: acquired.content_type,
                        technique: technique.name(),
                    });
                }
                Ok(Err(e)) => reasons.push(format!("{}: {:#}", technique.name(), e)),
                Err(_) => reasons.push(format!(
                    "{}: timed out after {}ms",
                    technique.name(),
                    self.timeout.as_millis()
                )),
            }
        }
        warn!("[assets] giving up on {}: {}", url, reasons.join("; "));
        Err(AssetFailure {
            url: url.to_string(),
            reasons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_lists_every_technique() {
        let failure = AssetFailure {
            url: "https://img/1.jpg".into(),
            reasons: vec!["direct: 403".into(), "relay: 500".into()],
        };
        assert_eq!(failure.to_string(), "https://img/1.jpg: direct: 403; relay: 500");
    }

    #[tokio::test]
    async fn cap_limits_results() {
        let fetcher = AssetFetcher::new(Vec::new(), 2, Duration::from_millis(10));
        let results = fetcher.fetch(&["a", "b", "c"]).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_err()));
    }
}
