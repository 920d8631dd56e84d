use crate::browser::{chrome, CdpDocument, OverlayReporter};
use crate::config::EngineConfig;
use crate::dom::HtmlDocument;
use crate::engine::{AssetFetcher, FormFiller, LogReporter, RunOutcome};
use crate::listing::VehicleListing;
use crate::platforms;
use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

const CHROME_READY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct FillRequest {
    pub record_path: PathBuf,
    pub profile: String,
    pub port: u16,
    pub url_contains: Option<String>,
    pub snapshot: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub skip_images: bool,
}

/// Load the listing and fill it into the live tab, or into a saved page
/// when `snapshot` is set.
pub async fn fill_listing(request: &FillRequest) -> Result<RunOutcome> {
    let profile = platforms::get_profile(&request.profile)
        .with_context(|| format!("Unknown form profile: {}", request.profile))?;
    let listing = VehicleListing::load(&request.record_path)?;
    let (record, images) = listing.into_run_input();
    info!(
        "Filling {} fields and {} images into {}",
        record.present().count(),
        images.len(),
        profile.name
    );

    if let Some(snapshot) = &request.snapshot {
        let config = match &request.config_path {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::instant(),
        };
        let markup = std::fs::read_to_string(snapshot)
            .with_context(|| format!("Failed to read snapshot {}", snapshot.display()))?;
        let doc = HtmlDocument::parse(&markup);
        let fetcher = AssetFetcher::new(Vec::new(), 0, Duration::ZERO);
        let filler = FormFiller::new(&doc, &LogReporter, &config, profile);
        return Ok(filler.run(&record, None, &fetcher).await);
    }

    let config = match &request.config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let url_contains = request.url_contains.as_deref();

    info!("Waiting for Chrome on port {} to be ready...", request.port);
    chrome::wait_for_chrome_ready(request.port, url_contains, CHROME_READY_TIMEOUT_SECS)
        .await
        .context("Chrome not ready")?;

    info!("Connecting to Chrome via CDP on port {}...", request.port);
    let (_browser, page) = chrome::connect_to_chrome(request.port, url_contains)
        .await
        .context("CDP connection failed")?;

    let doc = CdpDocument::new(page.clone());
    let status = OverlayReporter::new(page, config.status_dismiss_ms);
    let fetcher = AssetFetcher::standard(&doc, &config)?;
    let filler = FormFiller::new(&doc, &status, &config, profile);
    let images = (!request.skip_images).then_some(&images);
    Ok(filler.run(&record, images, &fetcher).await)
}
