use anyhow::{bail, Context, Result};
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use futures::StreamExt;
use log::info;
use serde::Deserialize;
use std::time::Duration;

const READY_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct CdpTarget {
    #[serde(rename = "type")]
    target_type: String,
    #[serde(default)]
    url: String,
}

fn debug_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

/// Wait until the debugging endpoint answers and exposes a page target
/// (one whose URL contains `url_contains`, when given).
pub async fn wait_for_chrome_ready(
    port: u16,
    url_contains: Option<&str>,
    timeout_secs: u64,
) -> Result<()> {
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);
    let mut saw_version = false;

    loop {
        if start.elapsed() > timeout {
            if saw_version {
                bail!(
                    "CHROME_NO_PAGE: debugging port {} answers but no matching page appeared within {}s",
                    port,
                    timeout_secs
                );
            }
            bail!(
                "CHROME_NOT_READY: nothing answered on debugging port {} within {}s. Start Chrome with --remote-debugging-port={}",
                port,
                timeout_secs,
                port
            );
        }

        let version_url = format!("{}/json/version", debug_url(port));
        if let Ok(resp) = reqwest::get(&version_url).await {
            if resp.status().is_success() {
                saw_version = true;
                match has_page_target(port, url_contains).await {
                    Ok(true) => {
                        info!("Chrome is ready on port {} (version endpoint + page target ready)", port);
                        return Ok(());
                    }
                    Ok(false) => info!("Chrome version endpoint ready on port {}, waiting for page target...", port),
                    Err(e) => info!("Chrome version endpoint ready on port {}, page target check failed: {}", port, e),
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(READY_POLL_INTERVAL_MS)).await;
    }
}

async fn has_page_target(port: u16, url_contains: Option<&str>) -> Result<bool> {
    let list_url = format!("{}/json/list", debug_url(port));
    let resp = reqwest::get(&list_url)
        .await
        .context("Failed to request Chrome json/list")?;

    if !resp.status().is_success() {
        return Ok(false);
    }

    let body = resp.text().await.unwrap_or_default();
    let targets: Vec<CdpTarget> = serde_json::from_str(&body).unwrap_or_default();
    Ok(targets.iter().any(|target| {
        target.target_type == "page" && url_contains.map_or(true, |text| target.url.contains(text))
    }))
}

/// Connect to an already-running Chrome instance via CDP and pick the tab
/// holding the form.
pub async fn connect_to_chrome(port: u16, url_contains: Option<&str>) -> Result<(Browser, Page)> {
    let (browser, mut handler) = Browser::connect(debug_url(port))
        .await
        .with_context(|| format!("Failed to connect to Chrome on port {}", port))?;

    // Spawn the handler to process CDP events
    tokio::spawn(async move {
        while let Some(_event) = handler.next().await {}
    });

    let pages = browser.pages().await.context("Failed to get pages")?;
    let page = match url_contains {
        Some(text) => {
            let mut found = None;
            for page in pages {
                let url = page.url().await.ok().flatten().unwrap_or_default();
                if url.contains(text) {
                    found = Some(page);
                    break;
                }
            }
            found.with_context(|| format!("No page with a URL containing {:?}", text))?
        }
        None => pages.into_iter().next().context("No pages found in Chrome")?,
    };

    info!("Connected to Chrome CDP on port {}", port);
    Ok((browser, page))
}
