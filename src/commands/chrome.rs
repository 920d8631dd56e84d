use crate::browser::chrome;
use serde::Serialize;

const PROBE_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Serialize)]
pub struct ChromeStatus {
    pub port: u16,
    pub ready: bool,
    pub error: Option<String>,
}

/// Whether a debuggable Chrome with a matching tab is reachable on `port`.
pub async fn check_chrome(port: u16, url_contains: Option<&str>) -> ChromeStatus {
    match chrome::wait_for_chrome_ready(port, url_contains, PROBE_TIMEOUT_SECS).await {
        Ok(()) => ChromeStatus {
            port,
            ready: true,
            error: None,
        },
        Err(e) => ChromeStatus {
            port,
            ready: false,
            error: Some(e.to_string()),
        },
    }
}

pub fn get_profiles() -> Vec<crate::platforms::ProfileInfo> {
    crate::platforms::all_profiles()
}
