use crate::engine::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_RELAY_PREFIX: &str = "https://cors-anywhere.herokuapp.com/";
pub const DEFAULT_UPLOAD_CAP: usize = 5;
pub const DESCRIPTION_IMAGE_CAP: usize = 10;

/// Timing and capacity knobs for one automation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_attempts: u32,
    pub attempt_delay_ms: u64,
    /// Budget for known-slow controls: dropdown triggers and file inputs.
    pub slow_max_attempts: u32,
    pub slow_attempt_delay_ms: u64,
    pub dropdown_delay_ms: u64,
    pub match_delay_ms: u64,
    pub option_attempts: u32,
    pub option_delay_ms: u64,
    pub key_delay_ms: u64,
    pub focus_settle_ms: u64,
    pub field_settle_ms: u64,
    pub upload_cap: usize,
    pub asset_timeout_ms: u64,
    pub relay_prefix: String,
    pub raster_quality: f64,
    pub raster_fallback_width: u32,
    pub raster_fallback_height: u32,
    pub upload_settle_per_file_ms: u64,
    pub add_photos_settle_ms: u64,
    pub form_ready_threshold: usize,
    pub form_ready_attempts: u32,
    pub form_ready_delay_ms: u64,
    pub status_dismiss_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            attempt_delay_ms: 500,
            slow_max_attempts: 15,
            slow_attempt_delay_ms: 800,
            dropdown_delay_ms: 800,
            match_delay_ms: 500,
            option_attempts: 4,
            option_delay_ms: 250,
            key_delay_ms: 10,
            focus_settle_ms: 100,
            field_settle_ms: 500,
            upload_cap: DEFAULT_UPLOAD_CAP,
            asset_timeout_ms: 10_000,
            relay_prefix: DEFAULT_RELAY_PREFIX.to_string(),
            raster_quality: 0.75,
            raster_fallback_width: 800,
            raster_fallback_height: 600,
            upload_settle_per_file_ms: 1000,
            add_photos_settle_ms: 1500,
            form_ready_threshold: 5,
            form_ready_attempts: 20,
            form_ready_delay_ms: 1000,
            status_dismiss_ms: 5000,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.attempt_delay_ms))
    }

    pub fn slow_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.slow_max_attempts,
            Duration::from_millis(self.slow_attempt_delay_ms),
        )
    }

    pub fn option_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.option_attempts, Duration::from_millis(self.option_delay_ms))
    }

    pub fn form_ready_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.form_ready_attempts,
            Duration::from_millis(self.form_ready_delay_ms),
        )
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_millis(self.asset_timeout_ms)
    }

    /// Settings with every wait collapsed, for snapshot dry runs and tests.
    pub fn instant() -> Self {
        Self {
            max_attempts: 2,
            attempt_delay_ms: 1,
            slow_max_attempts: 2,
            slow_attempt_delay_ms: 1,
            dropdown_delay_ms: 0,
            match_delay_ms: 0,
            option_attempts: 1,
            option_delay_ms: 1,
            key_delay_ms: 0,
            focus_settle_ms: 0,
            field_settle_ms: 0,
            upload_settle_per_file_ms: 0,
            add_photos_settle_ms: 0,
            form_ready_attempts: 2,
            form_ready_delay_ms: 1,
            asset_timeout_ms: 2000,
            ..Self::default()
        }
    }
}
