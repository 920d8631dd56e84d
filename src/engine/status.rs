use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    /// Errors stay on screen until dismissed; everything else fades.
    pub fn persists(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

/// Where progress and the final verdict of a run are shown.
#[async_trait(?Send)]
pub trait StatusReporter {
    async fn report(&self, message: &str, severity: Severity);
}

/// Writes status lines to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

#[async_trait(?Send)]
impl StatusReporter for LogReporter {
    async fn report(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => log::info!("[status] {}", message),
            Severity::Warning => log::warn!("[status] {}", message),
            Severity::Error => log::error!("[status] {}", message),
        }
    }
}
