//! Hands acquired images to the page's file input.

use super::assets::Asset;
use super::resolver::{ElementResolver, ResolutionQuery};
use super::retry::RetryPolicy;
use crate::config::EngineConfig;
use crate::dom::{ElementHandle, FilePayload};
use crate::error::{DomError, EngineError};
use log::{info, warn};
use std::time::Duration;

pub const FILE_INPUT_SELECTORS: &[&str] = &[
    r#"input[type="file"][accept*="image"]"#,
    r#"input[type="file"]"#,
    r#"input[accept*="image"]"#,
];

pub const ADD_PHOTOS_SELECTORS: &[&str] = &[
    r#"[aria-label="Add photos"]"#,
    r#"[aria-label="Add Photos"]"#,
    r#"[data-testid="add-photos"]"#,
];

#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    pub locate_retry: RetryPolicy,
    pub add_photos_settle: Duration,
    pub settle_per_file: Duration,
}

impl UploadOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            locate_retry: config.slow_retry(),
            add_photos_settle: Duration::from_millis(config.add_photos_settle_ms),
            settle_per_file: Duration::from_millis(config.upload_settle_per_file_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The input now holds this many files.
    Bound(usize),
    /// The file list could not be set programmatically; the picker was
    /// opened so the user can choose the files.
    NeedsManualAction,
}

/// `vehicle_image_{n}_{millis}.{ext}`, `n` counting from 1.
pub fn payload_name(position: usize, content_type: &str, millis: i64) -> String {
    let ext = match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    };
    format!("vehicle_image_{}_{}.{}", position + 1, millis, ext)
}

pub struct UploadBinder<'a> {
    resolver: &'a ElementResolver<'a>,
    file_input: ResolutionQuery,
    add_photos: ResolutionQuery,
    options: UploadOptions,
}

impl<'a> UploadBinder<'a> {
    /// `add_photos` is only tried when `file_input` finds nothing.
    pub fn new(
        resolver: &'a ElementResolver<'a>,
        file_input: ResolutionQuery,
        add_photos: ResolutionQuery,
        options: UploadOptions,
    ) -> Self {
        Self {
            resolver,
            file_input,
            add_photos,
            options,
        }
    }

    /// The page's file input. Some forms only render it after an
    /// "add photos" control is activated, so that is tried once.
    pub async fn locate_file_input(&self) -> Result<ElementHandle, EngineError> {
        let retry = self.options.locate_retry;
        if let Ok(el) = self.resolver.resolve(&self.file_input, retry).await {
            return Ok(el);
        }

        info!("[upload] no file input yet, looking for an add-photos control");
        let trigger = self
            .resolver
            .resolve(&self.add_photos, retry)
            .await
            .map_err(|_| EngineError::Upload("no file input and no add-photos control".into()))?;
        self.resolver.document().click(trigger).await?;
        tokio::time::sleep(self.options.add_photos_settle).await;

        self.resolver
            .resolve(&self.file_input, retry)
            .await
            .map_err(|_| EngineError::Upload("file input did not appear after add-photos".into()))
    }

    pub async fn bind(
        &self,
        input: ElementHandle,
        assets: &[Asset],
    ) -> Result<UploadOutcome, EngineError> {
        if assets.is_empty() {
            return Err(EngineError::Upload("no images to attach".into()));
        }
        let doc = self.resolver.document();
        let millis = chrono::Utc::now().timestamp_millis();
        let payloads: Vec<FilePayload> = assets
            .iter()
            .enumerate()
            .map(|(i, asset)| FilePayload {
                name: payload_name(i, &asset.content_type, millis),
                mime: asset.content_type.clone(),
                bytes: asset.bytes.clone(),
            })
            .collect();

        match doc.assign_files(input, &payloads).await {
            Ok(()) => {
                info!("[upload] attached {} files", payloads.len());
                tokio::time::sleep(self.options.settle_per_file * payloads.len() as u32).await;
                Ok(UploadOutcome::Bound(payloads.len()))
            }
            Err(DomError::Unsupported(what)) => {
                warn!("[upload] {} unavailable, opening the file picker", what);
                doc.click(input).await?;
                Ok(UploadOutcome::NeedsManualAction)
            }
            Err(e) => Err(e.into()),
        }
    }
}
