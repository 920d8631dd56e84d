//! Drives one listing run: wait for the form, fill each field best-effort,
//! upload images, then report exactly one verdict.

use super::assets::{Asset, AssetFetcher};
use super::input::{FillOptions, InputSimulator};
use super::record::{FieldRecord, ImageList};
use super::resolver::ElementResolver;
use super::retry::with_retry;
use super::select::{OptionSelector, SelectOptions, Selection};
use super::status::{Severity, StatusReporter};
use super::upload::{UploadBinder, UploadOptions, UploadOutcome};
use crate::config::EngineConfig;
use crate::dom::Document;
use crate::error::EngineError;
use crate::platforms::{FieldKind, FieldTarget, FormProfile};
use log::{info, warn};
use serde::Serialize;
use std::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Partial,
    Failed,
}

/// The only thing a run hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub outcome: Outcome,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillState {
    WaitingForForm,
    Filling,
    Uploading,
    Done(Outcome),
    Failed,
}

/// Per-field results of the filling phase.
#[derive(Debug, Default)]
pub struct FieldSummary {
    pub filled: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

impl FieldSummary {
    pub fn attempted(&self) -> usize {
        self.filled.len() + self.failed.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReport {
    NotRequested,
    /// Every URL failed, so no input was touched.
    NoAssets { failed: usize },
    Bound { files: usize, failed: usize },
    NeedsManualAction { files: usize, failed: usize },
    Failed { reason: String, failed: usize },
}

impl UploadReport {
    fn is_clean(&self) -> bool {
        matches!(
            self,
            UploadReport::NotRequested | UploadReport::Bound { failed: 0, .. }
        )
    }
}

/// Build the verdict from both phases. Only a clean fill and a clean upload
/// count as success.
pub fn summarize(fields: &FieldSummary, upload: &UploadReport) -> RunOutcome {
    let mut notes = Vec::new();
    if !fields.failed.is_empty() {
        notes.push(format!(
            "{} of {} fields need attention ({})",
            fields.failed.len(),
            fields.attempted(),
            fields
                .failed
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    match upload {
        UploadReport::NotRequested => {}
        UploadReport::NoAssets { failed } => {
            notes.push(format!("none of the {} images could be downloaded", failed))
        }
        UploadReport::Bound { failed, .. } if *failed > 0 => {
            notes.push(format!("{} image(s) could not be downloaded", failed))
        }
        UploadReport::Bound { .. } => {}
        UploadReport::NeedsManualAction { files, .. } => notes.push(format!(
            "select the {} image(s) manually in the file picker",
            files
        )),
        UploadReport::Failed { reason, .. } => notes.push(format!("images not uploaded: {}", reason)),
    }

    if notes.is_empty() && upload.is_clean() {
        let message = match upload {
            UploadReport::Bound { files, .. } => format!(
                "Form filled successfully: {} fields and {} images",
                fields.filled.len(),
                files
            ),
            _ => format!("Form filled successfully: {} fields", fields.filled.len()),
        };
        return RunOutcome {
            outcome: Outcome::Success,
            message,
        };
    }
    RunOutcome {
        outcome: Outcome::Partial,
        message: format!("Form partially filled; {}", notes.join("; ")),
    }
}

pub struct FormFiller<'a> {
    resolver: ElementResolver<'a>,
    status: &'a dyn StatusReporter,
    config: &'a EngineConfig,
    profile: &'a FormProfile,
    state: Cell<FillState>,
}

impl<'a> FormFiller<'a> {
    pub fn new(
        doc: &'a dyn Document,
        status: &'a dyn StatusReporter,
        config: &'a EngineConfig,
        profile: &'a FormProfile,
    ) -> Self {
        Self {
            resolver: ElementResolver::new(doc),
            status,
            config,
            profile,
            state: Cell::new(FillState::WaitingForForm),
        }
    }

    pub fn state(&self) -> FillState {
        self.state.get()
    }

    fn enter(&self, next: FillState) {
        info!("[fill] {:?} -> {:?}", self.state.get(), next);
        self.state.set(next);
    }

    fn doc(&self) -> &'a dyn Document {
        self.resolver.document()
    }

    /// Fill `record` into the form and attach `images`. Never fails: every
    /// problem is folded into the returned outcome.
    pub async fn run(
        &self,
        record: &FieldRecord,
        images: Option<&ImageList>,
        fetcher: &AssetFetcher<'_>,
    ) -> RunOutcome {
        self.enter(FillState::WaitingForForm);
        self.status.report("Waiting for the form to load...", Severity::Info).await;

        if let Err(e) = self.wait_for_form().await {
            warn!("[fill] {}", e);
            self.enter(FillState::Failed);
            let outcome = RunOutcome {
                outcome: Outcome::Failed,
                message: "Form did not load. Refresh the page and try again.".to_string(),
            };
            self.status.report(&outcome.message, Severity::Error).await;
            return outcome;
        }

        self.enter(FillState::Filling);
        self.status.report("Filling vehicle details...", Severity::Info).await;
        let fields = self.fill_fields(record).await;

        let upload = match images.filter(|list| !list.is_empty()) {
            Some(list) => {
                self.enter(FillState::Uploading);
                self.status
                    .report(
                        &format!("Uploading {} images...", list.len().min(fetcher.cap())),
                        Severity::Info,
                    )
                    .await;
                self.upload(list, fetcher).await
            }
            None => UploadReport::NotRequested,
        };

        let outcome = summarize(&fields, &upload);
        self.enter(FillState::Done(outcome.outcome));
        let severity = match outcome.outcome {
            Outcome::Success => Severity::Success,
            _ => Severity::Warning,
        };
        self.status.report(&outcome.message, severity).await;
        outcome
    }

    async fn wait_for_form(&self) -> Result<usize, EngineError> {
        let doc = self.doc();
        let selector = self.profile.ready_selector;
        let threshold = self.config.form_ready_threshold;
        let last_seen = Cell::new(0);
        let last_seen = &last_seen;

        let found = with_retry(self.config.form_ready_retry(), move || async move {
            let count = doc.query_all(selector).await.map(|v| v.len()).unwrap_or(0);
            last_seen.set(count);
            (count > threshold).then_some(count)
        })
        .await;

        match found {
            Some(count) => {
                info!("[fill] form ready with {} controls", count);
                Ok(count)
            }
            None => Err(EngineError::FormNotReady {
                found: last_seen.get(),
                threshold,
            }),
        }
    }

    async fn fill_fields(&self, record: &FieldRecord) -> FieldSummary {
        let mut summary = FieldSummary::default();
        for target in self.profile.fields {
            let Some(raw) = record.value(target.field) else {
                continue;
            };
            let result = match target.prepare(&raw) {
                Some(value) => self.fill_field(target, &value).await,
                None => Err(EngineError::simulation(
                    target.field,
                    format!("{:?} has nothing usable", raw),
                )),
            };
            match result {
                Ok(()) => {
                    info!("[fill] {} set", target.field);
                    summary.filled.push(target.field);
                }
                Err(e) => {
                    warn!("[fill] {} failed: {}", target.field, e);
                    summary.failed.push((target.field, e.to_string()));
                }
            }
            self.doc().release_handles().await;
        }
        summary
    }

    async fn fill_field(&self, target: &FieldTarget, value: &str) -> Result<(), EngineError> {
        let query = target.query();
        match target.kind {
            FieldKind::Text => {
                let el = self.resolver.resolve(&query, target.retry(self.config)).await?;
                let options = FillOptions::from_config(self.config).clear_first(target.clear_first);
                InputSimulator::new(self.doc())
                    .fill(el, Some(value), &options)
                    .await
            }
            FieldKind::Choice => {
                let mut options = SelectOptions::from_config(self.config);
                options.trigger_retry = target.retry(self.config);
                let selection = OptionSelector::new(&self.resolver)
                    .select(&query, value, &options)
                    .await?;
                info!("[fill] {} -> {:?}", target.field, selection);
                match selection {
                    Selection::Fallback(_) => Err(EngineError::simulation(
                        target.field,
                        "control not found, value went into a guessed input",
                    )),
                    _ => Ok(()),
                }
            }
        }
    }

    async fn upload(&self, images: &ImageList, fetcher: &AssetFetcher<'_>) -> UploadReport {
        let results = fetcher.fetch(images.urls()).await;
        let (assets, failures): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
        let assets: Vec<Asset> = assets.into_iter().filter_map(Result::ok).collect();
        let failed = failures.len();

        if assets.is_empty() {
            warn!("[fill] no images acquired, skipping upload");
            return UploadReport::NoAssets { failed };
        }

        let binder = UploadBinder::new(
            &self.resolver,
            self.profile.file_input_query(),
            self.profile.add_photos_query(),
            UploadOptions::from_config(self.config),
        );
        let outcome = match binder.locate_file_input().await {
            Ok(input) => binder.bind(input, &assets).await,
            Err(e) => Err(e),
        };
        self.doc().release_handles().await;

        match outcome {
            Ok(UploadOutcome::Bound(files)) => UploadReport::Bound { files, failed },
            Ok(UploadOutcome::NeedsManualAction) => UploadReport::NeedsManualAction {
                files: assets.len(),
                failed,
            },
            Err(e) => {
                warn!("[fill] upload failed: {}", e);
                UploadReport::Failed {
                    reason: e.to_string(),
                    failed,
                }
            }
        }
    }
}
