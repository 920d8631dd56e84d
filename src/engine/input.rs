//! Writes values the way a person types them. The event order is part of the
//! contract with the target page's framework listeners:
//! focus, [clear], per character keydown → keypress → append → keyup,
//! then input → change → blur.

use crate::config::EngineConfig;
use crate::dom::{Document, DomEvent, ElementHandle};
use crate::error::EngineError;
use log::debug;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct FillOptions {
    pub clear_first: bool,
    pub focus_settle: Duration,
    pub key_delay: Duration,
    pub post_delay: Duration,
}

impl FillOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            clear_first: false,
            focus_settle: Duration::from_millis(config.focus_settle_ms),
            key_delay: Duration::from_millis(config.key_delay_ms),
            post_delay: Duration::from_millis(config.field_settle_ms),
        }
    }

    pub fn clear_first(mut self, clear: bool) -> Self {
        self.clear_first = clear;
        self
    }
}

pub struct InputSimulator<'a> {
    doc: &'a dyn Document,
}

impl<'a> InputSimulator<'a> {
    pub fn new(doc: &'a dyn Document) -> Self {
        Self { doc }
    }

    /// Type `value` into `el`. Empty or missing values fail without touching
    /// the document. No retry here; a stale element is a failure.
    pub async fn fill(
        &self,
        el: ElementHandle,
        value: Option<&str>,
        options: &FillOptions,
    ) -> Result<(), EngineError> {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return Err(EngineError::simulation(target(el), "no value to fill"));
        };
        debug!("[input] filling {:?} with {} chars", el, value.chars().count());

        self.type_value(el, value, options)
            .await
            .map_err(|e| EngineError::simulation(target(el), e))
    }

    async fn type_value(
        &self,
        el: ElementHandle,
        value: &str,
        options: &FillOptions,
    ) -> Result<(), crate::error::DomError> {
        self.doc.focus(el).await?;
        tokio::time::sleep(options.focus_settle).await;

        if options.clear_first {
            self.doc.set_value(el, "").await?;
            tokio::time::sleep(options.focus_settle).await;
        }

        for ch in value.chars() {
            self.doc.type_character(el, ch).await?;
            tokio::time::sleep(options.key_delay).await;
        }

        for event in [DomEvent::Input, DomEvent::Change, DomEvent::Blur] {
            self.doc.dispatch(el, &event).await?;
        }

        tokio::time::sleep(options.post_delay).await;
        Ok(())
    }

    /// Assign `value` in one step and commit it with input/change. Used by
    /// the dropdown fallback, where per-key events would reopen suggestions.
    pub async fn set_and_commit(&self, el: ElementHandle, value: &str) -> Result<(), EngineError> {
        let doc = self.doc;
        async {
            doc.set_value(el, value).await?;
            doc.dispatch(el, &DomEvent::Input).await?;
            doc.dispatch(el, &DomEvent::Change).await
        }
        .await
        .map_err(|e| EngineError::simulation(target(el), e))
    }
}

fn target(el: ElementHandle) -> String {
    format!("element#{}@{}", el.index(), el.generation())
}
