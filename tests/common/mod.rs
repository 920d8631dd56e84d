#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use vehicle_lister_lib::engine::assets::{AcquisitionTechnique, Acquired};
use vehicle_lister_lib::engine::{Severity, StatusReporter};

/// Keeps every status report for inspection.
#[derive(Default)]
pub struct RecordingReporter {
    pub messages: RefCell<Vec<(String, Severity)>>,
}

impl RecordingReporter {
    pub fn terminal(&self) -> Vec<(String, Severity)> {
        self.messages
            .borrow()
            .iter()
            .filter(|(_, severity)| *severity != Severity::Info)
            .cloned()
            .collect()
    }
}

#[async_trait(?Send)]
impl StatusReporter for RecordingReporter {
    async fn report(&self, message: &str, severity: Severity) {
        self.messages.borrow_mut().push((message.to_string(), severity));
    }
}

/// Succeeds only for the URLs it was given, optionally after a delay.
pub struct ScriptedTechnique {
    pub name: &'static str,
    pub serves: HashMap<String, Vec<u8>>,
    pub delay: Duration,
    pub calls: RefCell<Vec<String>>,
}

impl ScriptedTechnique {
    pub fn new(name: &'static str, serves: &[&str]) -> Self {
        Self {
            name,
            serves: serves
                .iter()
                .map(|url| (url.to_string(), format!("{}:{}", name, url).into_bytes()))
                .collect(),
            delay: Duration::ZERO,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait(?Send)]
impl AcquisitionTechnique for ScriptedTechnique {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn acquire(&self, url: &str) -> Result<Acquired> {
        self.calls.borrow_mut().push(url.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.serves.get(url) {
            Some(bytes) => Ok(Acquired {
                bytes: bytes.clone(),
                content_type: "image/jpeg".to_string(),
            }),
            None => bail!("{} refused {}", self.name, url),
        }
    }
}
