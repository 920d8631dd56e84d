//! The execution-context seam. Every engine component reads and mutates the
//! live document through [`Document`]; backends decide how a primitive
//! reaches the page.

pub mod snapshot;

use crate::error::DomError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub use snapshot::HtmlDocument;

/// Opaque reference to a located control. Valid until the next
/// [`Document::release_handles`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    #[serde(rename = "gen")]
    generation: u32,
    index: u32,
}

impl ElementHandle {
    pub(crate) fn new(generation: u32, index: u32) -> Self {
        Self { generation, index }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }
}

/// What a backend reports about one element.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    /// Current value of a form control, as typed so far.
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub visible: bool,
}

const NON_TEXT_INPUT_TYPES: &[&str] = &[
    "hidden", "checkbox", "radio", "file", "submit", "button", "image", "reset",
];

impl ElementInfo {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn input_type(&self) -> String {
        self.attr("type").unwrap_or("text").to_ascii_lowercase()
    }

    /// An `<input>` that accepts typed text.
    pub fn is_text_input(&self) -> bool {
        self.tag == "input" && !NON_TEXT_INPUT_TYPES.contains(&self.input_type().as_str())
    }

    pub fn is_select(&self) -> bool {
        self.tag == "select"
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// Notifications the engine dispatches on a control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DomEvent {
    KeyDown { key: String, key_code: u32 },
    KeyPress { key: String, key_code: u32 },
    KeyUp { key: String, key_code: u32 },
    Input,
    Change,
    Blur,
}

impl DomEvent {
    pub fn key_down(ch: char) -> Self {
        Self::KeyDown {
            key: ch.to_string(),
            key_code: ch as u32,
        }
    }

    pub fn key_press(ch: char) -> Self {
        Self::KeyPress {
            key: ch.to_string(),
            key_code: ch as u32,
        }
    }

    pub fn key_up(ch: char) -> Self {
        Self::KeyUp {
            key: ch.to_string(),
            key_code: ch as u32,
        }
    }

    pub fn enter() -> Self {
        Self::KeyDown {
            key: "Enter".to_string(),
            key_code: 13,
        }
    }
}

/// One file destined for a file input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Parameters for the image-element + canvas technique.
#[derive(Debug, Clone, Copy)]
pub struct RasterRequest {
    pub quality: f64,
    pub fallback_width: u32,
    pub fallback_height: u32,
    pub timeout: Duration,
}

/// A single already-loaded document.
///
/// Implementations are driven from one task at a time; no two engine
/// operations run against the same document concurrently.
#[async_trait(?Send)]
pub trait Document {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, DomError>;

    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, DomError> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    /// Descendants of `scope` matching `selector`; `scope` itself never matches.
    async fn query_all_within(
        &self,
        scope: ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DomError>;

    async fn query_within(
        &self,
        scope: ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DomError> {
        Ok(self
            .query_all_within(scope, selector)
            .await?
            .into_iter()
            .next())
    }

    async fn element_by_id(&self, id: &str) -> Result<Option<ElementHandle>, DomError>;

    async fn parent(&self, el: ElementHandle) -> Result<Option<ElementHandle>, DomError>;

    /// Next element sibling, skipping text nodes.
    async fn next_sibling(&self, el: ElementHandle) -> Result<Option<ElementHandle>, DomError>;

    async fn describe(&self, el: ElementHandle) -> Result<ElementInfo, DomError>;

    async fn describe_all(&self, els: &[ElementHandle]) -> Result<Vec<ElementInfo>, DomError> {
        let mut infos = Vec::with_capacity(els.len());
        for el in els {
            infos.push(self.describe(*el).await?);
        }
        Ok(infos)
    }

    /// One attribute of each element, without the rest of its description.
    async fn attribute_all(
        &self,
        els: &[ElementHandle],
        name: &str,
    ) -> Result<Vec<Option<String>>, DomError> {
        Ok(self
            .describe_all(els)
            .await?
            .into_iter()
            .map(|info| info.attributes.get(name).cloned())
            .collect())
    }

    async fn focus(&self, el: ElementHandle) -> Result<(), DomError>;

    async fn click(&self, el: ElementHandle) -> Result<(), DomError>;

    async fn set_value(&self, el: ElementHandle, value: &str) -> Result<(), DomError>;

    async fn append_value(&self, el: ElementHandle, text: &str) -> Result<(), DomError>;

    async fn dispatch(&self, el: ElementHandle, event: &DomEvent) -> Result<(), DomError>;

    /// One physical keystroke: keydown, keypress, value append, keyup.
    /// Backends may batch this but must keep the order.
    async fn type_character(&self, el: ElementHandle, ch: char) -> Result<(), DomError> {
        self.dispatch(el, &DomEvent::key_down(ch)).await?;
        self.dispatch(el, &DomEvent::key_press(ch)).await?;
        self.append_value(el, &ch.to_string()).await?;
        self.dispatch(el, &DomEvent::key_up(ch)).await
    }

    /// Replace the control's file list and fire `change`.
    /// `DomError::Unsupported` when the context cannot build a file list.
    async fn assign_files(&self, el: ElementHandle, files: &[FilePayload]) -> Result<(), DomError>;

    /// Load `url` into an image element and export it through a canvas as JPEG.
    async fn rasterize_image(&self, url: &str, request: &RasterRequest)
        -> Result<Vec<u8>, DomError>;

    /// Invalidate every handle handed out so far.
    async fn release_handles(&self);
}

/// `[attr="value"]` with the value quoted for CSS.
pub fn attr_equals(attr: &str, value: &str) -> String {
    format!("[{}=\"{}\"]", attr, escape_css_string(value))
}

fn escape_css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_equals_quotes_value() {
        assert_eq!(attr_equals("role", "combobox"), "[role=\"combobox\"]");
        assert_eq!(attr_equals("data-testid", "a\"b"), "[data-testid=\"a\\\"b\"]");
    }

    #[test]
    fn text_input_excludes_files_and_tracks_value() {
        let mut info = ElementInfo {
            tag: "input".into(),
            ..Default::default()
        };
        assert!(info.is_text_input());
        assert!(info.is_empty());
        info.value = "Toyota".into();
        assert!(!info.is_empty());
        info.attributes.insert("type".into(), "File".into());
        assert!(!info.is_text_input());
    }
}
