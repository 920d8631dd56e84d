//! Locates form controls on markup we do not own. Each heuristic is a
//! strategy object; the resolver walks them in priority order and retries
//! the whole list while the page is still rendering.

use super::retry::{with_retry, RetryPolicy};
use crate::dom::{attr_equals, Document, ElementHandle};
use crate::error::{DomError, EngineError};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::fmt;

/// Controls a label can be bound to.
pub const FORM_CONTROL_SELECTOR: &str = "input, textarea, select";

const CONTROL_TAGS: &[&str] = &["input", "textarea", "select"];

/// Which of several matches to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
    Index(usize),
}

impl Position {
    fn pick<T: Copy>(position: Option<Self>, items: &[T]) -> Option<T> {
        match position {
            None | Some(Self::First) => items.first().copied(),
            Some(Self::Last) => items.last().copied(),
            Some(Self::Index(i)) => items.get(i).copied(),
        }
    }
}

/// Everything known about a control we want to find. Any combination of
/// hints may be set; they are tried in a fixed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionQuery {
    pub selectors: Vec<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub aria_label: Option<String>,
    pub role: Option<String>,
    pub tag: Option<String>,
    pub input_type: Option<String>,
    pub test_id: Option<String>,
    pub position: Option<Position>,
}

impl ResolutionQuery {
    pub fn selectors<S: AsRef<str>>(selectors: &[S]) -> Self {
        Self {
            selectors: selectors.iter().map(|s| s.as_ref().to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn label(mut self, text: impl Into<String>) -> Self {
        self.label = Some(text.into());
        self
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.placeholder = Some(text.into());
        self
    }

    pub fn aria_label(mut self, text: impl Into<String>) -> Self {
        self.aria_label = Some(text.into());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    pub fn test_id(mut self, id: impl Into<String>) -> Self {
        self.test_id = Some(id.into());
        self
    }

    pub fn position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for ResolutionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "selectors={:?}", self.selectors)?;
        let hints = [
            ("label", &self.label),
            ("placeholder", &self.placeholder),
            ("aria", &self.aria_label),
            ("role", &self.role),
            ("tag", &self.tag),
            ("type", &self.input_type),
            ("testid", &self.test_id),
        ];
        for (name, hint) in hints {
            if let Some(value) = hint {
                write!(f, " {}={:?}", name, value)?;
            }
        }
        Ok(())
    }
}

/// One way of finding a control.
#[async_trait(?Send)]
pub trait Heuristic {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the hint is absent or nothing matched.
    async fn try_resolve(
        &self,
        doc: &dyn Document,
        query: &ResolutionQuery,
    ) -> Result<Option<ElementHandle>, DomError>;
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// First element whose attribute value contains `text`, case-insensitively.
fn first_containing(
    els: Vec<ElementHandle>,
    values: Vec<Option<String>>,
    text: &str,
) -> Option<ElementHandle> {
    els.into_iter()
        .zip(values)
        .find(|(_, value)| value.as_deref().is_some_and(|v| contains_ci(v, text)))
        .map(|(el, _)| el)
}

pub struct DirectSelectors;

#[async_trait(?Send)]
impl Heuristic for DirectSelectors {
    fn name(&self) -> &'static str {
        "selector"
    }

    async fn try_resolve(
        &self,
        doc: &dyn Document,
        query: &ResolutionQuery,
    ) -> Result<Option<ElementHandle>, DomError> {
        for selector in &query.selectors {
            match doc.query(selector).await {
                Ok(Some(el)) => {
                    debug!("[resolver] selector hit: {}", selector);
                    return Ok(Some(el));
                }
                Ok(None) => {}
                Err(e) => warn!("[resolver] selector {} failed: {}", selector, e),
            }
        }
        Ok(None)
    }
}

/// Label text, then the label's bound control: `for` target, descendant,
/// next sibling, finally anything under the label's parent.
pub struct LabelProximity;

impl LabelProximity {
    async fn control_near(
        doc: &dyn Document,
        label: ElementHandle,
        bound_id: Option<&str>,
    ) -> Result<Option<ElementHandle>, DomError> {
        if let Some(id) = bound_id.filter(|id| !id.is_empty()) {
            if let Some(el) = doc.element_by_id(id).await? {
                return Ok(Some(el));
            }
        }
        if let Some(el) = doc.query_within(label, FORM_CONTROL_SELECTOR).await? {
            return Ok(Some(el));
        }
        if let Some(sibling) = doc.next_sibling(label).await? {
            let info = doc.describe(sibling).await?;
            if CONTROL_TAGS.contains(&info.tag.as_str()) {
                return Ok(Some(sibling));
            }
            if let Some(el) = doc.query_within(sibling, FORM_CONTROL_SELECTOR).await? {
                return Ok(Some(el));
            }
        }
        if let Some(parent) = doc.parent(label).await? {
            return doc.query_within(parent, FORM_CONTROL_SELECTOR).await;
        }
        Ok(None)
    }
}

#[async_trait(?Send)]
impl Heuristic for LabelProximity {
    fn name(&self) -> &'static str {
        "label"
    }

    async fn try_resolve(
        &self,
        doc: &dyn Document,
        query: &ResolutionQuery,
    ) -> Result<Option<ElementHandle>, DomError> {
        let Some(text) = query.label.as_deref() else {
            return Ok(None);
        };
        let labels = doc.query_all("label").await?;
        let infos = doc.describe_all(&labels).await?;
        for (label, info) in labels.into_iter().zip(infos) {
            if !contains_ci(&info.text, text) {
                continue;
            }
            if let Some(el) = Self::control_near(doc, label, info.attr("for")).await? {
                return Ok(Some(el));
            }
        }
        Ok(None)
    }
}

pub struct PlaceholderText;

#[async_trait(?Send)]
impl Heuristic for PlaceholderText {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    async fn try_resolve(
        &self,
        doc: &dyn Document,
        query: &ResolutionQuery,
    ) -> Result<Option<ElementHandle>, DomError> {
        let Some(text) = query.placeholder.as_deref() else {
            return Ok(None);
        };
        let controls = doc.query_all("input, textarea").await?;
        let placeholders = doc.attribute_all(&controls, "placeholder").await?;
        Ok(first_containing(controls, placeholders, text))
    }
}

pub struct AccessibleName;

#[async_trait(?Send)]
impl Heuristic for AccessibleName {
    fn name(&self) -> &'static str {
        "aria-label"
    }

    async fn try_resolve(
        &self,
        doc: &dyn Document,
        query: &ResolutionQuery,
    ) -> Result<Option<ElementHandle>, DomError> {
        let Some(text) = query.aria_label.as_deref() else {
            return Ok(None);
        };
        let named = doc.query_all("[aria-label]").await?;
        let names = doc.attribute_all(&named, "aria-label").await?;
        Ok(first_containing(named, names, text))
    }
}

pub struct RoleMatch;

#[async_trait(?Send)]
impl Heuristic for RoleMatch {
    fn name(&self) -> &'static str {
        "role"
    }

    async fn try_resolve(
        &self,
        doc: &dyn Document,
        query: &ResolutionQuery,
    ) -> Result<Option<ElementHandle>, DomError> {
        let Some(role) = query.role.as_deref() else {
            return Ok(None);
        };
        let matches = doc.query_all(&attr_equals("role", role)).await?;
        Ok(Position::pick(query.position, &matches))
    }
}

pub struct TagMatch;

#[async_trait(?Send)]
impl Heuristic for TagMatch {
    fn name(&self) -> &'static str {
        "tag"
    }

    async fn try_resolve(
        &self,
        doc: &dyn Document,
        query: &ResolutionQuery,
    ) -> Result<Option<ElementHandle>, DomError> {
        let Some(tag) = query.tag.as_deref() else {
            return Ok(None);
        };
        let matches = doc.query_all(tag).await?;
        Ok(Position::pick(query.position, &matches))
    }
}

pub struct InputTypeMatch;

#[async_trait(?Send)]
impl Heuristic for InputTypeMatch {
    fn name(&self) -> &'static str {
        "input-type"
    }

    async fn try_resolve(
        &self,
        doc: &dyn Document,
        query: &ResolutionQuery,
    ) -> Result<Option<ElementHandle>, DomError> {
        let Some(input_type) = query.input_type.as_deref() else {
            return Ok(None);
        };
        let selector = format!("input{}", attr_equals("type", input_type));
        let matches = doc.query_all(&selector).await?;
        Ok(Position::pick(query.position, &matches))
    }
}

pub struct TestIdMatch;

#[async_trait(?Send)]
impl Heuristic for TestIdMatch {
    fn name(&self) -> &'static str {
        "testid"
    }

    async fn try_resolve(
        &self,
        doc: &dyn Document,
        query: &ResolutionQuery,
    ) -> Result<Option<ElementHandle>, DomError> {
        let Some(id) = query.test_id.as_deref() else {
            return Ok(None);
        };
        doc.query(&attr_equals("data-testid", id)).await
    }
}

pub fn default_heuristics() -> Vec<Box<dyn Heuristic>> {
    vec![
        Box::new(DirectSelectors),
        Box::new(LabelProximity),
        Box::new(PlaceholderText),
        Box::new(AccessibleName),
        Box::new(RoleMatch),
        Box::new(TagMatch),
        Box::new(InputTypeMatch),
        Box::new(TestIdMatch),
    ]
}

pub struct ElementResolver<'a> {
    doc: &'a dyn Document,
    heuristics: Vec<Box<dyn Heuristic>>,
}

impl<'a> ElementResolver<'a> {
    pub fn new(doc: &'a dyn Document) -> Self {
        Self::with_heuristics(doc, default_heuristics())
    }

    pub fn with_heuristics(doc: &'a dyn Document, heuristics: Vec<Box<dyn Heuristic>>) -> Self {
        Self { doc, heuristics }
    }

    pub fn document(&self) -> &'a dyn Document {
        self.doc
    }

    async fn attempt(&self, query: &ResolutionQuery) -> Option<ElementHandle> {
        for heuristic in &self.heuristics {
            match heuristic.try_resolve(self.doc, query).await {
                Ok(Some(el)) => {
                    debug!("[resolver] found via {}: {}", heuristic.name(), query);
                    return Some(el);
                }
                Ok(None) => {}
                Err(e) => warn!("[resolver] {} heuristic failed: {}", heuristic.name(), e),
            }
        }
        None
    }

    /// Single control for `query`, or `EngineError::Resolution` once the
    /// budget is spent.
    pub async fn resolve(
        &self,
        query: &ResolutionQuery,
        policy: RetryPolicy,
    ) -> Result<ElementHandle, EngineError> {
        match with_retry(policy, move || self.attempt(query)).await {
            Some(el) => Ok(el),
            None => {
                info!(
                    "[resolver] not found after {} attempts: {}",
                    policy.max_attempts, query
                );
                Err(EngineError::Resolution {
                    query: query.to_string(),
                    attempts: policy.max_attempts,
                })
            }
        }
    }

    /// Every match of the first selector that matches anything. Empty when
    /// the budget runs out.
    pub async fn resolve_all<S: AsRef<str>>(
        &self,
        selectors: &[S],
        policy: RetryPolicy,
    ) -> Vec<ElementHandle> {
        let found = with_retry(policy, move || async move {
            for selector in selectors {
                match self.doc.query_all(selector.as_ref()).await {
                    Ok(found) if !found.is_empty() => {
                        debug!(
                            "[resolver] {} elements for {}",
                            found.len(),
                            selector.as_ref()
                        );
                        return Some(found);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("[resolver] selector {} failed: {}", selector.as_ref(), e),
                }
            }
            None
        })
        .await;
        found.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_picks_requested_match() {
        let items = [1, 2, 3];
        assert_eq!(Position::pick(None, &items), Some(1));
        assert_eq!(Position::pick(Some(Position::Last), &items), Some(3));
        assert_eq!(Position::pick(Some(Position::Index(1)), &items), Some(2));
        assert_eq!(Position::pick(Some(Position::Index(9)), &items), None);
        assert_eq!(Position::pick::<i32>(Some(Position::First), &[]), None);
    }

    #[test]
    fn attribute_match_skips_missing_values() {
        let els = vec![ElementHandle::new(0, 0), ElementHandle::new(0, 1), ElementHandle::new(0, 2)];
        let values = vec![None, Some("Search".to_string()), Some("Fuel Type".to_string())];
        assert_eq!(first_containing(els.clone(), values.clone(), "fuel"), Some(els[2]));
        assert_eq!(first_containing(els, values, "price"), None);
    }

    #[test]
    fn query_display_lists_set_hints() {
        let query = ResolutionQuery::selectors(&["input[name=\"make\"]"])
            .label("Make")
            .role("combobox");
        let text = query.to_string();
        assert!(text.contains("label=\"Make\""));
        assert!(text.contains("role=\"combobox\""));
        assert!(!text.contains("placeholder"));
    }
}
