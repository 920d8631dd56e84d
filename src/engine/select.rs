//! Chooses an entry in dropdown-like controls. Target pages mix native
//! `<select>`, custom comboboxes with rendered option lists, and free-text
//! fields with autocomplete, so selection falls back layer by layer.

use super::input::InputSimulator;
use super::resolver::{ElementResolver, ResolutionQuery};
use super::retry::RetryPolicy;
use crate::config::EngineConfig;
use crate::dom::{attr_equals, Document, DomEvent, ElementHandle};
use crate::error::EngineError;
use log::{debug, info, warn};
use std::time::Duration;

/// Where rendered options usually live, most specific first. The first
/// selector with any match defines the candidate pool.
pub const OPTION_SELECTORS: &[&str] = &[
    r#"[role="option"]"#,
    r#"[role="menuitem"]"#,
    ".dropdown-option",
    ".select-option",
    r#"[data-testid="dropdown-option"]"#,
    ".menu-item",
    r#"[role="listbox"] > *"#,
    "ul > li",
];

#[derive(Debug, Clone, Copy)]
pub struct SelectOptions {
    pub trigger_retry: RetryPolicy,
    pub option_retry: RetryPolicy,
    pub dropdown_delay: Duration,
    pub match_delay: Duration,
}

impl SelectOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            trigger_retry: config.slow_retry(),
            option_retry: config.option_retry(),
            dropdown_delay: Duration::from_millis(config.dropdown_delay_ms),
            match_delay: Duration::from_millis(config.match_delay_ms),
        }
    }
}

/// How the value ended up in the control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A rendered option was clicked; carries its text.
    Option(String),
    /// A native `<select>` was set to this option value.
    Native(String),
    /// No option matched; the text was typed and committed with Enter.
    DirectInput,
    /// The trigger was never found; the value went into the first free text
    /// input instead. The field itself is still unset.
    Fallback(Box<Selection>),
}

/// A trigger found after resolution gave up.
enum FallbackTrigger {
    /// Next to a label naming the control.
    Labelled(ElementHandle),
    /// The first visible, still empty text input on the page.
    FirstFreeInput(ElementHandle),
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Index of the best candidate for `target`: an exact (case-insensitive,
/// trimmed) match anywhere in the pool wins over any containment match.
pub fn best_match<S: AsRef<str>>(candidates: &[S], target: &str) -> Option<usize> {
    let target = normalize(target);
    if target.is_empty() {
        return None;
    }
    let normalized: Vec<String> = candidates.iter().map(|c| normalize(c.as_ref())).collect();
    normalized
        .iter()
        .position(|text| *text == target)
        .or_else(|| normalized.iter().position(|text| text.contains(&target)))
}

/// `X` from `[aria-label="X"]`.
fn label_from_selector(selector: &str) -> Option<&str> {
    selector
        .strip_prefix("[aria-label=\"")
        .and_then(|rest| rest.strip_suffix("\"]"))
}

pub struct OptionSelector<'a> {
    resolver: &'a ElementResolver<'a>,
}

impl<'a> OptionSelector<'a> {
    pub fn new(resolver: &'a ElementResolver<'a>) -> Self {
        Self { resolver }
    }

    fn doc(&self) -> &'a dyn Document {
        self.resolver.document()
    }

    pub async fn select(
        &self,
        query: &ResolutionQuery,
        target: &str,
        options: &SelectOptions,
    ) -> Result<Selection, EngineError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(EngineError::simulation(query.to_string(), "no option text"));
        }

        let (trigger, guessed) = match self.resolver.resolve(query, options.trigger_retry).await {
            Ok(el) => (el, false),
            Err(e) => match self.fallback_trigger(query).await? {
                Some(FallbackTrigger::Labelled(el)) => (el, false),
                Some(FallbackTrigger::FirstFreeInput(el)) => (el, true),
                None => return Err(e),
            },
        };

        let selection = self.select_on(trigger, query, target, options).await?;
        if guessed {
            warn!("[select] {} only reached a guessed input", query);
            return Ok(Selection::Fallback(Box::new(selection)));
        }
        Ok(selection)
    }

    async fn select_on(
        &self,
        trigger: ElementHandle,
        query: &ResolutionQuery,
        target: &str,
        options: &SelectOptions,
    ) -> Result<Selection, EngineError> {
        let doc = self.doc();
        let trigger_info = doc.describe(trigger).await?;

        if trigger_info.is_select() {
            return self.select_native(trigger, target).await;
        }

        doc.click(trigger).await?;
        tokio::time::sleep(options.dropdown_delay).await;

        let pool = self
            .resolver
            .resolve_all(OPTION_SELECTORS, options.option_retry)
            .await;
        let texts: Vec<String> = doc
            .describe_all(&pool)
            .await?
            .into_iter()
            .map(|info| info.text)
            .collect();
        debug!("[select] {} candidate options for {:?}", pool.len(), target);

        if let Some(index) = best_match(&texts, target) {
            let chosen = texts[index].trim().to_string();
            info!("[select] choosing option {:?} for {:?}", chosen, target);
            doc.click(pool[index]).await?;
            tokio::time::sleep(options.match_delay).await;
            return Ok(Selection::Option(chosen));
        }

        if trigger_info.is_text_input() {
            debug!("[select] no option matched {:?}, typing it directly", target);
            if !pool.is_empty() {
                // close the list we opened
                doc.click(trigger).await?;
            }
            InputSimulator::new(doc).set_and_commit(trigger, target).await?;
            tokio::time::sleep(options.match_delay).await;
            doc.dispatch(trigger, &DomEvent::enter()).await?;
            return Ok(Selection::DirectInput);
        }

        Err(EngineError::simulation(
            query.to_string(),
            format!("no option matching {:?} among {} candidates", target, pool.len()),
        ))
    }

    async fn select_native(
        &self,
        select: ElementHandle,
        target: &str,
    ) -> Result<Selection, EngineError> {
        let doc = self.doc();
        let options = doc.query_all_within(select, "option").await?;
        let infos = doc.describe_all(&options).await?;
        let texts: Vec<&str> = infos.iter().map(|i| i.text.as_str()).collect();
        let Some(index) = best_match(&texts, target) else {
            return Err(EngineError::simulation(
                "select",
                format!("no <option> matching {:?}", target),
            ));
        };
        let value = infos[index]
            .attr("value")
            .map(str::to_string)
            .unwrap_or_else(|| infos[index].text.trim().to_string());
        doc.set_value(select, &value).await?;
        doc.dispatch(select, &DomEvent::Input).await?;
        doc.dispatch(select, &DomEvent::Change).await?;
        Ok(Selection::Native(value))
    }

    /// The trigger could not be resolved: look for a label naming it and
    /// take the control next to it, else the first visible text input that
    /// nothing has been written into.
    async fn fallback_trigger(
        &self,
        query: &ResolutionQuery,
    ) -> Result<Option<FallbackTrigger>, EngineError> {
        let doc = self.doc();
        let label_text = query
            .label
            .clone()
            .or_else(|| {
                query
                    .selectors
                    .first()
                    .and_then(|s| label_from_selector(s))
                    .map(str::to_string)
            })
            .map(|t| t.to_lowercase());

        if let Some(label_text) = label_text {
            let labels = doc.query_all("label").await?;
            let infos = doc.describe_all(&labels).await?;
            for (label, info) in labels.into_iter().zip(infos) {
                if !info.text.to_lowercase().contains(&label_text) {
                    continue;
                }
                if let Some(sibling) = doc.next_sibling(label).await? {
                    let sibling_info = doc.describe(sibling).await?;
                    if sibling_info.is_select()
                        || sibling_info.tag == "input"
                        || sibling_info.attr("role") == Some("combobox")
                    {
                        return Ok(Some(FallbackTrigger::Labelled(sibling)));
                    }
                }
                if let Some(parent) = doc.parent(label).await? {
                    let combobox = attr_equals("role", "combobox");
                    if let Some(el) = doc.query_within(parent, &combobox).await? {
                        return Ok(Some(FallbackTrigger::Labelled(el)));
                    }
                    if let Some(el) = doc.query_within(parent, "select").await? {
                        return Ok(Some(FallbackTrigger::Labelled(el)));
                    }
                }
            }
        }

        let inputs = doc.query_all(r#"input:not([type="hidden"])"#).await?;
        let infos = doc.describe_all(&inputs).await?;
        let free = inputs
            .into_iter()
            .zip(infos)
            .find(|(_, info)| info.visible && info.is_text_input() && info.is_empty())
            .map(|(el, _)| el);
        if free.is_some() {
            warn!("[select] falling back to first free input for {}", query);
        }
        Ok(free.map(FallbackTrigger::FirstFreeInput))
    }
}
