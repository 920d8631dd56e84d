//! A parsed HTML snapshot that behaves like a live document for the engine:
//! writes, focus, clicks, events and file assignments land in an overlay that
//! can be inspected afterwards. Backs the offline dry run and the tests.

use super::{Document, DomEvent, ElementHandle, ElementInfo, FilePayload, RasterRequest};
use crate::error::DomError;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Default)]
struct Overlay {
    generation: u32,
    handles: Vec<usize>,
    values: HashMap<usize, String>,
    events: Vec<(usize, DomEvent)>,
    clicks: Vec<usize>,
    focused: Option<usize>,
    files: HashMap<usize, Vec<FilePayload>>,
    queried: Vec<String>,
}

pub struct HtmlDocument {
    html: Html,
    file_assignment: bool,
    overlay: RefCell<Overlay>,
}

impl HtmlDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
            file_assignment: true,
            overlay: RefCell::new(Overlay::default()),
        }
    }

    /// Behave like a context where file inputs reject synthetic file lists.
    pub fn without_file_assignment(mut self) -> Self {
        self.file_assignment = false;
        self
    }

    /// Current value of the first element matching `selector`.
    pub fn value_of(&self, selector: &str) -> Option<String> {
        let ordinal = self.first_ordinal(selector)?;
        Some(self.current_value(ordinal))
    }

    /// Events dispatched on the first element matching `selector`, in order.
    pub fn events_on(&self, selector: &str) -> Vec<DomEvent> {
        let Some(ordinal) = self.first_ordinal(selector) else {
            return Vec::new();
        };
        self.overlay
            .borrow()
            .events
            .iter()
            .filter(|(target, _)| *target == ordinal)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn was_clicked(&self, selector: &str) -> bool {
        self.first_ordinal(selector)
            .map(|ordinal| self.overlay.borrow().clicks.contains(&ordinal))
            .unwrap_or(false)
    }

    pub fn is_focused(&self, selector: &str) -> bool {
        let focused = self.overlay.borrow().focused;
        focused.is_some() && focused == self.first_ordinal(selector)
    }

    pub fn files_on(&self, selector: &str) -> Vec<FilePayload> {
        self.first_ordinal(selector)
            .and_then(|ordinal| self.overlay.borrow().files.get(&ordinal).cloned())
            .unwrap_or_default()
    }

    /// Every selector the engine has queried, in call order.
    pub fn queried_selectors(&self) -> Vec<String> {
        self.overlay.borrow().queried.clone()
    }

    /// Number of writes or events the engine has performed.
    pub fn mutation_count(&self) -> usize {
        let overlay = self.overlay.borrow();
        overlay.values.len() + overlay.events.len() + overlay.clicks.len() + overlay.files.len()
    }

    fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
    }

    fn element(&self, ordinal: usize) -> Option<ElementRef<'_>> {
        self.elements().nth(ordinal)
    }

    fn ordinal_of(&self, el: ElementRef<'_>) -> Option<usize> {
        self.elements().position(|candidate| candidate.id() == el.id())
    }

    fn first_ordinal(&self, selector: &str) -> Option<usize> {
        let sel = Selector::parse(selector).ok()?;
        self.elements().position(|el| sel.matches(&el))
    }

    fn parse_selector(&self, selector: &str) -> Result<Selector, DomError> {
        self.overlay.borrow_mut().queried.push(selector.to_string());
        Selector::parse(selector).map_err(|_| DomError::InvalidSelector(selector.to_string()))
    }

    fn register(&self, ordinal: usize) -> ElementHandle {
        let mut overlay = self.overlay.borrow_mut();
        overlay.handles.push(ordinal);
        ElementHandle::new(overlay.generation, (overlay.handles.len() - 1) as u32)
    }

    fn ordinal(&self, handle: ElementHandle) -> Result<usize, DomError> {
        let overlay = self.overlay.borrow();
        if handle.generation() != overlay.generation {
            return Err(DomError::StaleHandle {
                handle_generation: handle.generation(),
                current_generation: overlay.generation,
            });
        }
        overlay
            .handles
            .get(handle.index())
            .copied()
            .ok_or_else(|| DomError::Script("unknown element handle".to_string()))
    }

    fn resolve(&self, handle: ElementHandle) -> Result<(usize, ElementRef<'_>), DomError> {
        let ordinal = self.ordinal(handle)?;
        let el = self
            .element(ordinal)
            .ok_or_else(|| DomError::Script("element left the document".to_string()))?;
        Ok((ordinal, el))
    }

    fn initial_value(el: ElementRef<'_>) -> String {
        match el.value().name() {
            "textarea" => el.text().collect(),
            "select" => Selector::parse("option")
                .ok()
                .and_then(|option| {
                    let mut options = el.select(&option);
                    let first = el.select(&option).next();
                    options
                        .find(|o| o.value().attr("selected").is_some())
                        .or(first)
                        .map(|o| {
                            o.value()
                                .attr("value")
                                .map(str::to_string)
                                .unwrap_or_else(|| o.text().collect::<String>().trim().to_string())
                        })
                })
                .unwrap_or_default(),
            _ => el.value().attr("value").unwrap_or_default().to_string(),
        }
    }

    fn current_value(&self, ordinal: usize) -> String {
        if let Some(value) = self.overlay.borrow().values.get(&ordinal) {
            return value.clone();
        }
        self.element(ordinal)
            .map(Self::initial_value)
            .unwrap_or_default()
    }

    fn hides(el: ElementRef<'_>) -> bool {
        let v = el.value();
        v.attr("hidden").is_some()
            || v.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
            || v.attr("style").is_some_and(|s| {
                s.replace(' ', "").to_ascii_lowercase().contains("display:none")
            })
    }

    fn is_visible(el: ElementRef<'_>) -> bool {
        !Self::hides(el) && !el.ancestors().filter_map(ElementRef::wrap).any(Self::hides)
    }

    fn push_event(&self, ordinal: usize, event: DomEvent) {
        self.overlay.borrow_mut().events.push((ordinal, event));
    }
}

#[async_trait(?Send)]
impl Document for HtmlDocument {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, DomError> {
        let sel = self.parse_selector(selector)?;
        let ordinals: Vec<usize> = self
            .elements()
            .enumerate()
            .filter(|(_, el)| sel.matches(el))
            .map(|(ordinal, _)| ordinal)
            .collect();
        Ok(ordinals.into_iter().map(|o| self.register(o)).collect())
    }

    async fn query_all_within(
        &self,
        scope: ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DomError> {
        let (_, scope_el) = self.resolve(scope)?;
        let scope_id = scope_el.id();
        let sel = self.parse_selector(selector)?;
        let ordinals: Vec<usize> = self
            .elements()
            .enumerate()
            .filter(|(_, el)| el.id() != scope_id && sel.matches(el))
            .filter(|(_, el)| el.ancestors().any(|a| a.id() == scope_id))
            .map(|(ordinal, _)| ordinal)
            .collect();
        Ok(ordinals.into_iter().map(|o| self.register(o)).collect())
    }

    async fn element_by_id(&self, id: &str) -> Result<Option<ElementHandle>, DomError> {
        let ordinal = self
            .elements()
            .position(|el| el.value().attr("id") == Some(id));
        Ok(ordinal.map(|o| self.register(o)))
    }

    async fn parent(&self, el: ElementHandle) -> Result<Option<ElementHandle>, DomError> {
        let (_, node) = self.resolve(el)?;
        let ordinal = node
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|p| self.ordinal_of(p));
        Ok(ordinal.map(|o| self.register(o)))
    }

    async fn next_sibling(&self, el: ElementHandle) -> Result<Option<ElementHandle>, DomError> {
        let (_, node) = self.resolve(el)?;
        let ordinal = node
            .next_siblings()
            .find_map(ElementRef::wrap)
            .and_then(|s| self.ordinal_of(s));
        Ok(ordinal.map(|o| self.register(o)))
    }

    async fn describe(&self, el: ElementHandle) -> Result<ElementInfo, DomError> {
        let (ordinal, node) = self.resolve(el)?;
        let tag = node.value().name().to_ascii_lowercase();
        let value = match tag.as_str() {
            "input" | "textarea" | "select" => self.current_value(ordinal),
            _ => String::new(),
        };
        Ok(ElementInfo {
            tag,
            attributes: node
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: node.text().collect(),
            value,
            visible: Self::is_visible(node),
        })
    }

    async fn focus(&self, el: ElementHandle) -> Result<(), DomError> {
        let ordinal = self.ordinal(el)?;
        self.overlay.borrow_mut().focused = Some(ordinal);
        Ok(())
    }

    async fn click(&self, el: ElementHandle) -> Result<(), DomError> {
        let ordinal = self.ordinal(el)?;
        self.overlay.borrow_mut().clicks.push(ordinal);
        Ok(())
    }

    async fn set_value(&self, el: ElementHandle, value: &str) -> Result<(), DomError> {
        let ordinal = self.ordinal(el)?;
        self.overlay
            .borrow_mut()
            .values
            .insert(ordinal, value.to_string());
        Ok(())
    }

    async fn append_value(&self, el: ElementHandle, text: &str) -> Result<(), DomError> {
        let ordinal = self.ordinal(el)?;
        let mut value = self.current_value(ordinal);
        value.push_str(text);
        self.overlay.borrow_mut().values.insert(ordinal, value);
        Ok(())
    }

    async fn dispatch(&self, el: ElementHandle, event: &DomEvent) -> Result<(), DomError> {
        let ordinal = self.ordinal(el)?;
        self.push_event(ordinal, event.clone());
        Ok(())
    }

    async fn assign_files(&self, el: ElementHandle, files: &[FilePayload]) -> Result<(), DomError> {
        let ordinal = self.ordinal(el)?;
        if !self.file_assignment {
            return Err(DomError::Unsupported("file list assignment"));
        }
        self.overlay
            .borrow_mut()
            .files
            .insert(ordinal, files.to_vec());
        self.push_event(ordinal, DomEvent::Change);
        Ok(())
    }

    async fn rasterize_image(
        &self,
        _url: &str,
        _request: &RasterRequest,
    ) -> Result<Vec<u8>, DomError> {
        Err(DomError::Unsupported("image rasterization"))
    }

    async fn release_handles(&self) {
        let mut overlay = self.overlay.borrow_mut();
        overlay.generation += 1;
        overlay.handles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = r#"
        <form>
          <div class="row">
            <label for="make-id">Make</label>
            <input id="make-id" name="make" value="Old">
          </div>
          <select name="year"><option value="2021">2021</option><option selected value="2022">2022</option></select>
          <input type="hidden" name="token">
          <div style="display: none"><input name="ghost"></div>
        </form>
    "#;

    #[tokio::test]
    async fn queries_follow_document_order() {
        let doc = HtmlDocument::parse(FORM);
        let all = doc.query_all("input").await.unwrap();
        assert_eq!(all.len(), 3);
        let first = doc.describe(all[0]).await.unwrap();
        assert_eq!(first.attr("name"), Some("make"));
    }

    #[tokio::test]
    async fn within_scope_excludes_scope_itself() {
        let doc = HtmlDocument::parse(FORM);
        let row = doc.query(".row").await.unwrap().unwrap();
        assert!(doc.query_within(row, ".row").await.unwrap().is_none());
        assert!(doc.query_within(row, "input").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn values_start_from_markup() {
        let doc = HtmlDocument::parse(FORM);
        assert_eq!(doc.value_of("[name=make]").as_deref(), Some("Old"));
        assert_eq!(doc.value_of("select").as_deref(), Some("2022"));
    }

    #[tokio::test]
    async fn visibility_honours_hidden_ancestors() {
        let doc = HtmlDocument::parse(FORM);
        let ghost = doc.query("[name=ghost]").await.unwrap().unwrap();
        let token = doc.query("[name=token]").await.unwrap().unwrap();
        let make = doc.query("[name=make]").await.unwrap().unwrap();
        assert!(!doc.describe(ghost).await.unwrap().visible);
        assert!(!doc.describe(token).await.unwrap().visible);
        assert!(doc.describe(make).await.unwrap().visible);
    }

    #[tokio::test]
    async fn describe_reports_written_value() {
        let doc = HtmlDocument::parse(FORM);
        let make = doc.query("[name=make]").await.unwrap().unwrap();
        assert_eq!(doc.describe(make).await.unwrap().value, "Old");
        doc.set_value(make, "Toyota").await.unwrap();
        assert_eq!(doc.describe(make).await.unwrap().value, "Toyota");
        let row = doc.query(".row").await.unwrap().unwrap();
        assert!(doc.describe(row).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn released_handles_go_stale() {
        let doc = HtmlDocument::parse(FORM);
        let make = doc.query("[name=make]").await.unwrap().unwrap();
        doc.release_handles().await;
        let err = doc.set_value(make, "x").await.unwrap_err();
        assert!(matches!(err, DomError::StaleHandle { .. }));
    }

    #[tokio::test]
    async fn invalid_selector_is_reported() {
        let doc = HtmlDocument::parse(FORM);
        let err = doc.query("button:contains(\"x\")").await.unwrap_err();
        assert!(matches!(err, DomError::InvalidSelector(_)));
    }
}
