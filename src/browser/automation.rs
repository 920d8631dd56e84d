//! [`Document`] over a live Chrome tab. Every primitive is one evaluated
//! script; located elements are kept in a page-side registry and addressed
//! by index, so handles survive between calls without holding CDP objects.

use crate::dom::{Document, DomEvent, ElementHandle, ElementInfo, FilePayload, RasterRequest};
use crate::error::DomError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::cell::Cell;
use std::path::{Path, PathBuf};

/// Shared by every script: registry access and the stale/invalid signals.
/// The registry follows the generation passed in `args.gen`; a reload or a
/// release starts it over empty.
const PRELUDE: &str = r#"
    const reg = window.__vehicleLister || (window.__vehicleLister = { gen: args.gen, items: [] });
    if (reg.gen !== args.gen) { reg.gen = args.gen; reg.items = []; }
    const put = (el) => { reg.items.push(el); return reg.items.length - 1; };
    const get = (h) => {
        if (reg.gen !== h.gen) throw { stale: [h.gen, reg.gen] };
        const el = reg.items[h.index];
        if (!el || !el.isConnected) throw { stale: [h.gen, reg.gen] };
        return el;
    };
    const select = (root, selector) => {
        try { return Array.from(root.querySelectorAll(selector)); }
        catch (e) { throw { invalid: selector }; }
    };
    const isControl = (el) => el.isContentEditable
        || el instanceof HTMLInputElement
        || el instanceof HTMLTextAreaElement
        || el instanceof HTMLSelectElement;
    const describe = (el) => {
        const attributes = {};
        for (const a of el.attributes) attributes[a.name] = a.value;
        const style = window.getComputedStyle(el);
        const boxed = !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
        return {
            tag: el.tagName.toLowerCase(),
            attributes,
            text: el.isContentEditable ? el.innerText : (el.textContent || ''),
            value: isControl(el) ? readValue(el) : '',
            visible: boxed && style.visibility !== 'hidden' && style.display !== 'none',
        };
    };
    const valueSetter = (el) => {
        const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
            : el instanceof HTMLSelectElement ? HTMLSelectElement.prototype
            : HTMLInputElement.prototype;
        const desc = Object.getOwnPropertyDescriptor(proto, 'value');
        return desc && desc.set;
    };
    const writeValue = (el, value) => {
        if (el.isContentEditable) { el.textContent = value; return; }
        const setter = valueSetter(el);
        if (setter) setter.call(el, value); else el.value = value;
    };
    const readValue = (el) => el.isContentEditable ? (el.textContent || '') : (el.value || '');
    const fire = (el, ev) => {
        switch (ev.kind) {
            case 'keydown': case 'keypress': case 'keyup':
                el.dispatchEvent(new KeyboardEvent(ev.kind, {
                    key: ev.key, keyCode: ev.key_code, which: ev.key_code,
                    bubbles: true, cancelable: true,
                }));
                break;
            case 'input':
                el.dispatchEvent(new Event('input', { bubbles: true }));
                break;
            case 'change':
                el.dispatchEvent(new Event('change', { bubbles: true }));
                break;
            case 'blur':
                el.dispatchEvent(new FocusEvent('blur'));
                el.blur();
                break;
        }
    };
"#;

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    ok: Option<Value>,
    #[serde(default)]
    err: Option<String>,
    #[serde(default)]
    stale: Option<(u32, u32)>,
    #[serde(default)]
    invalid: Option<String>,
}

fn script(body: &str, args: &Value) -> String {
    format!(
        r#"(async () => {{
    const args = {args};
    {PRELUDE}
    try {{
        const value = await (async () => {{ {body} }})();
        return {{ ok: value === undefined ? null : value }};
    }} catch (e) {{
        if (e && e.stale) return {{ stale: e.stale }};
        if (e && e.invalid) return {{ invalid: e.invalid }};
        return {{ err: String((e && e.message) || e) }};
    }}
}})()"#,
        args = args,
        PRELUDE = PRELUDE,
        body = body
    )
}

/// Empty `dir`, creating it when missing. Files from the previous
/// assignment are no longer referenced once a new one starts.
async fn reset_dir(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await
}

pub struct CdpDocument {
    page: Page,
    generation: Cell<u32>,
    spill_dir: PathBuf,
}

impl CdpDocument {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            generation: Cell::new(0),
            spill_dir: std::env::temp_dir().join("vehicle-lister"),
        }
    }

    fn check(&self, el: ElementHandle) -> Result<(), DomError> {
        let current = self.generation.get();
        if el.generation() != current {
            return Err(DomError::StaleHandle {
                handle_generation: el.generation(),
                current_generation: current,
            });
        }
        Ok(())
    }

    fn handles(&self, indices: Vec<u32>) -> Vec<ElementHandle> {
        let generation = self.generation.get();
        indices
            .into_iter()
            .map(|i| ElementHandle::new(generation, i))
            .collect()
    }

    async fn run<T: DeserializeOwned>(&self, body: &str, mut args: Value) -> Result<T, DomError> {
        args["gen"] = json!(self.generation.get());
        let mut params = EvaluateParams::new(script(body, &args));
        params.await_promise = Some(true);
        params.return_by_value = Some(true);

        let response = self
            .page
            .execute(params)
            .await
            .map_err(|e| DomError::Protocol(e.to_string()))?;
        if let Some(details) = &response.result.exception_details {
            return Err(DomError::Script(details.text.clone()));
        }
        let raw = response.result.result.value.clone().unwrap_or(Value::Null);
        let reply: Reply =
            serde_json::from_value(raw).map_err(|e| DomError::Script(e.to_string()))?;

        if let Some((handle_generation, current_generation)) = reply.stale {
            return Err(DomError::StaleHandle {
                handle_generation,
                current_generation,
            });
        }
        if let Some(selector) = reply.invalid {
            return Err(DomError::InvalidSelector(selector));
        }
        if let Some(err) = reply.err {
            return Err(DomError::Script(err));
        }
        serde_json::from_value(reply.ok.unwrap_or(Value::Null))
            .map_err(|e| DomError::Script(e.to_string()))
    }

    async fn run_on<T: DeserializeOwned>(
        &self,
        el: ElementHandle,
        body: &str,
        mut args: Value,
    ) -> Result<T, DomError> {
        self.check(el)?;
        args["el"] = json!(el);
        self.run(body, args).await
    }

    async fn assign_with_data_transfer(
        &self,
        el: ElementHandle,
        files: &[FilePayload],
    ) -> Result<(), DomError> {
        let encoded: Vec<Value> = files
            .iter()
            .map(|f| json!({ "name": f.name, "mime": f.mime, "data": BASE64.encode(&f.bytes) }))
            .collect();
        let count: usize = self
            .run_on(
                el,
                r#"
                const el = get(args.el);
                const dt = new DataTransfer();
                for (const f of args.files) {
                    const bin = atob(f.data);
                    const bytes = new Uint8Array(bin.length);
                    for (let i = 0; i < bin.length; i++) bytes[i] = bin.charCodeAt(i);
                    dt.items.add(new File([bytes], f.name, { type: f.mime }));
                }
                el.files = dt.files;
                el.dispatchEvent(new Event('change', { bubbles: true }));
                el.dispatchEvent(new Event('input', { bubbles: true }));
                return el.files ? el.files.length : 0;
                "#,
                json!({ "files": encoded }),
            )
            .await?;
        if count != files.len() {
            return Err(DomError::Script(format!(
                "file list holds {} of {} files",
                count,
                files.len()
            )));
        }
        Ok(())
    }

    /// Write the payloads to disk and let the browser read them through
    /// `DOM.setFileInputFiles`.
    async fn assign_with_protocol(
        &self,
        el: ElementHandle,
        files: &[FilePayload],
    ) -> Result<(), DomError> {
        self.check(el)?;
        reset_dir(&self.spill_dir)
            .await
            .map_err(|e| DomError::Protocol(e.to_string()))?;
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            let path = self.spill_dir.join(&file.name);
            tokio::fs::write(&path, &file.bytes)
                .await
                .map_err(|e| DomError::Protocol(e.to_string()))?;
            paths.push(path.to_string_lossy().into_owned());
        }

        let lookup = format!(
            "(window.__vehicleLister && window.__vehicleLister.gen === {} ? window.__vehicleLister.items[{}] : null)",
            el.generation(),
            el.index()
        );
        let response = self
            .page
            .execute(EvaluateParams::new(lookup))
            .await
            .map_err(|e| DomError::Protocol(e.to_string()))?;
        let Some(object_id) = response.result.result.object_id.clone() else {
            return Err(DomError::StaleHandle {
                handle_generation: el.generation(),
                current_generation: self.generation.get(),
            });
        };

        let mut set_files = SetFileInputFilesParams::new(paths);
        set_files.object_id = Some(object_id);
        self.page
            .execute(set_files)
            .await
            .map_err(|e| DomError::Protocol(e.to_string()))?;
        info!("[cdp] set {} files via DOM.setFileInputFiles", files.len());

        self.dispatch(el, &DomEvent::Change).await
    }
}

#[async_trait(?Send)]
impl Document for CdpDocument {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, DomError> {
        let indices: Vec<u32> = self
            .run(
                "return select(document, args.selector).map(put);",
                json!({ "selector": selector }),
            )
            .await?;
        Ok(self.handles(indices))
    }

    async fn query_all_within(
        &self,
        scope: ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DomError> {
        self.check(scope)?;
        let indices: Vec<u32> = self
            .run(
                "return select(get(args.scope), args.selector).map(put);",
                json!({ "scope": scope, "selector": selector }),
            )
            .await?;
        Ok(self.handles(indices))
    }

    async fn element_by_id(&self, id: &str) -> Result<Option<ElementHandle>, DomError> {
        let index: Option<u32> = self
            .run(
                "const el = document.getElementById(args.id); return el ? put(el) : null;",
                json!({ "id": id }),
            )
            .await?;
        Ok(index.and_then(|i| self.handles(vec![i]).pop()))
    }

    async fn parent(&self, el: ElementHandle) -> Result<Option<ElementHandle>, DomError> {
        let index: Option<u32> = self
            .run_on(
                el,
                "const p = get(args.el).parentElement; return p ? put(p) : null;",
                json!({}),
            )
            .await?;
        Ok(index.and_then(|i| self.handles(vec![i]).pop()))
    }

    async fn next_sibling(&self, el: ElementHandle) -> Result<Option<ElementHandle>, DomError> {
        let index: Option<u32> = self
            .run_on(
                el,
                "const s = get(args.el).nextElementSibling; return s ? put(s) : null;",
                json!({}),
            )
            .await?;
        Ok(index.and_then(|i| self.handles(vec![i]).pop()))
    }

    async fn describe(&self, el: ElementHandle) -> Result<ElementInfo, DomError> {
        self.run_on(el, "return describe(get(args.el));", json!({}))
            .await
    }

    async fn describe_all(&self, els: &[ElementHandle]) -> Result<Vec<ElementInfo>, DomError> {
        for el in els {
            self.check(*el)?;
        }
        self.run(
            "return args.els.map((h) => describe(get(h)));",
            json!({ "els": els }),
        )
        .await
    }

    async fn attribute_all(
        &self,
        els: &[ElementHandle],
        name: &str,
    ) -> Result<Vec<Option<String>>, DomError> {
        for el in els {
            self.check(*el)?;
        }
        self.run(
            "return args.els.map((h) => get(h).getAttribute(args.name));",
            json!({ "els": els, "name": name }),
        )
        .await
    }

    async fn focus(&self, el: ElementHandle) -> Result<(), DomError> {
        self.run_on(
            el,
            "const el = get(args.el); el.scrollIntoView({ block: 'center' }); el.focus();",
            json!({}),
        )
        .await
    }

    async fn click(&self, el: ElementHandle) -> Result<(), DomError> {
        self.run_on(
            el,
            r#"
            const el = get(args.el);
            el.scrollIntoView({ block: 'center' });
            for (const type of ['mousedown', 'mouseup']) {
                el.dispatchEvent(new MouseEvent(type, { bubbles: true, cancelable: true, view: window }));
            }
            el.click();
            "#,
            json!({}),
        )
        .await
    }

    async fn set_value(&self, el: ElementHandle, value: &str) -> Result<(), DomError> {
        self.run_on(
            el,
            "writeValue(get(args.el), args.value);",
            json!({ "value": value }),
        )
        .await
    }

    async fn append_value(&self, el: ElementHandle, text: &str) -> Result<(), DomError> {
        self.run_on(
            el,
            "const el = get(args.el); writeValue(el, readValue(el) + args.text);",
            json!({ "text": text }),
        )
        .await
    }

    async fn dispatch(&self, el: ElementHandle, event: &DomEvent) -> Result<(), DomError> {
        self.run_on(el, "fire(get(args.el), args.event);", json!({ "event": event }))
            .await
    }

    async fn type_character(&self, el: ElementHandle, ch: char) -> Result<(), DomError> {
        self.run_on(
            el,
            r#"
            const el = get(args.el);
            fire(el, args.down);
            fire(el, args.press);
            writeValue(el, readValue(el) + args.ch);
            fire(el, args.up);
            "#,
            json!({
                "down": DomEvent::key_down(ch),
                "press": DomEvent::key_press(ch),
                "up": DomEvent::key_up(ch),
                "ch": ch.to_string(),
            }),
        )
        .await
    }

    async fn assign_files(&self, el: ElementHandle, files: &[FilePayload]) -> Result<(), DomError> {
        match self.assign_with_data_transfer(el, files).await {
            Ok(()) => return Ok(()),
            Err(e @ DomError::StaleHandle { .. }) => return Err(e),
            Err(e) => debug!("[cdp] DataTransfer assignment failed: {}", e),
        }
        match self.assign_with_protocol(el, files).await {
            Ok(()) => Ok(()),
            Err(e @ DomError::StaleHandle { .. }) => Err(e),
            Err(e) => {
                warn!("[cdp] DOM.setFileInputFiles failed: {}", e);
                Err(DomError::Unsupported("file list assignment"))
            }
        }
    }

    async fn rasterize_image(
        &self,
        url: &str,
        request: &RasterRequest,
    ) -> Result<Vec<u8>, DomError> {
        let encoded: String = self
            .run(
                r#"
                const img = new Image();
                img.crossOrigin = 'anonymous';
                await new Promise((resolve, reject) => {
                    const timer = setTimeout(() => reject(new Error('image load timed out')), args.timeout_ms);
                    img.onload = () => { clearTimeout(timer); resolve(); };
                    img.onerror = () => { clearTimeout(timer); reject(new Error('image failed to load')); };
                    img.src = args.url;
                });
                const canvas = document.createElement('canvas');
                canvas.width = img.naturalWidth || args.fallback_width;
                canvas.height = img.naturalHeight || args.fallback_height;
                canvas.getContext('2d').drawImage(img, 0, 0, canvas.width, canvas.height);
                const data = canvas.toDataURL('image/jpeg', args.quality);
                return data.slice(data.indexOf(',') + 1);
                "#,
                json!({
                    "url": url,
                    "quality": request.quality,
                    "fallback_width": request.fallback_width,
                    "fallback_height": request.fallback_height,
                    "timeout_ms": request.timeout.as_millis() as u64,
                }),
            )
            .await?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| DomError::Script(format!("canvas export was not base64: {}", e)))
    }

    async fn release_handles(&self) {
        let next = self.generation.get().wrapping_add(1);
        self.generation.set(next);
        let result: Result<Value, DomError> = self.run("return reg.items.length;", json!({})).await;
        if let Err(e) = result {
            warn!("[cdp] could not reset element registry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_embeds_args_and_body() {
        let js = script("return args.selector;", &json!({ "selector": "input" }));
        assert!(js.starts_with("(async () => {"));
        assert!(js.contains(r#"const args = {"selector":"input"};"#));
        assert!(js.contains("return args.selector;"));
        assert!(js.contains("window.__vehicleLister"));
        assert!(js.contains("value: isControl(el) ? readValue(el) : ''"));
    }

    #[tokio::test]
    async fn spill_dir_is_emptied_before_reuse() {
        let dir = std::env::temp_dir().join(format!("vehicle-lister-spill-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("vehicle_image_1_1.jpg"), b"old").await.unwrap();

        reset_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
        assert!(std::fs::read_dir(&dir).unwrap().next().is_none());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
        reset_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn reply_shapes_parse() {
        let stale: Reply = serde_json::from_value(json!({ "stale": [1, 2] })).unwrap();
        assert_eq!(stale.stale, Some((1, 2)));
        let ok: Reply = serde_json::from_value(json!({ "ok": [0, 1] })).unwrap();
        assert_eq!(ok.ok, Some(json!([0, 1])));
    }
}
