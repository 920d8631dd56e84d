use crate::engine::status::{Severity, StatusReporter};
use async_trait::async_trait;
use chromiumoxide::page::Page;
use log::warn;
use serde_json::json;

const OVERLAY_ID: &str = "vehicle-lister-status";

pub fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "#4285f4",
        Severity::Success => "#0f9d58",
        Severity::Warning => "#f4b400",
        Severity::Error => "#db4437",
    }
}

/// A single fixed-position banner in the page. Each report replaces the
/// previous one.
pub struct OverlayReporter {
    page: Page,
    dismiss_ms: u64,
}

impl OverlayReporter {
    pub fn new(page: Page, dismiss_ms: u64) -> Self {
        Self { page, dismiss_ms }
    }

    fn render_script(&self, message: &str, severity: Severity) -> String {
        let dismiss_ms = if severity.persists() { 0 } else { self.dismiss_ms };
        let args = json!({
            "id": OVERLAY_ID,
            "message": message,
            "color": severity_color(severity),
            "dismissMs": dismiss_ms,
        });
        format!(
            r#"
        (function(args) {{
            let el = document.getElementById(args.id);
            if (!el) {{
                el = document.createElement('div');
                el.id = args.id;
                document.body.appendChild(el);
            }}
            el.style.cssText = 'position:fixed;top:16px;right:16px;z-index:2147483647;max-width:360px;'
                + 'padding:12px 16px;border-radius:6px;color:#fff;font:14px/1.4 sans-serif;'
                + 'box-shadow:0 2px 8px rgba(0,0,0,.3);background:' + args.color + ';';
            el.textContent = args.message;
            const token = String(Date.now()) + Math.random();
            el.dataset.token = token;
            if (args.dismissMs > 0) {{
                setTimeout(() => {{
                    if (el.dataset.token === token) el.remove();
                }}, args.dismissMs);
            }}
            return true;
        }})({})
    "#,
            args
        )
    }
}

#[async_trait(?Send)]
impl StatusReporter for OverlayReporter {
    async fn report(&self, message: &str, severity: Severity) {
        log::info!("[status] {:?}: {}", severity, message);
        if let Err(e) = self.page.evaluate(self.render_script(message, severity)).await {
            warn!("[status] could not render overlay: {}", e);
        }
    }
}
