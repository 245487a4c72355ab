//! Layout composition
//!
//! Merges the renders of an item's slots into one response. Slots render
//! concurrently; once all of them finish, the first error in declaration
//! order becomes the item's result.

use std::sync::Arc;

use futures::future::join_all;
use log::debug;
use serde_json::{json, Map, Value};

use crate::pipeline::{safe_file_name, CallbackInstance, RenderContext};
use crate::playlist::{Layout, PlaylistItem};
use crate::template;
use crate::{Error, RenderResponse, Result, ViewType};

/// Marks the start of a fragment's inner content
pub const BODY_START: &str = "<!-- inkframe:body -->";
/// Marks the end of a fragment's inner content
pub const BODY_END: &str = "<!-- /inkframe:body -->";

/// Strip a rendered fragment's document wrapper, keeping only its inner content.
pub fn strip_document_wrapper(html: &str) -> &str {
    let start = html.find(BODY_START).map(|i| i + BODY_START.len()).unwrap_or(0);
    let inner = &html[start..];
    match inner.find(BODY_END) {
        Some(end) => &inner[..end],
        None => inner,
    }
}

fn cardinality_error(layout: Layout, got: usize) -> RenderResponse {
    let expected = match layout.slot_count() {
        1 => "exactly one callback",
        _ => "exactly two callbacks",
    };
    Error::Composition(format!("layout '{}' requires {}, got {}", layout, expected, got)).into()
}

pub struct LayoutComposer {
    context: Arc<RenderContext>,
}

impl LayoutComposer {
    pub fn new(context: Arc<RenderContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<RenderContext> {
        &self.context
    }

    /// Render `item` for `view` using one instance per slot, in slot order.
    pub async fn compose(&self, item: &PlaylistItem, instances: &[Arc<CallbackInstance>], view: ViewType) -> RenderResponse {
        if item.slots.len() != item.layout.slot_count() {
            return cardinality_error(item.layout, item.slots.len());
        }
        if instances.len() != item.slots.len() {
            return Error::Composition(format!(
                "item '{}' has {} slots but {} instances",
                item.id,
                item.slots.len(),
                instances.len()
            ))
            .into();
        }

        // non-HTML single slot: hand back the slot's own result
        if instances.len() == 1 && view != ViewType::Html {
            return instances[0].render(view, item.layout).await;
        }

        let slot_view = if view == ViewType::Json { ViewType::Json } else { ViewType::Html };
        let results = join_all(instances.iter().map(|i| i.render(slot_view, item.layout))).await;

        if let Some(err) = results.iter().find(|r| r.is_error()) {
            return err.clone();
        }

        match view {
            ViewType::Json => {
                let mut merged = Map::new();
                for (slot, result) in item.slots.iter().zip(results) {
                    if let RenderResponse::Json { json } = result {
                        merged.insert(slot.name.clone(), json);
                    }
                }
                RenderResponse::Json { json: Value::Object(merged) }
            }
            ViewType::Html => match self.wrap(item, &results).await {
                Ok(html) => RenderResponse::Html { html },
                Err(e) => e.into(),
            },
            ViewType::Png | ViewType::Bmp => {
                let html = match self.wrap(item, &results).await {
                    Ok(html) => html,
                    Err(e) => return e.into(),
                };
                let file_name = format!("{}.{}", safe_file_name(&item.id), view.extension());
                debug!("Rendering composite {} for item '{}'", file_name, item.id);
                match self.context.screenshot(html, view, &file_name).await {
                    Ok(path) => RenderResponse::Image { path },
                    Err(e) => e.into(),
                }
            }
        }
    }

    /// Inject each slot's inner HTML into the layout template under `slots.<name>`.
    async fn wrap(&self, item: &PlaylistItem, results: &[RenderResponse]) -> Result<String> {
        let mut slots = Map::new();
        for (slot, result) in item.slots.iter().zip(results) {
            let html = match result {
                RenderResponse::Html { html } => html,
                other => {
                    return Err(Error::Composition(format!(
                        "slot '{}' did not produce HTML: {:?}",
                        slot.name, other
                    )))
                }
            };
            slots.insert(slot.name.clone(), Value::String(strip_document_wrapper(html).to_string()));
        }

        let ctx = json!({
            "item": item.id,
            "layout": item.layout.as_str(),
            "screen": self.context.screen,
            "slots": slots,
        });

        let path = self.context.paths.layout(item.layout.as_str());
        template::render_file(self.context.templates.as_ref(), &path, &ctx)
            .await
            .map_err(|e| Error::Composition(format!("layout '{}': {}", item.layout, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_wrapper_markers() {
        let html = format!("<html><head></head><body>{}<p>inner</p>{}</body></html>", BODY_START, BODY_END);
        assert_eq!(strip_document_wrapper(&html), "<p>inner</p>");
    }

    #[test]
    fn missing_markers_keep_edges() {
        assert_eq!(strip_document_wrapper("<p>bare</p>"), "<p>bare</p>");
        let tail = format!("<head/>{}<p>x</p>", BODY_START);
        assert_eq!(strip_document_wrapper(&tail), "<p>x</p>");
        let head = format!("<p>x</p>{}<footer/>", BODY_END);
        assert_eq!(strip_document_wrapper(&head), "<p>x</p>");
    }

    #[test]
    fn cardinality_messages() {
        match cardinality_error(Layout::Full, 2) {
            RenderResponse::Error { message, .. } => assert!(message.contains("exactly one callback")),
            other => panic!("unexpected {:?}", other),
        }
        match cardinality_error(Layout::TwoCol, 1) {
            RenderResponse::Error { message, .. } => assert!(message.contains("exactly two callbacks")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
