//! Template lookup and rendering
//!
//! The engine treats templating as an opaque capability behind the
//! [`TemplateEngine`] trait. [`JinjaEngine`] is the built-in implementation.

use std::path::{Path, PathBuf};

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde_json::Value;

use crate::{Error, Result};

/// File name of a template co-located with its source
pub const COLOCATED_TEMPLATE: &str = "template.html";
/// Global template used when a source has no template of its own
pub const GENERIC_TEMPLATE: &str = "generic";
/// Global template used when a source returns error data
pub const ERROR_TEMPLATE: &str = "error";

/// Renders template text against a JSON context
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, context: &Value) -> Result<String>;
}

/// Directory roots searched for templates
#[derive(Debug, Clone)]
pub struct TemplatePaths {
    /// Global templates and `layouts/`
    pub templates_dir: PathBuf,
    /// One directory per source, optionally holding `template.html`
    pub sources_dir: PathBuf,
}

impl TemplatePaths {
    pub fn new(templates_dir: impl Into<PathBuf>, sources_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            sources_dir: sources_dir.into(),
        }
    }

    /// Candidate paths for a source, in priority order.
    pub fn candidates(&self, source: &str, template_name: &str) -> Vec<PathBuf> {
        vec![
            self.sources_dir.join(source).join(COLOCATED_TEMPLATE),
            self.global(template_name),
            self.global(GENERIC_TEMPLATE),
        ]
    }

    pub fn global(&self, name: &str) -> PathBuf {
        self.templates_dir.join(format!("{}.html", name))
    }

    pub fn error_template(&self) -> PathBuf {
        self.global(ERROR_TEMPLATE)
    }

    pub fn layout(&self, layout: &str) -> PathBuf {
        self.templates_dir.join("layouts").join(format!("{}.html", layout))
    }
}

fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|p| p.is_file())
}

/// Resolve the template for `source`, failing if no candidate exists.
pub fn resolve_template(paths: &TemplatePaths, source: &str, template_name: &str) -> Result<PathBuf> {
    let candidates = paths.candidates(source, template_name);
    match first_existing(candidates.clone()) {
        Some(path) => Ok(path),
        None => Err(Error::TemplateNotFound {
            source_name: source.to_string(),
            searched: candidates,
        }),
    }
}

/// Read a template file and render it.
pub async fn render_file(engine: &dyn TemplateEngine, path: &Path, context: &Value) -> Result<String> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Template(format!("failed to read {}: {}", path.display(), e)))?;
    engine.render(&text, context)
}

/// MiniJinja-backed engine
///
/// Output is HTML auto-escaped; `{{ fragment|safe }}` inserts markup verbatim.
/// Undefined lookups, including chained ones such as `{{ data.missing.key }}`,
/// render as empty text.
pub struct JinjaEngine {
    env: Environment<'static>,
}

impl JinjaEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        Self { env }
    }
}

impl Default for JinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for JinjaEngine {
    fn render(&self, template: &str, context: &Value) -> Result<String> {
        self.env
            .render_str(template, context)
            .map_err(|e| Error::Template(e.to_string()))
    }
}
