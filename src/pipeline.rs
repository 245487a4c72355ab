//! Per-instance render pipeline
//!
//! A [`CallbackInstance`] binds one data source to one playlist slot. It
//! fetches data, picks the template (switching to the error template when the
//! data carries an `error` marker) and produces a [`RenderResponse`] for the
//! requested view. Image renders are cached on a fingerprint of the data: the
//! instance remembers exactly one previous fingerprint and its artifact.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, warn};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::fingerprint::{fingerprint, Fingerprint};
use crate::playlist::Layout;
use crate::renderer::{PageRequest, RendererPool};
use crate::source::{DataSource, RegisteredSource};
use crate::storage::ArtifactStore;
use crate::template::{self, TemplateEngine, TemplatePaths};
use crate::{EngineConfig, JinjaEngine, RenderResponse, Result, ScreenSize, ViewType};

/// Collaborators shared by every instance of a playlist
pub struct RenderContext {
    pub templates: Arc<dyn TemplateEngine>,
    pub paths: TemplatePaths,
    pub pool: Arc<RendererPool>,
    pub artifacts: ArtifactStore,
    pub screen: ScreenSize,
}

impl RenderContext {
    pub fn new(
        templates: Arc<dyn TemplateEngine>,
        paths: TemplatePaths,
        pool: Arc<RendererPool>,
        artifacts: ArtifactStore,
        screen: ScreenSize,
    ) -> Self {
        Self {
            templates,
            paths,
            pool,
            artifacts,
            screen,
        }
    }

    /// Build the context described by `config`, launching its backends.
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let pool = config.build_pool().await?;
        Ok(Self::new(
            Arc::new(JinjaEngine::new()),
            TemplatePaths::new(&config.templates_dir, &config.sources_dir),
            Arc::new(pool),
            ArtifactStore::new(&config.output_dir, config.max_artifacts)?,
            config.screen,
        ))
    }

    /// Screenshot `html` through the pool into the artifact store.
    pub async fn screenshot(&self, html: String, view: ViewType, file_name: &str) -> Result<PathBuf> {
        let request = PageRequest {
            html,
            size: self.screen,
            view,
            output: self.artifacts.path_for(file_name),
        };
        let page = self.pool.render_page(&request).await?;
        if let Err(e) = self.artifacts.enforce_retention().await {
            warn!("Artifact retention failed: {}", e);
        }
        Ok(page.path)
    }
}

#[derive(Debug, Clone)]
struct CachedImage {
    fingerprint: Fingerprint,
    view: ViewType,
    path: PathBuf,
}

#[derive(Debug, Default)]
struct CacheState {
    last: Option<CachedImage>,
    errored: bool,
}

/// Runtime object for one playlist item slot
pub struct CallbackInstance {
    key: String,
    source_name: String,
    source: Arc<dyn DataSource>,
    template: PathBuf,
    options: Value,
    size: ScreenSize,
    cacheable: bool,
    // held across a whole image render so one instance never renders twice concurrently
    cache: Mutex<CacheState>,
    context: Arc<RenderContext>,
}

impl CallbackInstance {
    /// Build an instance, failing fast on bad options, missing environment or
    /// a missing template.
    pub fn new(
        key: impl Into<String>,
        registered: &RegisteredSource,
        options: &Value,
        context: Arc<RenderContext>,
    ) -> Result<Self> {
        let manifest = &registered.manifest;
        manifest.check_env()?;
        let options = manifest.validate_options(options)?;
        let template = template::resolve_template(&context.paths, &manifest.name, &manifest.template)?;

        Ok(Self {
            key: key.into(),
            source_name: manifest.name.clone(),
            source: registered.source.clone(),
            template,
            options,
            size: context.screen,
            cacheable: manifest.cacheable,
            cache: Mutex::new(CacheState::default()),
            context,
        })
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn options(&self) -> &Value {
        &self.options
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Fingerprint of the last successfully rendered image, if any.
    pub async fn cached_fingerprint(&self) -> Option<Fingerprint> {
        let state = self.cache.lock().await;
        state.last.as_ref().map(|c| c.fingerprint.clone())
    }

    /// Render this instance for `view`; `layout` tells the template where it
    /// will be placed.
    pub async fn render(&self, view: ViewType, layout: Layout) -> RenderResponse {
        let data = self.fetch().await;
        let error = error_marker(&data);

        match view {
            ViewType::Json => RenderResponse::Json { json: data },
            ViewType::Html => match error {
                Some(message) => self.error_response(message, &data, layout).await,
                None => match self.render_html(&data, layout).await {
                    Ok(html) => RenderResponse::Html { html },
                    Err(e) => e.into(),
                },
            },
            ViewType::Png | ViewType::Bmp => {
                if let Some(message) = error {
                    self.cache.lock().await.errored = true;
                    return self.error_response(message, &data, layout).await;
                }
                self.render_image(data, view, layout).await
            }
        }
    }

    /// Fetch data, folding a failed fetch into `{"error": ...}`.
    async fn fetch(&self) -> Value {
        match self.source.get_data(&self.options).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Source '{}' failed for {}: {}", self.source_name, self.key, e);
                json!({ "error": e.to_string() })
            }
        }
    }

    fn context_for(&self, data: &Value, layout: Layout) -> Value {
        json!({
            "data": data,
            "options": self.options,
            "layout": layout.as_str(),
            "screen": self.size,
            "source": self.source_name,
        })
    }

    async fn render_html(&self, data: &Value, layout: Layout) -> Result<String> {
        let ctx = self.context_for(data, layout);
        template::render_file(self.context.templates.as_ref(), &self.template, &ctx).await
    }

    async fn error_response(&self, message: String, data: &Value, layout: Layout) -> RenderResponse {
        let mut ctx = self.context_for(data, layout);
        ctx["error"] = Value::String(message.clone());

        let path = self.context.paths.error_template();
        let page = if path.is_file() {
            match template::render_file(self.context.templates.as_ref(), &path, &ctx).await {
                Ok(html) => Some(html),
                Err(e) => {
                    warn!("Error template failed for {}: {}", self.key, e);
                    None
                }
            }
        } else {
            None
        };

        RenderResponse::Error {
            message: format!("{}: {}", self.source_name, message),
            page,
        }
    }

    async fn render_image(&self, data: Value, view: ViewType, layout: Layout) -> RenderResponse {
        let mut state = self.cache.lock().await;

        let fp = if self.cacheable {
            let fp = fingerprint(&data);
            if let Some(hit) = self.cache_hit(&state, &fp, view).await {
                debug!("Cache hit for {} ({})", self.key, fp);
                return RenderResponse::Image { path: hit };
            }
            debug!("Cache miss for {} ({})", self.key, fp);
            Some(fp)
        } else {
            None
        };

        let file_name = match &fp {
            Some(fp) => format!("{}-{}.{}", safe_file_name(&self.source_name), fp, view.extension()),
            None => format!("{}.{}", safe_file_name(&self.key), view.extension()),
        };

        let html = match self.render_html(&data, layout).await {
            Ok(html) => html,
            Err(e) => {
                state.errored = true;
                return e.into();
            }
        };

        match self.context.screenshot(html, view, &file_name).await {
            Ok(path) => {
                state.errored = false;
                state.last = fp.map(|fingerprint| CachedImage {
                    fingerprint,
                    view,
                    path: path.clone(),
                });
                RenderResponse::Image { path }
            }
            Err(e) => {
                state.errored = true;
                e.into()
            }
        }
    }

    async fn cache_hit(&self, state: &CacheState, fp: &Fingerprint, view: ViewType) -> Option<PathBuf> {
        if state.errored {
            return None;
        }
        let last = state.last.as_ref()?;
        if last.fingerprint != *fp || last.view != view {
            return None;
        }
        // retention may have evicted the artifact since it was produced
        if !self.context.artifacts.exists(&last.path).await {
            return None;
        }
        Some(last.path.clone())
    }
}

/// The `error` marker of a data payload, if it carries one.
fn error_marker(data: &Value) -> Option<String> {
    match data.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Replace characters that are unsafe in file names.
pub(crate) fn safe_file_name(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}
