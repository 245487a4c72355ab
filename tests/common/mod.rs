//! Shared fixtures: a scratch template tree, a counting backend and a few
//! scripted data sources.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use inkframe::renderer::pool::NamedBackend;
use inkframe::source::{ConfigField, FieldKind, StaticSource};
use inkframe::storage::ArtifactStore;
use inkframe::template::TemplatePaths;
use inkframe::{
    DataSource, Error, PageRequest, JinjaEngine, RenderContext, RenderedPage, RendererBackend, RendererPool,
    Result, ScreenSize, SourceManifest, SourceRegistry,
};
use serde_json::Value;
use tempfile::TempDir;

pub const GENERIC: &str =
    r#"<html><body><!-- inkframe:body --><div class="{{ source }}">{{ data.text }}</div><!-- /inkframe:body --></body></html>"#;
pub const ERROR: &str =
    r#"<html><body><!-- inkframe:body --><p class="error">{{ error }}</p><!-- /inkframe:body --></body></html>"#;
pub const FULL_LAYOUT: &str = r#"<main class="full">{{ slots.main|safe }}</main>"#;
pub const TWO_COL_LAYOUT: &str = r#"<main class="two"><div class="l">{{ slots.left|safe }}</div><div class="r">{{ slots.right|safe }}</div></main>"#;

/// Counts calls and writes a placeholder artifact.
pub struct CountingBackend {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl CountingBackend {
    pub fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RendererBackend for CountingBackend {
    fn render_page<'a>(&'a self, request: &'a PageRequest) -> BoxFuture<'a, Result<RenderedPage>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Backend("screenshot service unavailable".into()));
            }
            let buffer = request.html.as_bytes().to_vec();
            tokio::fs::write(&request.output, &buffer).await?;
            Ok(RenderedPage {
                path: request.output.clone(),
                buffer,
            })
        })
    }
}

/// Returns whatever value the test last stored.
pub struct ScriptedSource {
    pub data: Mutex<Value>,
    pub fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(data: Value) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(data),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, data: Value) {
        *self.data.lock().unwrap() = data;
    }
}

impl DataSource for ScriptedSource {
    fn get_data<'a>(&'a self, _config: &'a Value) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.data.lock().unwrap().clone())
        })
    }
}

/// Always fails to fetch.
pub struct FailingSource;

impl DataSource for FailingSource {
    fn get_data<'a>(&'a self, _config: &'a Value) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async { Err(Error::DataFetch("upstream timed out".into())) })
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub backend: Arc<CountingBackend>,
    pub context: Arc<RenderContext>,
}

fn write(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

/// Template tree with generic, error and both layout templates.
pub fn fixture() -> Fixture {
    fixture_with(CountingBackend::new(false), 0)
}

pub fn fixture_with(backend: Arc<CountingBackend>, max_artifacts: usize) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let paths = TemplatePaths::new(dir.path().join("templates"), dir.path().join("sources"));
    write(&paths.global("generic"), GENERIC);
    write(&paths.error_template(), ERROR);
    write(&paths.layout("full"), FULL_LAYOUT);
    write(&paths.layout("2-col"), TWO_COL_LAYOUT);
    std::fs::create_dir_all(&paths.sources_dir).unwrap();

    let pool = RendererPool::new(vec![NamedBackend {
        name: "counting".into(),
        backend: backend.clone(),
    }]);
    let artifacts = ArtifactStore::new(dir.path().join("output"), max_artifacts).unwrap();
    let context = Arc::new(RenderContext::new(
        Arc::new(JinjaEngine::new()),
        paths,
        Arc::new(pool),
        artifacts,
        ScreenSize::default(),
    ));

    Fixture { dir, backend, context }
}

/// Registry with `static`, a cacheable `weather` and a non-cacheable `clock`
/// backed by the given scripted sources, and an always-failing `broken`.
pub fn registry(weather: Arc<ScriptedSource>, clock: Arc<ScriptedSource>) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register(StaticSource::manifest(), Arc::new(StaticSource));
    registry.register(
        SourceManifest::new("weather").field(ConfigField::optional("city", FieldKind::String, Some("Oslo".into()))),
        weather,
    );
    registry.register(SourceManifest::new("clock").cacheable(false), clock);
    registry.register(SourceManifest::new("broken"), Arc::new(FailingSource));
    registry
}

pub fn default_registry() -> SourceRegistry {
    registry(
        ScriptedSource::new(serde_json::json!({"text": "sunny"})),
        ScriptedSource::new(serde_json::json!({"text": "12:00"})),
    )
}
