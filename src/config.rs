//! Engine configuration

use std::path::{Path, PathBuf};
#[cfg(any(feature = "cdp", feature = "remote"))]
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::renderer::RendererPool;
use crate::{Error, Result, ScreenSize};

/// Configuration for the render engine
///
/// Loaded from a JSON file; every field has a default so a partial file is
/// enough.
///
/// # Examples
///
/// ```
/// let cfg = inkframe::EngineConfig::default();
/// assert_eq!(cfg.screen.width, 800);
/// assert!(cfg.backends.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global templates, including `error.html`, `generic.html` and `layouts/`
    pub templates_dir: PathBuf,
    /// Per-source directories that may hold a co-located `template.html`
    pub sources_dir: PathBuf,
    /// Where generated images are written
    pub output_dir: PathBuf,
    /// Maximum number of images kept in `output_dir` (0 keeps everything)
    pub max_artifacts: usize,
    /// Screenshot size
    pub screen: ScreenSize,
    /// Screenshot backends in rotation order
    pub backends: Vec<BackendConfig>,
    /// Default log filter for the binary
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            sources_dir: PathBuf::from("sources"),
            output_dir: PathBuf::from("output"),
            max_artifacts: 100,
            screen: ScreenSize::default(),
            backends: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

/// One screenshot backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Locally launched headless Chrome
    Chrome { name: String },
    /// Remote screenshot API
    Remote {
        name: String,
        endpoint: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl BackendConfig {
    pub fn name(&self) -> &str {
        match self {
            BackendConfig::Chrome { name } | BackendConfig::Remote { name, .. } => name,
        }
    }
}

impl EngineConfig {
    /// Read a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: EngineConfig = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.screen.width == 0 || self.screen.height == 0 {
            return Err(Error::Config("screen size must be non-zero".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for b in &self.backends {
            if !seen.insert(b.name()) {
                return Err(Error::Config(format!("duplicate backend name '{}'", b.name())));
            }
        }
        Ok(())
    }

    /// Instantiate every configured backend, in order.
    pub async fn build_pool(&self) -> Result<RendererPool> {
        let mut pool = RendererPool::new(Vec::new());
        for backend in &self.backends {
            pool = match backend {
                #[cfg(feature = "cdp")]
                BackendConfig::Chrome { name } => {
                    let chrome = crate::renderer::cdp::ChromeBackend::launch(self.screen).await?;
                    pool.with_backend(name.clone(), Arc::new(chrome))
                }
                #[cfg(feature = "remote")]
                BackendConfig::Remote {
                    name,
                    endpoint,
                    token,
                    timeout_ms,
                } => {
                    let remote = crate::renderer::remote::RemoteBackend::new(
                        endpoint.clone(),
                        resolve_token(token.as_deref()),
                        *timeout_ms,
                    )?;
                    pool.with_backend(name.clone(), Arc::new(remote))
                }
                #[allow(unreachable_patterns)]
                other => {
                    return Err(Error::Config(format!(
                        "backend '{}' needs a feature this build was compiled without",
                        other.name()
                    )))
                }
            };
        }
        info!("Renderer pool ready with backends {:?}", pool.backend_names());
        Ok(pool)
    }
}

/// Tokens written as `$NAME` are read from the environment.
#[cfg(feature = "remote")]
fn resolve_token(token: Option<&str>) -> Option<String> {
    match token {
        Some(t) if t.starts_with('$') => std::env::var(&t[1..]).ok(),
        Some(t) => Some(t.to_string()),
        None => None,
    }
}
