//! Inkframe render engine
//!
//! Rotates through a playlist of content sources, renders each one into a
//! displayable artifact (JSON, HTML, or a screenshot sized for an e-paper
//! panel) and hands the current artifact back to the caller.
//!
//! # Features
//!
//! - **Playlist rotation**: `tick` advances through the playlist, `render_by_id` bypasses it
//! - **Render caching**: screenshots are content-addressed, unchanged data skips the backend
//! - **Layouts**: one or two slots composed into a single document
//! - **Backend pool**: round-robin with failover across local Chrome (`cdp`) and remote APIs (`remote`)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use inkframe::{EngineConfig, Playlist, RenderContext, SourceRegistry, ViewType};
//!
//! # async fn run() -> inkframe::Result<()> {
//! let config = EngineConfig::default();
//! let context = Arc::new(RenderContext::from_config(&config).await?);
//! let registry = Arc::new(SourceRegistry::with_builtin_sources());
//!
//! let items = inkframe::playlist::load_playlist("playlist.json")?;
//! let playlist = Playlist::new(context, registry);
//! playlist.register_instances(items)?;
//!
//! let response = playlist.tick(ViewType::Png).await;
//! println!("{:?}", response);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{BackendFailure, Error, Result};

pub mod composer;
pub mod config;
pub mod fingerprint;
pub mod pipeline;
pub mod playlist;
pub mod renderer;
pub mod source;
pub mod storage;
pub mod template;

pub use composer::LayoutComposer;
pub use config::{BackendConfig, EngineConfig};
pub use pipeline::{CallbackInstance, RenderContext};
pub use playlist::{Layout, Playlist, PlaylistItem, SlotConfig};
pub use renderer::{PageRequest, RenderedPage, RendererBackend, RendererPool};
pub use source::{DataSource, SourceManifest, SourceRegistry};
pub use template::{JinjaEngine, TemplateEngine};

/// Output kind requested by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    Png,
    Bmp,
    Html,
    Json,
}

impl ViewType {
    /// Whether this view produces a raster artifact
    pub fn is_image(self) -> bool {
        matches!(self, ViewType::Png | ViewType::Bmp)
    }

    /// File extension used for artifacts of this view
    pub fn extension(self) -> &'static str {
        match self {
            ViewType::Png => "png",
            ViewType::Bmp => "bmp",
            ViewType::Html => "html",
            ViewType::Json => "json",
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ViewType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ViewType::Png),
            "bmp" => Ok(ViewType::Bmp),
            "html" => Ok(ViewType::Html),
            "json" => Ok(ViewType::Json),
            other => Err(Error::Config(format!("unknown view type '{}'", other))),
        }
    }
}

/// Screenshot dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenSize {
    /// The common 7.5" e-paper panel resolution
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
        }
    }
}

/// Result of any render operation
///
/// Every render in the engine produces exactly one of these variants; failures
/// below the caller boundary are reported as `Error` rather than returned as
/// `Err`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RenderResponse {
    /// Path to a rendered image artifact
    Image { path: PathBuf },
    /// Rendered markup
    Html { html: String },
    /// Raw data payload
    Json { json: serde_json::Value },
    /// Render failure or error payload from a data source
    Error {
        message: String,
        /// Rendered error template, when one is available
        #[serde(skip_serializing_if = "Option::is_none")]
        page: Option<String>,
    },
}

impl RenderResponse {
    /// Build an error response without a rendered page
    pub fn error(message: impl Into<String>) -> Self {
        RenderResponse::Error {
            message: message.into(),
            page: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RenderResponse::Error { .. })
    }
}

impl From<Error> for RenderResponse {
    fn from(err: Error) -> Self {
        RenderResponse::error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_screen_size() {
        let size = ScreenSize::default();
        assert_eq!(size.width, 800);
        assert_eq!(size.height, 480);
    }

    #[test]
    fn test_view_type_parsing() {
        assert_eq!("PNG".parse::<ViewType>().unwrap(), ViewType::Png);
        assert_eq!("json".parse::<ViewType>().unwrap(), ViewType::Json);
        assert!("gif".parse::<ViewType>().is_err());
        assert!(ViewType::Bmp.is_image());
        assert!(!ViewType::Html.is_image());
    }

    #[test]
    fn test_response_serializes_tagged() {
        let resp = RenderResponse::Html { html: "<p>hi</p>".into() };
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["type"], "html");
        assert_eq!(v["html"], "<p>hi</p>");

        let err = RenderResponse::error("boom");
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["type"], "error");
        assert!(v.get("page").is_none());
    }
}
