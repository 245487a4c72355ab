//! Error types for the render engine

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single failed backend attempt inside one pool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    /// Name of the backend as configured
    pub name: String,
    /// Error message reported by the backend
    pub message: String,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Errors that can occur in the render engine
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, missing option or missing environment
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No template candidate exists for a source
    #[error("No template found for source '{source_name}' (searched: {})", display_paths(.searched))]
    TemplateNotFound {
        source_name: String,
        searched: Vec<PathBuf>,
    },

    /// Template could not be read or rendered
    #[error("Template error: {0}")]
    Template(String),

    /// A data source failed to produce data
    #[error("Data fetch failed: {0}")]
    DataFetch(String),

    /// A single renderer backend failed
    #[error("Renderer backend failed: {0}")]
    Backend(String),

    /// Every backend in the pool failed for one call
    #[error("All renderer backends failed: {}", display_failures(.0))]
    AllBackendsFailed(Vec<BackendFailure>),

    /// The pool has no backends configured
    #[error("No renderer backends configured")]
    NoBackends,

    /// Layout composition failed
    #[error("Composition failed: {0}")]
    Composition(String),

    /// Playlist item lookup failed
    #[error("Playlist item not found: {0}")]
    NotFound(String),

    /// Rotation was requested on an empty playlist
    #[error("Playlist is empty")]
    EmptyPlaylist,

    /// Image decoding or encoding failed
    #[error("Image conversion failed: {0}")]
    Image(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_failures(failures: &[BackendFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
