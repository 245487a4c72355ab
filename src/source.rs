//! Data sources and their manifests
//!
//! A data source is an external collaborator that produces a JSON payload
//! for its configured options. The engine only knows each source through its
//! [`SourceManifest`]: which template it prefers, whether its screenshots can
//! be cached, which options it expects and which environment it requires.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Produces the data a template is rendered with.
///
/// A source may signal a soft failure by returning an object with an `error`
/// key; an `Err` is converted to the same shape by the pipeline.
pub trait DataSource: Send + Sync {
    fn get_data<'a>(&'a self, config: &'a Value) -> BoxFuture<'a, Result<Value>>;
}

/// Expected type of an option value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Any,
}

impl FieldKind {
    fn accepts(self, v: &Value) -> bool {
        match self {
            FieldKind::String => v.is_string(),
            FieldKind::Number => v.is_number(),
            FieldKind::Bool => v.is_boolean(),
            FieldKind::Any => true,
        }
    }
}

/// One option a source expects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigField {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_kind() -> FieldKind {
    FieldKind::Any
}

impl ConfigField {
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: FieldKind, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default,
        }
    }
}

/// Static description of a source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceManifest {
    pub name: String,
    /// Name of the global template to use when none is co-located
    pub template: String,
    /// Whether screenshots of identical data may be reused
    #[serde(default = "default_cacheable")]
    pub cacheable: bool,
    #[serde(default)]
    pub fields: Vec<ConfigField>,
    /// Environment variables that must be set for this source to work
    #[serde(default)]
    pub required_env: Vec<String>,
}

fn default_cacheable() -> bool {
    true
}

impl SourceManifest {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            template: name.clone(),
            name,
            cacheable: true,
            fields: Vec::new(),
            required_env: Vec::new(),
        }
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    pub fn field(mut self, field: ConfigField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn require_env(mut self, var: impl Into<String>) -> Self {
        self.required_env.push(var.into());
        self
    }

    /// Validate options against the declared fields and fill in defaults.
    pub fn validate_options(&self, options: &Value) -> Result<Value> {
        let mut map = match options {
            Value::Null => Map::new(),
            Value::Object(m) => m.clone(),
            other => {
                return Err(Error::Config(format!(
                    "options for source '{}' must be an object, got {}",
                    self.name, other
                )))
            }
        };

        for field in &self.fields {
            match map.get(&field.name) {
                Some(v) if !field.kind.accepts(v) => {
                    return Err(Error::Config(format!(
                        "option '{}' of source '{}' must be {:?}, got {}",
                        field.name, self.name, field.kind, v
                    )));
                }
                Some(_) => {}
                None => match &field.default {
                    Some(d) => {
                        map.insert(field.name.clone(), d.clone());
                    }
                    None if field.required => {
                        return Err(Error::Config(format!(
                            "missing required option '{}' for source '{}'",
                            field.name, self.name
                        )));
                    }
                    None => {}
                },
            }
        }

        Ok(Value::Object(map))
    }

    /// Ensure every required environment variable is set and non-empty.
    pub fn check_env(&self) -> Result<()> {
        for var in &self.required_env {
            match std::env::var(var) {
                Ok(v) if !v.trim().is_empty() => {}
                _ => {
                    return Err(Error::Config(format!(
                        "source '{}' requires environment variable {}",
                        self.name, var
                    )))
                }
            }
        }
        Ok(())
    }
}

/// A manifest together with its implementation
#[derive(Clone)]
pub struct RegisteredSource {
    pub manifest: SourceManifest,
    pub source: Arc<dyn DataSource>,
}

/// Lookup table of available sources
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, RegisteredSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry containing the sources shipped with the crate.
    pub fn with_builtin_sources() -> Self {
        let mut registry = Self::new();
        registry.register(StaticSource::manifest(), Arc::new(StaticSource));
        registry
    }

    /// Add or replace a source.
    pub fn register(&mut self, manifest: SourceManifest, source: Arc<dyn DataSource>) {
        self.sources
            .insert(manifest.name.clone(), RegisteredSource { manifest, source });
    }

    pub fn get(&self, name: &str) -> Result<&RegisteredSource> {
        self.sources
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown source '{}'", name)))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Returns its `payload` option unchanged.
///
/// Useful for fixed messages and for exercising a playlist without any
/// network-backed sources.
pub struct StaticSource;

impl StaticSource {
    pub fn manifest() -> SourceManifest {
        SourceManifest::new("static").field(ConfigField::required("payload", FieldKind::Any))
    }
}

impl DataSource for StaticSource {
    fn get_data<'a>(&'a self, config: &'a Value) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move { Ok(config.get("payload").cloned().unwrap_or(Value::Null)) })
    }
}
