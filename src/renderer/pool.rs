//! Round-robin renderer pool with sequential failover

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use super::{PageRequest, RenderedPage, RendererBackend};
use crate::{BackendFailure, Error, Result};

/// A backend and the name it is reported under
pub struct NamedBackend {
    pub name: String,
    pub backend: Arc<dyn RendererBackend>,
}

/// Distributes screenshot jobs across backends.
///
/// The pool keeps one rotation pointer shared by every caller. Each backend
/// *attempt* moves the pointer forward by one, before the backend is invoked,
/// so a failed attempt consumes a rotation step just like a successful one.
pub struct RendererPool {
    backends: Vec<NamedBackend>,
    pointer: AtomicUsize,
}

impl RendererPool {
    pub fn new(backends: Vec<NamedBackend>) -> Self {
        Self {
            backends,
            pointer: AtomicUsize::new(0),
        }
    }

    /// Append a backend at the end of the rotation.
    pub fn with_backend(mut self, name: impl Into<String>, backend: Arc<dyn RendererBackend>) -> Self {
        self.backends.push(NamedBackend {
            name: name.into(),
            backend,
        });
        self
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name.as_str()).collect()
    }

    /// Index of the backend the next attempt will use.
    pub fn pointer(&self) -> usize {
        self.pointer.load(Ordering::SeqCst)
    }

    /// Take the current slot and move the pointer to the next one.
    fn advance(&self) -> usize {
        let n = self.backends.len();
        match self
            .pointer
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |p| Some((p + 1) % n))
        {
            Ok(prev) | Err(prev) => prev % n,
        }
    }

    /// Render a page, trying each backend at most once.
    pub async fn render_page(&self, request: &PageRequest) -> Result<RenderedPage> {
        if self.backends.is_empty() {
            return Err(Error::NoBackends);
        }

        let mut failures = Vec::new();
        for _ in 0..self.backends.len() {
            let idx = self.advance();
            let entry = &self.backends[idx];
            debug!("Rendering {} via backend '{}'", request.output.display(), entry.name);

            match entry.backend.render_page(request).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    warn!("Renderer backend '{}' failed: {}", entry.name, e);
                    failures.push(BackendFailure {
                        name: entry.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(Error::AllBackendsFailed(failures))
    }
}
