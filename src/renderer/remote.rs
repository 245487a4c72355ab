//! Remote rendering API backend
//!
//! Posts the document to an HTTP screenshot service and expects the PNG bytes
//! in the response body. The request body is
//! `{"html": "...", "viewport": {"width": 800, "height": 480}, "type": "png"}`.

use std::time::Duration;

use futures::future::BoxFuture;
use log::debug;
use reqwest::Client;
use serde::Serialize;

use super::{finish_page, PageRequest, RenderedPage, RendererBackend};
use crate::{Error, Result, ScreenSize};

#[derive(Serialize)]
struct ScreenshotBody<'a> {
    html: &'a str,
    viewport: ScreenSize,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Screenshot backend backed by a remote HTTP API
pub struct RemoteBackend {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl RemoteBackend {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }

    async fn capture(&self, html: &str, size: ScreenSize) -> Result<Vec<u8>> {
        let body = ScreenshotBody {
            html,
            viewport: size,
            kind: "png",
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let res = req
            .send()
            .await
            .map_err(|e| Error::Backend(format!("HTTP POST failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Backend(format!("HTTP {}: {}", status.as_u16(), text.trim())));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| Error::Backend(format!("Failed to read response body: {}", e)))?;
        debug!("Remote renderer returned {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

impl RendererBackend for RemoteBackend {
    fn render_page<'a>(&'a self, request: &'a PageRequest) -> BoxFuture<'a, Result<RenderedPage>> {
        Box::pin(async move {
            let png = self.capture(&request.html, request.size).await?;
            finish_page(png, request).await
        })
    }
}
