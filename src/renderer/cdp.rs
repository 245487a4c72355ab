//! Local headless Chrome backend (Chrome DevTools Protocol)

use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use base64::Engine as Base64Engine;
use futures::future::BoxFuture;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use tokio::sync::oneshot;

use super::{finish_page, PageRequest, RenderedPage, RendererBackend};
use crate::{Error, Result, ScreenSize};

enum Command {
    Capture(String, ScreenSize, oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<()>),
}

/// Screenshot backend driving a locally launched headless Chrome.
///
/// `headless_chrome` is synchronous, so a dedicated worker thread owns the
/// browser and serves capture commands sent from async tasks.
#[derive(Clone)]
pub struct ChromeBackend {
    cmd_tx: Sender<Command>,
}

impl ChromeBackend {
    /// Launch Chrome on a worker thread and wait for it to come up.
    pub async fn launch(window: ScreenSize) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            let browser = match launch_browser(window) {
                Ok(b) => b,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Capture(html, size, resp) => {
                        let res = capture(&browser, &html, size);
                        let _ = resp.send(res);
                    }
                    Command::Close(resp) => {
                        drop(browser);
                        let _ = resp.send(());
                        break;
                    }
                }
            }
        });

        init_rx
            .await
            .map_err(|e| Error::Backend(format!("Chrome worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    async fn capture(&self, html: &str, size: ScreenSize) -> Result<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Capture(html.to_string(), size, tx))
            .map_err(|_| Error::Backend("Chrome worker has shut down".into()))?;
        rx.await
            .map_err(|e| Error::Backend(format!("Capture canceled: {}", e)))?
    }

    /// Shut down the worker thread and the browser it owns.
    pub async fn close(self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Close(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

impl RendererBackend for ChromeBackend {
    fn render_page<'a>(&'a self, request: &'a PageRequest) -> BoxFuture<'a, Result<RenderedPage>> {
        Box::pin(async move {
            let png = self.capture(&request.html, request.size).await?;
            finish_page(png, request).await
        })
    }
}

fn launch_browser(window: ScreenSize) -> Result<Browser> {
    let launch_options = LaunchOptions::default_builder()
        .headless(true)
        .window_size(Some((window.width, window.height)))
        .idle_browser_timeout(Duration::from_secs(3600))
        .build()
        .map_err(|e| Error::Backend(format!("Failed to build launch options: {}", e)))?;

    Browser::new(launch_options).map_err(|e| Error::Backend(format!("Failed to launch browser: {}", e)))
}

fn capture(browser: &Browser, html: &str, size: ScreenSize) -> Result<Vec<u8>> {
    let tab = browser
        .new_tab()
        .map_err(|e| Error::Backend(format!("Failed to create tab: {}", e)))?;

    // Load the document inline so no file or server is needed
    let b64 = base64::engine::general_purpose::STANDARD.encode(html);
    let url = format!("data:text/html;charset=utf-8;base64,{}", b64);

    let result = tab
        .navigate_to(&url)
        .and_then(|t| t.wait_until_navigated())
        .map_err(|e| Error::Backend(format!("Navigation failed: {}", e)))
        .and_then(|t| {
            let clip = Page::Viewport {
                x: 0.0,
                y: 0.0,
                width: f64::from(size.width),
                height: f64::from(size.height),
                scale: 1.0,
            };
            t.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
                .map_err(|e| Error::Backend(format!("Screenshot failed: {}", e)))
        });

    if let Err(e) = tab.close(true) {
        warn!("Failed to close tab: {}", e);
    }
    debug!("Captured {}x{} screenshot", size.width, size.height);
    result
}
