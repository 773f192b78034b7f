use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::Path;
use tracing::{debug, info};

pub const CARD_SELECTOR: &str = ".container";
pub const DEFAULT_PADDING_TOP: u32 = 50;
pub const DEFAULT_PADDING_BOTTOM: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Padding {
    pub top: u32,
    pub bottom: u32,
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            top: DEFAULT_PADDING_TOP,
            bottom: DEFAULT_PADDING_BOTTOM,
        }
    }
}

/// Turns rendered card HTML into an image file.
#[async_trait]
pub trait Screenshotter: Send + Sync {
    async fn capture(&self, html: &str, selector: &str, padding: Padding, output: &Path)
        -> Result<()>;
}

/// Headless Chromium at a 2x device scale factor.
pub struct ChromeScreenshotter {
    width: u32,
    height: u32,
}

impl Default for ChromeScreenshotter {
    fn default() -> Self {
        Self {
            width: 600,
            height: 1200,
        }
    }
}

impl ChromeScreenshotter {
    fn config(&self) -> Result<BrowserConfig> {
        BrowserConfig::builder()
            .new_headless_mode()
            .no_sandbox()
            .args(vec!["--disable-gpu", "--disable-dev-shm-usage"])
            .viewport(Viewport {
                width: self.width,
                height: self.height,
                device_scale_factor: Some(2.0),
                emulating_mobile: false,
                is_landscape: false,
                has_touch: false,
            })
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to configure headless browser: {}", e))
    }
}

fn padding_script(selector: &str, padding: Padding) -> String {
    format!(
        "(() => {{ const el = document.querySelector('{}'); \
         if (el) {{ el.style.paddingTop = '{}px'; el.style.paddingBottom = '{}px'; }} }})()",
        selector, padding.top, padding.bottom
    )
}

#[async_trait]
impl Screenshotter for ChromeScreenshotter {
    async fn capture(
        &self,
        html: &str,
        selector: &str,
        padding: Padding,
        output: &Path,
    ) -> Result<()> {
        info!("Launching headless browser");
        let (mut browser, mut handler) = Browser::launch(self.config()?)
            .await
            .context("Failed to launch headless browser")?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = async {
            let page = browser
                .new_page("about:blank")
                .await
                .context("Failed to open browser page")?;
            page.set_content(html)
                .await
                .context("Failed to load card HTML")?;
            let script = padding_script(selector, padding);
            page.evaluate(script.as_str())
                .await
                .context("Failed to apply card padding")?;

            let element = page
                .find_element(selector)
                .await
                .with_context(|| format!("Card element {} not found", selector))?;
            element
                .save_screenshot(CaptureScreenshotFormat::Png, output)
                .await
                .with_context(|| format!("Failed to write screenshot {}", output.display()))?;
            debug!("Screenshot written to {}", output.display());
            Ok::<(), anyhow::Error>(())
        }
        .await;

        browser.close().await.ok();
        events.abort();
        result
    }
}
