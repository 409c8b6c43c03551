//! Headless-browser fallback fetch with stealth evasion.
//!
//! The browser is a lazy, process-wide singleton: built on first use,
//! rebuilt once if a call observes it disconnected. Not tied to the
//! lifetime of any single request.

mod config;
mod stealth;

pub use config::BrowserConfig;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("browser support not compiled (rebuild with --features browser)")]
    NotCompiled,
}

pub struct BrowserFetchResult {
    pub html: String,
    pub final_url: String,
}

#[cfg(feature = "browser")]
mod imp {
    use super::*;
    use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
    use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
    use chromiumoxide::cdp::browser_protocol::target::{BrowserContextId, CreateTargetParams};
    use chromiumoxide::{Browser, BrowserConfig as CdpBrowserConfig};
    use futures::StreamExt;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tracing::{debug, warn};

    /// Process-wide lazy handle to the headless browser.
    pub struct BrowserFetcher {
        config: BrowserConfig,
        browser: Mutex<Option<Arc<Browser>>>,
    }

    impl BrowserFetcher {
        pub fn new(config: BrowserConfig) -> Self {
            Self {
                config,
                browser: Mutex::new(None),
            }
        }

        async fn launch(&self) -> Result<Arc<Browser>, BrowserError> {
            let mut builder = CdpBrowserConfig::builder();
            if !self.config.headless {
                builder = builder.with_head();
            }
            builder = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-infobars")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg("--no-sandbox")
                .arg("--disable-gpu")
                .arg(format!(
                    "--window-size={},{}",
                    self.config.viewport.0, self.config.viewport.1
                ))
                .arg(format!("--lang={}", self.config.locale));

            let cdp_config = builder
                .build()
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            let (browser, mut handler) = Browser::launch(cdp_config)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            Ok(Arc::new(browser))
        }

        async fn handle(&self) -> Result<Arc<Browser>, BrowserError> {
            let mut guard = self.browser.lock().await;
            if let Some(b) = guard.as_ref() {
                return Ok(b.clone());
            }
            debug!("launching headless browser singleton");
            let browser = self.launch().await?;
            *guard = Some(browser.clone());
            Ok(browser)
        }

        /// Navigate to `url`, click a consent banner if present, scroll
        /// halfway down to trigger lazy content, and capture the final
        /// HTML and URL. Rebuilds the browser singleton once if the first
        /// attempt observes it disconnected.
        pub async fn fetch(&self, url: &str) -> Result<BrowserFetchResult, BrowserError> {
            match self.fetch_once(url).await {
                Ok(result) => Ok(result),
                Err(e) if e.to_string().contains("closed") || e.to_string().contains("disconnect") => {
                    warn!("browser singleton disconnected, rebuilding once: {e}");
                    let mut guard = self.browser.lock().await;
                    *guard = None;
                    drop(guard);
                    self.fetch_once(url).await
                }
                Err(e) => Err(e),
            }
        }

        async fn fetch_once(&self, url: &str) -> Result<BrowserFetchResult, BrowserError> {
            let browser = self.handle().await?;

            let browser_context_id = browser
                .create_browser_context()
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;

            let result = self.fetch_in_context(&browser, &browser_context_id, url).await;

            let _ = browser.dispose_browser_context(browser_context_id).await;

            result
        }

        /// Runs one request inside a fresh incognito browser context so
        /// cookies and storage never leak between requests.
        async fn fetch_in_context(
            &self,
            browser: &Browser,
            browser_context_id: &BrowserContextId,
            url: &str,
        ) -> Result<BrowserFetchResult, BrowserError> {
            let target_params = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(browser_context_id.clone())
                .build()
                .map_err(BrowserError::Navigation)?;
            let page = browser
                .new_page(target_params)
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;

            page.execute(SetUserAgentOverrideParams::new(self.config.user_agent.clone()))
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;
            page.execute(SetTimezoneOverrideParams::new(self.config.timezone.clone()))
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;

            page.evaluate_on_new_document(stealth::STEALTH_INIT_SCRIPT)
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;

            let navigation = async {
                page.goto(url)
                    .await
                    .map_err(|e| BrowserError::Navigation(e.to_string()))?;
                let _ = page.wait_for_navigation().await;
                Ok::<(), BrowserError>(())
            };
            tokio::time::timeout(self.config.timeout, navigation)
                .await
                .map_err(|_| BrowserError::Navigation(format!("navigation timed out after {:?}", self.config.timeout)))??;

            for selector in stealth::CONSENT_SELECTORS {
                if let Ok(element) = page.find_element(*selector).await {
                    let _ = element.click().await;
                    break;
                }
            }

            let _ = page
                .evaluate("window.scrollTo(0, document.body.scrollHeight / 2)")
                .await;

            let html = page
                .content()
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;
            let final_url = page.url().await.ok().flatten().unwrap_or_else(|| url.to_string());

            let _ = page.close().await;

            Ok(BrowserFetchResult { html, final_url })
        }

        pub async fn close(&self) {
            let mut guard = self.browser.lock().await;
            *guard = None;
        }
    }
}

#[cfg(feature = "browser")]
pub use imp::BrowserFetcher;

#[cfg(not(feature = "browser"))]
pub struct BrowserFetcher;

#[cfg(not(feature = "browser"))]
impl BrowserFetcher {
    pub fn new(_config: BrowserConfig) -> Self {
        Self
    }

    pub async fn fetch(&self, _url: &str) -> Result<BrowserFetchResult, BrowserError> {
        Err(BrowserError::NotCompiled)
    }

    pub async fn close(&self) {}
}
