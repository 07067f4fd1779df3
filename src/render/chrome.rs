//! Local Chrome render engine
//!
//! Drives a Chrome or Chromium process over the DevTools protocol. Handles
//! built together share one browser process, and each handle owns a tab, so
//! pointer movement lands on the page that handle last navigated. The process
//! is launched on first use.

use crate::render::{Document, RenderError, Renderer};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType,
};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

const CHROME_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
];

fn browser_error(e: CdpError) -> RenderError {
    RenderError::Browser(e.to_string())
}

/// One browser process shared by several tabs
pub struct ChromeSession {
    headless: bool,
    user_agent: String,
    browser: Mutex<Option<Browser>>,
}

impl ChromeSession {
    pub fn new(headless: bool, user_agent: &str) -> Arc<Self> {
        Arc::new(Self {
            headless,
            user_agent: user_agent.to_string(),
            browser: Mutex::new(None),
        })
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    async fn launch(&self) -> Result<Browser, RenderError> {
        tracing::info!("Launching browser (headless={})", self.headless);

        // `with_head` is the visible mode
        let mut builder = BrowserConfig::builder();
        if !self.headless {
            builder = builder.with_head();
        }
        for arg in CHROME_ARGS {
            builder = builder.arg(*arg);
        }
        let config = builder.build().map_err(RenderError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_error)?;
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    async fn open_tab(&self) -> Result<Page, RenderError> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let browser = guard
            .as_ref()
            .ok_or_else(|| RenderError::Browser("browser not running after launch".to_string()))?;

        let page = browser.new_page("about:blank").await.map_err(browser_error)?;
        page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .map_err(browser_error)?;
        Ok(page)
    }
}

/// Render handle backed by one tab of a [`ChromeSession`]
pub struct ChromeRenderer {
    session: Arc<ChromeSession>,
    tab: Mutex<Option<Page>>,
}

impl ChromeRenderer {
    pub fn new(session: Arc<ChromeSession>) -> Self {
        Self {
            session,
            tab: Mutex::new(None),
        }
    }

    async fn tab(&self) -> Result<Page, RenderError> {
        let mut tab = self.tab.lock().await;
        if let Some(page) = tab.as_ref() {
            return Ok(page.clone());
        }
        let page = self.session.open_tab().await?;
        *tab = Some(page.clone());
        Ok(page)
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn navigate(&self, url: &Url, timeout: Duration) -> Result<Document, RenderError> {
        let page = self.tab().await?;

        match tokio::time::timeout(timeout, page.goto(url.as_str())).await {
            Err(_) => {
                return Err(RenderError::Timeout {
                    url: url.to_string(),
                })
            }
            Ok(Err(e)) => return Err(browser_error(e)),
            Ok(Ok(_)) => {}
        }

        let html = page.content().await.map_err(browser_error)?;
        let final_url = page
            .url()
            .await
            .map_err(browser_error)?
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        // DevTools navigation does not surface the response status
        Ok(Document::new(final_url, 200, html))
    }

    async fn move_pointer(&self, path: &[(f64, f64)]) -> Result<(), RenderError> {
        let page = self.tab().await?;
        for &(x, y) in path {
            page.execute(DispatchMouseEventParams::new(
                DispatchMouseEventType::MouseMoved,
                x,
                y,
            ))
            .await
            .map_err(browser_error)?;

            let pause = rand::rng().random_range(40..120);
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "chrome"
    }
}
