//! Render capability consumed by the crawler
//!
//! The crawler only needs a small surface from a page-rendering engine:
//! navigate to a URL and get back a [`Document`] it can inspect. Engines:
//! - [`HttpRenderer`] fetches markup directly over HTTP
//! - [`BrowserlessRenderer`] asks a headless-browser service for the rendered DOM
//! - `ChromeRenderer` drives a local Chrome tab (`browser` feature), the only
//!   engine that can run visibly and move the pointer

mod browserless;
#[cfg(feature = "browser")]
mod chrome;
mod document;
mod http;

pub use browserless::BrowserlessRenderer;
#[cfg(feature = "browser")]
pub use chrome::{ChromeRenderer, ChromeSession};
pub use document::{collapse_whitespace, Document};
pub use http::{build_http_client, HttpRenderer};

use crate::config::RenderConfig;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors produced while navigating
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Navigation timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Browser service error ({status}): {message}")]
    Browserless { status: u16, message: String },

    #[error("Invalid URL {url}")]
    InvalidUrl { url: String },

    #[cfg(feature = "browser")]
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Render pool closed")]
    PoolClosed,
}

impl RenderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A handle onto a page-rendering engine
///
/// One handle serves one navigation at a time; the detail pool hands each
/// handle to a single task until it is released.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Navigates to `url` and returns the rendered document
    async fn navigate(&self, url: &Url, timeout: Duration) -> Result<Document, RenderError>;

    /// Moves the pointer along `path` (viewport coordinates)
    ///
    /// Engines without an interactive page ignore this.
    async fn move_pointer(&self, _path: &[(f64, f64)]) -> Result<(), RenderError> {
        Ok(())
    }

    /// Short engine name for logs
    fn name(&self) -> &'static str;
}

/// Navigates with a hard deadline on top of the engine's own timeout
///
/// Engines enforce `timeout` on their transport; this bounds the whole call,
/// including anything the engine does after the response arrives.
pub async fn navigate_with_timeout(
    renderer: &dyn Renderer,
    url: &Url,
    timeout: Duration,
) -> Result<Document, RenderError> {
    match tokio::time::timeout(timeout, renderer.navigate(url, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::Timeout {
            url: url.to_string(),
        }),
    }
}

/// Builds one render handle according to the configuration
pub fn build_renderer(
    config: &RenderConfig,
    headless: bool,
) -> Result<Box<dyn Renderer>, RenderError> {
    let mut handles = build_renderers(config, headless, 1)?;
    handles.pop().ok_or(RenderError::PoolClosed)
}

/// Builds `count` independent render handles
///
/// Chrome handles built by one call share a browser process, one tab each.
pub fn build_renderers(
    config: &RenderConfig,
    headless: bool,
    count: usize,
) -> Result<Vec<Box<dyn Renderer>>, RenderError> {
    #[cfg(feature = "browser")]
    if config.browser {
        let session = ChromeSession::new(headless, &config.user_agent);
        return Ok((0..count)
            .map(|_| Box::new(ChromeRenderer::new(session.clone())) as Box<dyn Renderer>)
            .collect());
    }
    #[cfg(not(feature = "browser"))]
    let _ = headless;

    (0..count).map(|_| build_plain_renderer(config)).collect()
}

fn build_plain_renderer(config: &RenderConfig) -> Result<Box<dyn Renderer>, RenderError> {
    match &config.browserless_url {
        Some(endpoint) => {
            let token = config
                .browserless_token_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok());
            Ok(Box::new(BrowserlessRenderer::new(
                endpoint,
                token.as_deref(),
            )?))
        }
        None => Ok(Box::new(HttpRenderer::new(&config.user_agent)?)),
    }
}
