//! Plain HTTP render engine
//!
//! Fetches markup with reqwest. Challenge interstitials usually arrive with a
//! 403, 429 or 503 status, so those responses are still returned as documents
//! carrying their status; the block detector treats every one of them as a
//! block, signature or not.

use crate::render::{Document, RenderError, Renderer};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Statuses whose body is handed back for inspection rather than treated as failure
const INSPECTABLE_STATUSES: &[StatusCode] = &[
    StatusCode::FORBIDDEN,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::SERVICE_UNAVAILABLE,
];

/// Render handle backed by a reqwest client
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    /// Creates a renderer presenting the given user agent
    pub fn new(user_agent: &str) -> Result<Self, RenderError> {
        let client = build_http_client(user_agent).map_err(|source| RenderError::Http {
            url: String::new(),
            source,
        })?;
        Ok(Self { client })
    }
}

/// Builds the HTTP client used for catalog pages
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn navigate(&self, url: &Url, timeout: Duration) -> Result<Document, RenderError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() && !INSPECTABLE_STATUSES.contains(&status) {
            return Err(RenderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| classify_error(url, e))?;
        Ok(Document::new(final_url, status.as_u16(), body))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn classify_error(url: &Url, error: reqwest::Error) -> RenderError {
    if error.is_timeout() {
        RenderError::Timeout {
            url: url.to_string(),
        }
    } else {
        RenderError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
