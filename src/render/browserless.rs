//! Headless-browser render engine
//!
//! Posts the target URL to a Browserless-compatible `/content` endpoint and
//! receives the DOM serialized after scripts have run.

use crate::render::{Document, RenderError, Renderer};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Render handle backed by a headless-browser service
pub struct BrowserlessRenderer {
    client: Client,
    endpoint: Url,
}

impl BrowserlessRenderer {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, RenderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|source| RenderError::Http {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            endpoint: content_endpoint(base_url, token)?,
        })
    }
}

/// `{base}/content`, with the token as an encoded query parameter
fn content_endpoint(base_url: &str, token: Option<&str>) -> Result<Url, RenderError> {
    let invalid = || RenderError::InvalidUrl {
        url: base_url.to_string(),
    };
    let base =
        Url::parse(&format!("{}/", base_url.trim_end_matches('/'))).map_err(|_| invalid())?;
    let mut endpoint = base.join("content").map_err(|_| invalid())?;
    if let Some(token) = token {
        endpoint.query_pairs_mut().append_pair("token", token);
    }
    Ok(endpoint)
}

#[async_trait]
impl Renderer for BrowserlessRenderer {
    async fn navigate(&self, url: &Url, timeout: Duration) -> Result<Document, RenderError> {
        let body = serde_json::json!({
            "url": url.as_str(),
            "gotoOptions": {
                "waitUntil": "domcontentloaded",
                "timeout": timeout.as_millis() as u64,
            },
        });

        let resp = self
            .client
            .post(self.endpoint.clone())
            .timeout(timeout + Duration::from_secs(5))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RenderError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    RenderError::Http {
                        url: url.to_string(),
                        source: e,
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RenderError::Browserless {
                status: status.as_u16(),
                message,
            });
        }

        let html = resp.text().await.map_err(|source| RenderError::Http {
            url: url.to_string(),
            source,
        })?;

        Ok(Document::new(url.clone(), status.as_u16(), html))
    }

    fn name(&self) -> &'static str {
        "browserless"
    }
}
