//! Challenge page detection and backoff
//!
//! Anti-automation interstitials are recognised by their response status or by
//! a few title and markup signatures. Markup signatures are limited to
//! interstitial-only markers, since Cloudflare injects its bot-detection
//! script into ordinary pages too.

use crate::render::{Document, Renderer};
use rand::Rng;
use std::time::Duration;

const TITLE_SIGNATURES: &[&str] = &[
    "just a moment",
    "attention required",
    "checking your browser",
    "security check",
    "ddos-guard",
    "access denied",
    "请稍候",
    "請稍候",
];

const CONTENT_SIGNATURES: &[&str] = &[
    "cf-browser-verification",
    "cf_chl_opt",
    "challenge-form",
    "cf-turnstile",
];

/// Statuses that never carry catalog content
const BLOCKING_STATUSES: &[u16] = &[403, 429, 503];

/// Classification of a rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageVerdict {
    Usable,
    Blocked { signature: String },
}

impl PageVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Signature-based challenge detector
#[derive(Debug, Clone)]
pub struct BlockDetector {
    title_signatures: Vec<String>,
    content_signatures: Vec<String>,
}

impl Default for BlockDetector {
    fn default() -> Self {
        Self {
            title_signatures: TITLE_SIGNATURES.iter().map(|s| s.to_string()).collect(),
            content_signatures: CONTENT_SIGNATURES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BlockDetector {
    /// Classifies a page as usable or blocked
    pub fn classify(&self, document: &Document) -> PageVerdict {
        if BLOCKING_STATUSES.contains(&document.status()) {
            return PageVerdict::Blocked {
                signature: format!("status {}", document.status()),
            };
        }

        let title = document.title().to_lowercase();
        if let Some(signature) = self
            .title_signatures
            .iter()
            .find(|sig| title.contains(sig.as_str()))
        {
            return PageVerdict::Blocked {
                signature: signature.clone(),
            };
        }

        let content = document.content().to_lowercase();
        if let Some(signature) = self
            .content_signatures
            .iter()
            .find(|sig| content.contains(sig.as_str()))
        {
            return PageVerdict::Blocked {
                signature: signature.clone(),
            };
        }

        PageVerdict::Usable
    }
}

/// What to do after a listing page came back blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingAction {
    /// Navigate to the same page again
    Retry,
    /// Give up on the rest of this source
    AbandonSource,
}

/// Wait-and-retry policy for blocked listing pages
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    wait: Duration,
    headless: bool,
}

impl BackoffPolicy {
    pub fn new(wait: Duration, headless: bool) -> Self {
        Self { wait, headless }
    }

    /// Decides the next step after `retries` earlier retries of the same page
    ///
    /// A visible browser gets one retry, since the challenge may be cleared
    /// interactively during the wait. A headless one has no way to clear it.
    pub fn on_listing_block(&self, retries: u32) -> ListingAction {
        if !self.headless && retries == 0 {
            ListingAction::Retry
        } else {
            ListingAction::AbandonSource
        }
    }

    /// Waits out the challenge, nudging the pointer when a window is visible
    pub async fn wait(&self, renderer: &dyn Renderer) {
        if !self.headless {
            let path = pointer_path(8);
            if let Err(e) = renderer.move_pointer(&path).await {
                tracing::debug!("Pointer movement failed: {}", e);
            }
        }
        tokio::time::sleep(self.wait).await;
    }
}

/// A short random pointer path across a 1280x720 viewport
fn pointer_path(steps: usize) -> Vec<(f64, f64)> {
    let mut rng = rand::rng();
    (0..steps)
        .map(|_| (rng.random_range(0.0..1280.0), rng.random_range(0.0..720.0)))
        .collect()
}
