//! Link liveness sweep
//!
//! Takes the oldest active records, sends a HEAD request to each source URL,
//! and marks a record inactive once its page answers 404. Every request is
//! bounded by the navigation timeout, so a stalled host counts as an error.

use crate::storage::{ActiveRecord, RecordStore, StoreError};
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

/// Outcome of a liveness sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LivenessReport {
    pub checked: usize,
    pub deactivated: usize,
    pub errors: usize,
}

#[derive(Debug)]
enum LinkStatus {
    Alive,
    Gone,
    Unreachable(String),
}

async fn head_status(client: &Client, url: &str, timeout: Duration) -> LinkStatus {
    match client.head(url).timeout(timeout).send().await {
        Ok(response) if response.status() == StatusCode::NOT_FOUND => LinkStatus::Gone,
        Ok(_) => LinkStatus::Alive,
        Err(e) => LinkStatus::Unreachable(e.to_string()),
    }
}

/// Checks up to `limit` of the oldest active records, `concurrency` at a time
///
/// Only a definite 404 deactivates a record; network errors, timeouts and
/// other statuses leave it active.
pub async fn check_links(
    client: &Client,
    store: &dyn RecordStore,
    limit: usize,
    concurrency: usize,
    timeout: Duration,
) -> Result<LivenessReport, StoreError> {
    let records = store.list_active(limit).await?;
    tracing::info!("Checking {} links", records.len());

    let checked: Vec<(ActiveRecord, LinkStatus)> = stream::iter(records)
        .map(|record| async move {
            let status = head_status(client, &record.source_url, timeout).await;
            (record, status)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = LivenessReport::default();
    for (record, status) in checked {
        report.checked += 1;
        match status {
            LinkStatus::Alive => {}
            LinkStatus::Gone => match store.set_active(&record.external_id, false).await {
                Ok(()) => {
                    tracing::info!("Deactivated {} ({})", record.external_id, record.source_url);
                    report.deactivated += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to deactivate {}: {}", record.external_id, e);
                    report.errors += 1;
                }
            },
            LinkStatus::Unreachable(message) => {
                tracing::debug!("Could not reach {}: {}", record.source_url, message);
                report.errors += 1;
            }
        }
    }

    Ok(report)
}
