//! Hosted REST store
//!
//! Talks to a PostgREST-style table endpoint (as exposed by Supabase):
//! - batch reads use an `in.(...)` filter on `external_id`
//! - upserts POST with `on_conflict=external_id` and merge-duplicates resolution
//! - deactivation PATCHes a single row

use crate::record::{CategorizedRecord, ExistingMetadata};
use crate::storage::traits::{RecordStore, StoreError, StoreResult};
use crate::storage::ActiveRecord;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// IDs per batch read, keeping the filter well under URL length limits
const BATCH_CHUNK: usize = 100;

/// Record store backed by a hosted REST table
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
}

#[derive(Debug, Deserialize)]
struct SnapshotRow {
    external_id: String,
    #[serde(flatten)]
    metadata: ExistingMetadata,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send_read(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!("{}: {}", status, message)));
        }
        Ok(response)
    }
}

/// Builds a PostgREST `in.(...)` filter with quoted values
fn in_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

/// JSON row for an upsert; detail columns are only sent when freshly scraped
fn upsert_row(record: &CategorizedRecord) -> Value {
    let mut row = Map::new();
    row.insert("external_id".into(), json!(record.stub.external_id));
    row.insert("title".into(), json!(record.stub.title));
    row.insert("cover_url".into(), json!(record.stub.cover_url));
    row.insert("source_url".into(), json!(record.stub.source_url));
    row.insert("source_tag".into(), json!(record.source_tag));
    row.insert("is_active".into(), json!(record.is_active));

    if let Some(enrichment) = &record.enrichment {
        let detail = &enrichment.detail;
        row.insert("duration".into(), json!(record.persisted_duration()));
        row.insert("release_date".into(), json!(detail.release_date));
        row.insert("actors".into(), json!(detail.actors));
        row.insert("tags".into(), json!(detail.tags));
        row.insert("categories".into(), json!(enrichment.categories));
    }

    Value::Object(row)
}

#[async_trait]
impl RecordStore for RestStore {
    async fn batch_get(&self, ids: &[String]) -> StoreResult<HashMap<String, ExistingMetadata>> {
        let mut snapshot = HashMap::new();

        for chunk in ids.chunks(BATCH_CHUNK) {
            let request = self.client.get(self.table_url()).query(&[
                ("select", "external_id,duration,actors".to_string()),
                ("external_id", in_filter(chunk)),
            ]);
            let rows: Vec<SnapshotRow> = self
                .send_read(request)
                .await?
                .json()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;

            snapshot.extend(rows.into_iter().map(|row| (row.external_id, row.metadata)));
        }

        Ok(snapshot)
    }

    async fn upsert(&self, record: CategorizedRecord) -> StoreResult<()> {
        let body = Value::Array(vec![upsert_row(&record)]);
        let request = self
            .client
            .post(self.table_url())
            .query(&[("on_conflict", "external_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body);

        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StoreError::Write {
                external_id: record.stub.external_id.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Write {
                external_id: record.stub.external_id,
                message: format!("{}: {}", status, message),
            });
        }
        Ok(())
    }

    async fn list_active(&self, limit: usize) -> StoreResult<Vec<ActiveRecord>> {
        let request = self.client.get(self.table_url()).query(&[
            ("select", "external_id,source_url".to_string()),
            ("is_active", "eq.true".to_string()),
            ("order", "created_at.asc".to_string()),
            ("limit", limit.to_string()),
        ]);
        self.send_read(request)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn set_active(&self, external_id: &str, active: bool) -> StoreResult<()> {
        let request = self
            .client
            .patch(self.table_url())
            .query(&[("external_id", format!("eq.{}", external_id))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "is_active": active }));

        let response = self.authorized(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Write {
                external_id: external_id.to_string(),
                message: format!("{}: {}", status, message),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
