use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceSpec>,
    /// Category label → keyword variants; the built-in table is used when absent
    #[serde(default)]
    pub categories: Option<BTreeMap<String, Vec<String>>>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Upper bound on listing pages visited per source
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Number of render handles shared by detail fetches in a batch
    #[serde(rename = "detail-concurrency", default = "default_detail_concurrency")]
    pub detail_concurrency: u32,

    /// Lower bound of the randomized pause around navigations (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the randomized pause around navigations (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Per-navigation timeout (seconds)
    #[serde(rename = "navigation-timeout-secs", default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Wait applied when a listing page turns out to be a challenge (seconds)
    #[serde(rename = "challenge-wait-secs", default = "default_challenge_wait")]
    pub challenge_wait_secs: u64,

    /// Whether the render engine runs without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Titles shorter than this (in characters) are treated as noise
    #[serde(rename = "min-title-length", default = "default_min_title_length")]
    pub min_title_length: usize,

    /// Which stored fields must be present to skip a detail fetch
    #[serde(rename = "skip-policy", default)]
    pub skip_policy: SkipPolicy,
}

impl CrawlerConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn challenge_wait(&self) -> Duration {
        Duration::from_secs(self.challenge_wait_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            detail_concurrency: default_detail_concurrency(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            navigation_timeout_secs: default_navigation_timeout(),
            challenge_wait_secs: default_challenge_wait(),
            headless: default_headless(),
            min_title_length: default_min_title_length(),
            skip_policy: SkipPolicy::default(),
        }
    }
}

/// Rule deciding whether stored metadata is complete enough to skip a detail page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipPolicy {
    /// A real duration is stored
    #[default]
    Duration,
    /// A real duration and at least one actor are stored
    DurationAndActors,
}

/// Render engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// User agent presented to the catalog
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Headless browser service endpoint; plain HTTP fetching is used when unset
    #[serde(rename = "browserless-url", default)]
    pub browserless_url: Option<String>,

    /// Environment variable holding the browser service token
    #[serde(rename = "browserless-token-env", default)]
    pub browserless_token_env: Option<String>,

    /// Drive a local Chrome over the DevTools protocol (`browser` build feature)
    #[serde(default)]
    pub browser: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            browserless_url: None,
            browserless_token_env: None,
            browser: false,
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Local SQLite database file
    #[serde(rename = "sqlite-path", default)]
    pub sqlite_path: Option<String>,

    /// Hosted REST endpoint (e.g. `https://<project>.supabase.co/rest/v1`)
    #[serde(rename = "rest-url", default)]
    pub rest_url: Option<String>,

    /// Environment variable holding the REST API key
    #[serde(rename = "rest-key-env", default = "default_rest_key_env")]
    pub rest_key_env: String,

    /// Table the records are written to
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            rest_url: None,
            rest_key_env: default_rest_key_env(),
            table: default_table(),
        }
    }
}

/// One paginated catalog source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    /// Listing URL; `page=<n>` is appended to it
    pub url: String,

    /// Tag stored on every record harvested from this source
    pub tag: String,

    /// Path fragment every detail URL of this source contains
    #[serde(rename = "detail-path-marker", default)]
    pub detail_path_marker: Option<String>,
}

fn default_max_pages() -> u32 {
    30
}

fn default_detail_concurrency() -> u32 {
    3
}

fn default_min_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    3_000
}

fn default_navigation_timeout() -> u64 {
    60
}

fn default_challenge_wait() -> u64 {
    15
}

fn default_headless() -> bool {
    true
}

fn default_min_title_length() -> usize {
    3
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_rest_key_env() -> String {
    "SUPABASE_KEY".to_string()
}

fn default_table() -> String {
    "videos".to_string()
}
