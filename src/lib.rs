//! Catalog-Harvest: an incremental catalog crawler
//!
//! This crate walks the paginated listing pages of one or more catalog sources,
//! enriches new or incomplete items from their detail pages, classifies them by
//! keyword, and upserts the result into a keyed record store.

pub mod categorize;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod record;
pub mod render;
pub mod storage;

use thiserror::Error;

/// Main error type for Catalog-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    #[error("Store error: {0}")]
    Store(#[from] storage::StoreError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Catalog-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use categorize::Categorizer;
pub use config::{Config, SourceSpec};
pub use crawler::{Coordinator, CrawlSummary};
pub use record::{CategorizedRecord, DetailRecord, StubRecord};
