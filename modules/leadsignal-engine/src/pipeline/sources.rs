// Source collectors — the finite, already-authenticated feeds the
// engine ingests. Credential handling and pagination live upstream;
// a collector only returns records inside the requested window.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};

use leadsignal_common::types::{CommSource, RawCommunication};

#[async_trait]
pub trait SourceCollector: Send + Sync {
    fn source(&self) -> CommSource;

    /// Return all records for the trailing `days_back` window, oldest
    /// first.
    async fn collect(&self, days_back: u32) -> Result<Vec<RawCommunication>>;
}

/// Reads a JSON array of RawCommunication from disk. Used by the CLI
/// and anywhere a provider-specific collector exports its raw pull.
pub struct JsonFeedCollector {
    source: CommSource,
    path: PathBuf,
}

impl JsonFeedCollector {
    pub fn new(source: CommSource, path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            path: path.into(),
        }
    }
}

#[async_trait]
impl SourceCollector for JsonFeedCollector {
    fn source(&self) -> CommSource {
        self.source
    }

    async fn collect(&self, days_back: u32) -> Result<Vec<RawCommunication>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading feed file {}", self.path.display()))?;
        let mut records: Vec<RawCommunication> =
            serde_json::from_slice(&bytes).context("parsing feed JSON")?;

        let cutoff = Utc::now() - Duration::days(days_back as i64);
        records.retain(|r| r.source == self.source && r.timestamp >= cutoff);
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }
}
