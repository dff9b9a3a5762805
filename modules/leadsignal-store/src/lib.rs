// LeadStore — the durable-store contract the engine requires.
//
// Two implementations: MemoryLeadStore (tests, demo mode) and
// PgLeadStore (Postgres via sqlx). The engine only ever talks to the
// trait, which keeps unit tests free of network and Docker.

pub mod memory;
pub mod postgres;

pub use memory::MemoryLeadStore;
pub use postgres::PgLeadStore;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use leadsignal_common::types::{
    Interaction, Lead, LeadStatus, LeadType, Task, TaskType,
};

/// Query filter for lead listings.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub lead_type: Option<LeadType>,
    pub status: Option<LeadStatus>,
    pub min_score: Option<u8>,
    /// Only leads contacted at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

/// Aggregate counts for the stats surface.
#[derive(Debug, Clone, Default)]
pub struct LeadCounts {
    pub total: u64,
    pub by_type: Vec<(LeadType, u64)>,
    pub by_status: Vec<(LeadStatus, u64)>,
    pub avg_score: f64,
    pub pending_tasks: u64,
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    // --- Lead lifecycle ---

    async fn get(&self, lead_id: &str) -> Result<Option<Lead>>;

    /// Look up a lead by its resolver identity key.
    async fn get_by_identity(&self, identity: &str) -> Result<Option<Lead>>;

    /// Atomically write the lead and append the interaction. The
    /// interaction insert is a no-op if its (lead_id, source_id) pair
    /// was already recorded — the idempotence guard for re-ingestion.
    async fn upsert_lead(&self, identity: &str, lead: &Lead, interaction: &Interaction)
        -> Result<()>;

    /// Update mutable lead fields (status, next_action) without
    /// touching interactions.
    async fn update_lead(&self, lead: &Lead) -> Result<()>;

    async fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>>;

    // --- Interactions ---

    /// Source ids already recorded for a lead, for duplicate detection.
    async fn interaction_source_ids(&self, lead_id: &str) -> Result<HashSet<String>>;

    async fn interactions_for_lead(&self, lead_id: &str) -> Result<Vec<Interaction>>;

    // --- Tasks ---

    async fn insert_task(&self, task: &Task) -> Result<()>;

    /// True if the lead already has a pending task of this type.
    async fn pending_task_exists(&self, lead_id: &str, task_type: TaskType) -> Result<bool>;

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>>;

    async fn update_task(&self, task: &Task) -> Result<()>;

    async fn tasks_for_lead(&self, lead_id: &str) -> Result<Vec<Task>>;

    // --- Aggregates ---

    async fn counts(&self) -> Result<LeadCounts>;
}

impl LeadFilter {
    pub fn matches(&self, lead: &Lead) -> bool {
        if let Some(t) = self.lead_type {
            if lead.lead_type != t {
                return false;
            }
        }
        if let Some(s) = self.status {
            if lead.status != s {
                return false;
            }
        }
        if let Some(min) = self.min_score {
            if lead.score < min {
                return false;
            }
        }
        if let Some(since) = self.since {
            if lead.last_contact < since {
                return false;
            }
        }
        true
    }
}
