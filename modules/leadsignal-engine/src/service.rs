// The operation surface the CLI (and any future server) talks to.
// Collection failures from one feed never block the others; the run
// reports them in the stats and keeps going.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use leadsignal_common::error::LeadSignalError;
use leadsignal_common::types::{
    Interaction, Lead, LeadStatus, RawCommunication, Task, TaskPriority, TaskType,
};
use leadsignal_store::{LeadCounts, LeadFilter, LeadStore};

use crate::export::{self, CrmTarget};
use crate::lifecycle::LifecycleManager;
use crate::pipeline::{
    CancelToken, CollectStats, FailedRecord, IngestPipeline, SourceCollector,
};
use crate::resolver::IdentityResolver;
use crate::risk::RiskVerifier;
use crate::signals::SignalMatcher;

/// A lead with its full interaction and task history.
#[derive(Debug, Clone)]
pub struct LeadDetail {
    pub lead: Lead,
    pub interactions: Vec<Interaction>,
    pub tasks: Vec<Task>,
}

pub struct LeadService {
    store: Arc<dyn LeadStore>,
    pipeline: IngestPipeline,
    lifecycle: Arc<LifecycleManager>,
}

impl LeadService {
    pub fn new(
        store: Arc<dyn LeadStore>,
        verifier: Arc<dyn RiskVerifier>,
        risk_concurrency: usize,
    ) -> Self {
        let lifecycle = Arc::new(LifecycleManager::new(store.clone()));
        let pipeline = IngestPipeline::new(
            Arc::new(SignalMatcher::new()),
            verifier,
            Arc::new(IdentityResolver::new(store.clone())),
            lifecycle.clone(),
            risk_concurrency,
        );
        Self {
            store,
            pipeline,
            lifecycle,
        }
    }

    /// Pull every collector's window, merge the feeds oldest-first, and
    /// ingest the batch. A failing collector is reported in the stats
    /// and the remaining feeds still run.
    pub async fn collect(
        &self,
        collectors: &[Box<dyn SourceCollector>],
        days_back: u32,
        cancel: &CancelToken,
    ) -> CollectStats {
        let mut records: Vec<RawCommunication> = Vec::new();
        let mut feed_failures: Vec<FailedRecord> = Vec::new();

        for collector in collectors {
            match collector.collect(days_back).await {
                Ok(batch) => records.extend(batch),
                Err(e) => {
                    warn!(source = %collector.source(), error = %e, "Collector failed, skipping feed");
                    feed_failures.push(FailedRecord {
                        source_id: format!("{}-feed", collector.source()),
                        reason: e.to_string(),
                    });
                }
            }
        }
        records.sort_by_key(|r| r.timestamp);

        let mut stats = self.pipeline.run(records, cancel).await;
        stats.failed.splice(0..0, feed_failures);
        stats
    }

    pub async fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>, LeadSignalError> {
        self.store
            .list(filter)
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))
    }

    pub async fn get(&self, lead_id: &str) -> Result<LeadDetail, LeadSignalError> {
        let lead = self
            .store
            .get(lead_id)
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))?
            .ok_or_else(|| LeadSignalError::LeadNotFound(lead_id.to_string()))?;
        let interactions = self
            .store
            .interactions_for_lead(lead_id)
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))?;
        let tasks = self
            .store
            .tasks_for_lead(lead_id)
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))?;
        Ok(LeadDetail {
            lead,
            interactions,
            tasks,
        })
    }

    pub async fn update_status(
        &self,
        lead_id: &str,
        to: LeadStatus,
    ) -> Result<Lead, LeadSignalError> {
        self.lifecycle.update_status(lead_id, to).await
    }

    pub async fn create_task(
        &self,
        lead_id: &str,
        task_type: TaskType,
        description: &str,
        priority: TaskPriority,
        due_in_days: i64,
    ) -> Result<Task, LeadSignalError> {
        self.lifecycle
            .create_task(lead_id, task_type, description, priority, due_in_days)
            .await
    }

    pub async fn complete_task(&self, task_id: Uuid) -> Result<Task, LeadSignalError> {
        self.lifecycle.complete_task(task_id).await
    }

    pub async fn cancel_task(&self, task_id: Uuid) -> Result<Task, LeadSignalError> {
        self.lifecycle.cancel_task(task_id).await
    }

    /// Render a lead as a payload for the named CRM. Unknown targets
    /// fail before the lead is even loaded.
    pub async fn export(&self, lead_id: &str, target: &str) -> Result<Value, LeadSignalError> {
        let target = CrmTarget::parse(target)?;
        let detail = self.get(lead_id).await?;
        Ok(export::export(&detail.lead, target))
    }

    pub async fn counts(&self) -> Result<LeadCounts, LeadSignalError> {
        self.store
            .counts()
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))
    }
}
