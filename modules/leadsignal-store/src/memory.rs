// In-memory LeadStore. Backs unit tests and the no-database demo
// mode. Single RwLock over all state: every upsert is atomic with
// respect to readers, which is what the merge path requires.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use leadsignal_common::types::{
    Interaction, Lead, LeadStatus, LeadType, Task, TaskStatus, TaskType,
};

use crate::{LeadCounts, LeadFilter, LeadStore};

#[derive(Default)]
struct Inner {
    leads: HashMap<String, Lead>,
    /// identity key -> lead_id
    identity_index: HashMap<String, String>,
    interactions: Vec<Interaction>,
    tasks: Vec<Task>,
}

#[derive(Default)]
pub struct MemoryLeadStore {
    inner: RwLock<Inner>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn get(&self, lead_id: &str) -> Result<Option<Lead>> {
        Ok(self.inner.read().await.leads.get(lead_id).cloned())
    }

    async fn get_by_identity(&self, identity: &str) -> Result<Option<Lead>> {
        let inner = self.inner.read().await;
        Ok(inner
            .identity_index
            .get(identity)
            .and_then(|id| inner.leads.get(id))
            .cloned())
    }

    async fn upsert_lead(
        &self,
        identity: &str,
        lead: &Lead,
        interaction: &Interaction,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.leads.insert(lead.lead_id.clone(), lead.clone());
        inner
            .identity_index
            .insert(identity.to_string(), lead.lead_id.clone());

        let already_recorded = inner
            .interactions
            .iter()
            .any(|i| i.lead_id == interaction.lead_id && i.source_id == interaction.source_id);
        if !already_recorded {
            inner.interactions.push(interaction.clone());
        }
        Ok(())
    }

    async fn update_lead(&self, lead: &Lead) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.leads.contains_key(&lead.lead_id) {
            anyhow::bail!("lead not found: {}", lead.lead_id);
        }
        inner.leads.insert(lead.lead_id.clone(), lead.clone());
        Ok(())
    }

    async fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>> {
        let inner = self.inner.read().await;
        let mut leads: Vec<Lead> = inner
            .leads
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.last_contact.cmp(&a.last_contact));
        Ok(leads)
    }

    async fn interaction_source_ids(&self, lead_id: &str) -> Result<HashSet<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .interactions
            .iter()
            .filter(|i| i.lead_id == lead_id)
            .map(|i| i.source_id.clone())
            .collect())
    }

    async fn interactions_for_lead(&self, lead_id: &str) -> Result<Vec<Interaction>> {
        let inner = self.inner.read().await;
        let mut out: Vec<Interaction> = inner
            .interactions
            .iter()
            .filter(|i| i.lead_id == lead_id)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.timestamp);
        Ok(out)
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        self.inner.write().await.tasks.push(task.clone());
        Ok(())
    }

    async fn pending_task_exists(&self, lead_id: &str, task_type: TaskType) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner.tasks.iter().any(|t| {
            t.lead_id == lead_id && t.task_type == task_type && t.status == TaskStatus::Pending
        }))
    }

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>> {
        let inner = self.inner.read().await;
        Ok(inner.tasks.iter().find(|t| t.task_id == task_id).cloned())
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.tasks.iter_mut().find(|t| t.task_id == task.task_id) {
            Some(slot) => {
                *slot = task.clone();
                Ok(())
            }
            None => anyhow::bail!("task not found: {}", task.task_id),
        }
    }

    async fn tasks_for_lead(&self, lead_id: &str) -> Result<Vec<Task>> {
        let inner = self.inner.read().await;
        let mut out: Vec<Task> = inner
            .tasks
            .iter()
            .filter(|t| t.lead_id == lead_id)
            .cloned()
            .collect();
        out.sort_by_key(|t| t.due_date);
        Ok(out)
    }

    async fn counts(&self) -> Result<LeadCounts> {
        let inner = self.inner.read().await;
        let total = inner.leads.len() as u64;

        let by_type = LeadType::ALL
            .iter()
            .map(|&t| {
                (
                    t,
                    inner.leads.values().filter(|l| l.lead_type == t).count() as u64,
                )
            })
            .collect();
        let by_status = LeadStatus::ALL
            .iter()
            .map(|&s| {
                (
                    s,
                    inner.leads.values().filter(|l| l.status == s).count() as u64,
                )
            })
            .collect();

        let avg_score = if total == 0 {
            0.0
        } else {
            inner.leads.values().map(|l| l.score as f64).sum::<f64>() / total as f64
        };

        let pending_tasks = inner
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count() as u64;

        Ok(LeadCounts {
            total,
            by_type,
            by_status,
            avg_score,
            pending_tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadsignal_common::types::{CommSource, Direction, InteractionType, RiskLevel};

    fn test_lead(lead_id: &str, email: &str) -> Lead {
        let now = Utc::now();
        Lead {
            lead_id: lead_id.to_string(),
            source: CommSource::Email,
            lead_type: LeadType::Customer,
            contact_name: "Test Contact".to_string(),
            contact_email: Some(email.to_string()),
            company: None,
            status: LeadStatus::New,
            score: 70,
            confidence: 0.8,
            signals: vec!["pricing".to_string()],
            context: "asked about pricing".to_string(),
            first_seen: now,
            last_contact: now,
            conversation_count: 1,
            risk_level: Some(RiskLevel::LikelyOk),
            foundershield_score: Some(80),
            risk_verified: true,
            next_action: "Send pricing information".to_string(),
        }
    }

    fn test_interaction(lead_id: &str, source_id: &str) -> Interaction {
        Interaction {
            interaction_id: Uuid::new_v4(),
            lead_id: lead_id.to_string(),
            interaction_type: InteractionType::EmailReceived,
            direction: Direction::Inbound,
            content_summary: "asked about pricing".to_string(),
            timestamp: Utc::now(),
            source_id: source_id.to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_by_identity() {
        let store = MemoryLeadStore::new();
        let lead = test_lead("lead-1", "a@b.com");
        store
            .upsert_lead("email:a@b.com", &lead, &test_interaction("lead-1", "m1"))
            .await
            .unwrap();

        let found = store.get_by_identity("email:a@b.com").await.unwrap();
        assert_eq!(found.unwrap().lead_id, "lead-1");
        assert!(store.get_by_identity("email:x@y.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_source_id_not_double_recorded() {
        let store = MemoryLeadStore::new();
        let lead = test_lead("lead-1", "a@b.com");
        let interaction = test_interaction("lead-1", "m1");
        store
            .upsert_lead("email:a@b.com", &lead, &interaction)
            .await
            .unwrap();
        store
            .upsert_lead("email:a@b.com", &lead, &interaction)
            .await
            .unwrap();

        let ids = store.interaction_source_ids("lead-1").await.unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.interactions_for_lead("lead-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_applies_filters() {
        let store = MemoryLeadStore::new();
        let mut high = test_lead("lead-1", "a@b.com");
        high.score = 90;
        let mut low = test_lead("lead-2", "c@d.com");
        low.score = 40;
        low.lead_type = LeadType::Partner;
        store
            .upsert_lead("email:a@b.com", &high, &test_interaction("lead-1", "m1"))
            .await
            .unwrap();
        store
            .upsert_lead("email:c@d.com", &low, &test_interaction("lead-2", "m2"))
            .await
            .unwrap();

        let filter = LeadFilter {
            min_score: Some(50),
            ..Default::default()
        };
        let leads = store.list(&filter).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].lead_id, "lead-1");

        let filter = LeadFilter {
            lead_type: Some(LeadType::Partner),
            ..Default::default()
        };
        let leads = store.list(&filter).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].lead_id, "lead-2");
    }

    #[tokio::test]
    async fn pending_task_dedup_check() {
        let store = MemoryLeadStore::new();
        let task = Task {
            task_id: Uuid::new_v4(),
            lead_id: "lead-1".to_string(),
            task_type: TaskType::FollowUp,
            description: "Follow up".to_string(),
            status: TaskStatus::Pending,
            priority: leadsignal_common::types::TaskPriority::High,
            due_date: Utc::now(),
            completed_at: None,
        };
        store.insert_task(&task).await.unwrap();

        assert!(store
            .pending_task_exists("lead-1", TaskType::FollowUp)
            .await
            .unwrap());
        assert!(!store
            .pending_task_exists("lead-1", TaskType::Demo)
            .await
            .unwrap());

        let mut done = task.clone();
        done.status = TaskStatus::Completed;
        done.completed_at = Some(Utc::now());
        store.update_task(&done).await.unwrap();
        assert!(!store
            .pending_task_exists("lead-1", TaskType::FollowUp)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn counts_aggregate() {
        let store = MemoryLeadStore::new();
        let mut a = test_lead("lead-1", "a@b.com");
        a.score = 80;
        let mut b = test_lead("lead-2", "c@d.com");
        b.score = 60;
        b.lead_type = LeadType::Investor;
        store
            .upsert_lead("email:a@b.com", &a, &test_interaction("lead-1", "m1"))
            .await
            .unwrap();
        store
            .upsert_lead("email:c@d.com", &b, &test_interaction("lead-2", "m2"))
            .await
            .unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.total, 2);
        assert!((counts.avg_score - 70.0).abs() < f64::EPSILON);
        let customers = counts
            .by_type
            .iter()
            .find(|(t, _)| *t == LeadType::Customer)
            .unwrap()
            .1;
        assert_eq!(customers, 1);
    }
}
