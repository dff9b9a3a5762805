// Lifecycle management — status state machine, next-action
// suggestions, and idempotent task generation.
//
// The suggestion table keys on (lead_type, accumulated signals,
// risk_level). A high_risk flag overrides everything: the lead is
// kept, but the only sane next action is a human look.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use leadsignal_common::error::LeadSignalError;
use leadsignal_common::types::{
    Lead, LeadStatus, LeadType, RiskLevel, Task, TaskPriority, TaskStatus, TaskType,
};
use leadsignal_store::LeadStore;

/// A planned follow-up task derived from the suggestion table.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPlan {
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub due_in_days: i64,
    pub description: String,
}

/// A next-action suggestion plus the task it implies, if any.
/// Low-priority outcomes suggest but do not create tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct NextAction {
    pub suggestion: String,
    pub task: Option<TaskPlan>,
}

fn has(signals: &[String], name: &str) -> bool {
    signals.iter().any(|s| s == name)
}

/// The suggestion lookup. Pure; shared by creation and merge paths.
pub fn suggest_next_action(
    lead_type: LeadType,
    signals: &[String],
    risk_level: Option<RiskLevel>,
) -> NextAction {
    if risk_level == Some(RiskLevel::HighRisk) {
        return NextAction {
            suggestion: "Manual review required: sender flagged high risk".to_string(),
            task: Some(TaskPlan {
                task_type: TaskType::FollowUp,
                priority: TaskPriority::High,
                due_in_days: 1,
                description: "Manually review high-risk lead before any outreach".to_string(),
            }),
        };
    }

    match lead_type {
        LeadType::Customer => {
            if has(signals, "pricing") && has(signals, "demo") {
                NextAction {
                    suggestion: "Send pricing information and schedule demo".to_string(),
                    task: Some(TaskPlan {
                        task_type: TaskType::FollowUp,
                        priority: TaskPriority::High,
                        due_in_days: 1,
                        description: "Send pricing information and schedule demo".to_string(),
                    }),
                }
            } else if has(signals, "demo") {
                NextAction {
                    suggestion: "Schedule a product demo".to_string(),
                    task: Some(TaskPlan {
                        task_type: TaskType::Demo,
                        priority: TaskPriority::High,
                        due_in_days: 2,
                        description: "Schedule a product demo".to_string(),
                    }),
                }
            } else if has(signals, "pricing") {
                NextAction {
                    suggestion: "Send pricing information".to_string(),
                    task: Some(TaskPlan {
                        task_type: TaskType::Pricing,
                        priority: TaskPriority::High,
                        due_in_days: 1,
                        description: "Send pricing information".to_string(),
                    }),
                }
            } else if has(signals, "trial") {
                NextAction {
                    suggestion: "Set up trial access and check in".to_string(),
                    task: Some(TaskPlan {
                        task_type: TaskType::FollowUp,
                        priority: TaskPriority::Medium,
                        due_in_days: 2,
                        description: "Set up trial access and check in".to_string(),
                    }),
                }
            } else {
                NextAction {
                    suggestion: "Follow up to qualify interest".to_string(),
                    task: Some(TaskPlan {
                        task_type: TaskType::FollowUp,
                        priority: TaskPriority::Medium,
                        due_in_days: 3,
                        description: "Follow up to qualify interest".to_string(),
                    }),
                }
            }
        }
        LeadType::Investor => {
            if has(signals, "term_sheet") || has(signals, "due_diligence") {
                NextAction {
                    suggestion: "Prepare data room and schedule partner call".to_string(),
                    task: Some(TaskPlan {
                        task_type: TaskType::MeetingPrep,
                        priority: TaskPriority::High,
                        due_in_days: 1,
                        description: "Prepare data room and schedule partner call".to_string(),
                    }),
                }
            } else {
                NextAction {
                    suggestion: "Share deck and schedule intro call".to_string(),
                    task: Some(TaskPlan {
                        task_type: TaskType::MeetingPrep,
                        priority: TaskPriority::Medium,
                        due_in_days: 3,
                        description: "Share deck and schedule intro call".to_string(),
                    }),
                }
            }
        }
        LeadType::Partner => {
            if has(signals, "integration") || has(signals, "white_label") {
                NextAction {
                    suggestion: "Scope integration requirements on a call".to_string(),
                    task: Some(TaskPlan {
                        task_type: TaskType::MeetingPrep,
                        priority: TaskPriority::Medium,
                        due_in_days: 3,
                        description: "Scope integration requirements on a call".to_string(),
                    }),
                }
            } else {
                NextAction {
                    suggestion: "Explore partnership fit".to_string(),
                    task: Some(TaskPlan {
                        task_type: TaskType::FollowUp,
                        priority: TaskPriority::Medium,
                        due_in_days: 5,
                        description: "Explore partnership fit".to_string(),
                    }),
                }
            }
        }
        // Low priority outcome: suggestion only, no task.
        LeadType::Other => NextAction {
            suggestion: "Review and categorize manually".to_string(),
            task: None,
        },
    }
}

pub struct LifecycleManager {
    store: Arc<dyn LeadStore>,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    /// Apply an externally-requested status transition. Undefined
    /// transitions are rejected and the lead is left unchanged.
    pub async fn update_status(
        &self,
        lead_id: &str,
        to: LeadStatus,
    ) -> Result<Lead, LeadSignalError> {
        let mut lead = self
            .store
            .get(lead_id)
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))?
            .ok_or_else(|| LeadSignalError::LeadNotFound(lead_id.to_string()))?;

        if !lead.status.can_transition_to(to) {
            return Err(LeadSignalError::InvalidStatusTransition {
                from: lead.status,
                to,
            });
        }

        let from = lead.status;
        lead.status = to;
        self.store
            .update_lead(&lead)
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))?;
        info!(lead_id = %lead.lead_id, %from, %to, "Lead status updated");
        Ok(lead)
    }

    /// Create the task implied by the lead's current next action, if
    /// one is due and no pending task of the same type exists.
    /// Returns the created task, or None when nothing was created.
    pub async fn sync_tasks(&self, lead: &Lead) -> Result<Option<Task>> {
        let action = suggest_next_action(lead.lead_type, &lead.signals, lead.risk_level);
        let Some(plan) = action.task else {
            return Ok(None);
        };

        if self
            .store
            .pending_task_exists(&lead.lead_id, plan.task_type)
            .await?
        {
            return Ok(None);
        }

        let task = Task {
            task_id: Uuid::new_v4(),
            lead_id: lead.lead_id.clone(),
            task_type: plan.task_type,
            description: plan.description,
            status: TaskStatus::Pending,
            priority: plan.priority,
            due_date: Utc::now() + Duration::days(plan.due_in_days),
            completed_at: None,
        };
        self.store.insert_task(&task).await?;
        info!(
            lead_id = %lead.lead_id,
            task_type = %task.task_type,
            priority = %task.priority,
            "Task created"
        );
        Ok(Some(task))
    }

    /// Create an explicitly-requested task (same idempotence rule as
    /// generated tasks).
    pub async fn create_task(
        &self,
        lead_id: &str,
        task_type: TaskType,
        description: &str,
        priority: TaskPriority,
        due_in_days: i64,
    ) -> Result<Task, LeadSignalError> {
        let lead = self
            .store
            .get(lead_id)
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))?
            .ok_or_else(|| LeadSignalError::LeadNotFound(lead_id.to_string()))?;

        if self
            .store
            .pending_task_exists(&lead.lead_id, task_type)
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))?
        {
            return Err(LeadSignalError::Validation(format!(
                "lead {lead_id} already has a pending {task_type} task"
            )));
        }

        let task = Task {
            task_id: Uuid::new_v4(),
            lead_id: lead.lead_id,
            task_type,
            description: description.to_string(),
            status: TaskStatus::Pending,
            priority,
            due_date: Utc::now() + Duration::days(due_in_days),
            completed_at: None,
        };
        self.store
            .insert_task(&task)
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))?;
        Ok(task)
    }

    pub async fn complete_task(&self, task_id: Uuid) -> Result<Task, LeadSignalError> {
        self.finish_task(task_id, TaskStatus::Completed).await
    }

    pub async fn cancel_task(&self, task_id: Uuid) -> Result<Task, LeadSignalError> {
        self.finish_task(task_id, TaskStatus::Cancelled).await
    }

    async fn finish_task(&self, task_id: Uuid, to: TaskStatus) -> Result<Task, LeadSignalError> {
        let mut task = self
            .store
            .get_task(task_id)
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))?
            .ok_or_else(|| LeadSignalError::TaskNotFound(task_id.to_string()))?;

        // pending -> {completed, cancelled} are the only legal moves.
        if task.status != TaskStatus::Pending {
            return Err(LeadSignalError::Validation(format!(
                "task {task_id} is {} and cannot move to {to}",
                task.status
            )));
        }

        task.status = to;
        task.completed_at = (to == TaskStatus::Completed).then(Utc::now);
        self.store
            .update_task(&task)
            .await
            .map_err(|e| LeadSignalError::Persistence(e.to_string()))?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::stored_lead;
    use leadsignal_store::MemoryLeadStore;

    #[test]
    fn pricing_and_demo_suggestion_matches_table() {
        let action = suggest_next_action(
            LeadType::Customer,
            &["pricing".to_string(), "demo".to_string()],
            Some(RiskLevel::LikelyOk),
        );
        assert_eq!(action.suggestion, "Send pricing information and schedule demo");
        let plan = action.task.unwrap();
        assert_eq!(plan.task_type, TaskType::FollowUp);
        assert_eq!(plan.priority, TaskPriority::High);
    }

    #[test]
    fn high_risk_forces_manual_review_regardless_of_type() {
        for lead_type in LeadType::ALL {
            let action = suggest_next_action(
                lead_type,
                &["pricing".to_string()],
                Some(RiskLevel::HighRisk),
            );
            assert!(action.suggestion.contains("Manual review"));
        }
    }

    #[test]
    fn other_lead_type_gets_no_task() {
        let action = suggest_next_action(LeadType::Other, &[], None);
        assert!(action.task.is_none());
    }

    #[test]
    fn investor_with_term_sheet_is_high_priority() {
        let action =
            suggest_next_action(LeadType::Investor, &["term_sheet".to_string()], None);
        let plan = action.task.unwrap();
        assert_eq!(plan.task_type, TaskType::MeetingPrep);
        assert_eq!(plan.priority, TaskPriority::High);
    }

    #[tokio::test]
    async fn update_status_rejects_undefined_transition() {
        let store = Arc::new(MemoryLeadStore::new());
        let lead = stored_lead(&*store, "a@b.com").await;
        let manager = LifecycleManager::new(store.clone());

        let err = manager
            .update_status(&lead.lead_id, LeadStatus::Converted)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LeadSignalError::InvalidStatusTransition {
                from: LeadStatus::New,
                to: LeadStatus::Converted
            }
        ));

        // State unchanged after the rejection.
        let reread = store.get(&lead.lead_id).await.unwrap().unwrap();
        assert_eq!(reread.status, LeadStatus::New);
    }

    #[tokio::test]
    async fn update_status_walks_happy_path() {
        let store = Arc::new(MemoryLeadStore::new());
        let lead = stored_lead(&*store, "a@b.com").await;
        let manager = LifecycleManager::new(store.clone());

        manager
            .update_status(&lead.lead_id, LeadStatus::Contacted)
            .await
            .unwrap();
        manager
            .update_status(&lead.lead_id, LeadStatus::Qualified)
            .await
            .unwrap();
        let done = manager
            .update_status(&lead.lead_id, LeadStatus::Converted)
            .await
            .unwrap();
        assert_eq!(done.status, LeadStatus::Converted);
    }

    #[tokio::test]
    async fn sync_tasks_is_idempotent_per_pending_type() {
        let store = Arc::new(MemoryLeadStore::new());
        let lead = stored_lead(&*store, "a@b.com").await;
        let manager = LifecycleManager::new(store.clone());

        let first = manager.sync_tasks(&lead).await.unwrap();
        assert!(first.is_some());
        let second = manager.sync_tasks(&lead).await.unwrap();
        assert!(second.is_none(), "duplicate pending task must not be created");

        // Completing the task frees the slot.
        manager.complete_task(first.unwrap().task_id).await.unwrap();
        assert!(manager.sync_tasks(&lead).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn finished_tasks_are_terminal() {
        let store = Arc::new(MemoryLeadStore::new());
        let lead = stored_lead(&*store, "a@b.com").await;
        let manager = LifecycleManager::new(store.clone());

        let task = manager.sync_tasks(&lead).await.unwrap().unwrap();
        manager.cancel_task(task.task_id).await.unwrap();
        let err = manager.complete_task(task.task_id).await.unwrap_err();
        assert!(matches!(err, LeadSignalError::Validation(_)));
    }
}
