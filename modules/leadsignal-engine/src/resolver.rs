// Identity resolution and merging — the one serialization point.
//
// Merges for the same resolved identity are mutually exclusive via a
// per-identity async lock; different identities proceed independently.
// Idempotence: an interaction whose source_id is already recorded for
// the resolved lead is a no-op, so re-ingesting a batch cannot
// double-count conversations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use leadsignal_common::identity::{company_from_email, derive_lead_id, identity_key};
use leadsignal_common::types::{
    CommSource, Direction, Interaction, InteractionType, Lead, LeadStatus, LeadType,
    RawCommunication, RiskAssessment, SignalCategory, SignalSet,
};
use leadsignal_store::LeadStore;

use crate::classifier::Classification;
use crate::lifecycle::suggest_next_action;
use crate::scorer::score;

/// Max characters of body kept as lead context / interaction summary.
const CONTEXT_CHARS: usize = 300;
const SUMMARY_CHARS: usize = 200;

/// A classified, risk-checked record ready for resolution.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub raw: RawCommunication,
    pub signals: SignalSet,
    pub classification: Classification,
    /// Present only for email-sourced records.
    pub risk: Option<RiskAssessment>,
}

/// What resolution did with a candidate.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Created(Lead),
    Merged(Lead),
    /// The source_id was already recorded for this lead; nothing written.
    DuplicateIgnored { lead_id: String },
}

pub struct IdentityResolver {
    store: Arc<dyn LeadStore>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("identity lock map poisoned");
        locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once no task holds or awaits the lock, so
    /// the map does not grow with every identity ever seen.
    fn release(&self, identity: &str) {
        let mut locks = self.locks.lock().expect("identity lock map poisoned");
        if locks
            .get(identity)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(identity);
        }
    }

    #[cfg(test)]
    fn live_lock_count(&self) -> usize {
        self.locks.lock().expect("identity lock map poisoned").len()
    }

    /// Resolve a candidate against the store and create or merge the
    /// lead, atomically per identity.
    pub async fn resolve_and_apply(&self, candidate: Candidate) -> Result<ApplyOutcome> {
        let identity = identity_key(
            candidate.raw.sender_email.as_deref(),
            candidate.raw.sender_name.as_deref(),
            candidate.raw.source,
        )
        .context("record has neither sender email nor sender name")?;

        let lock = self.lock_for(&identity);
        let outcome = {
            let _guard = lock.lock().await;
            match self.store.get_by_identity(&identity).await {
                Ok(Some(existing)) => self.merge(&identity, existing, candidate).await,
                Ok(None) => self.create(&identity, candidate).await,
                Err(e) => Err(e),
            }
        };
        drop(lock);
        self.release(&identity);
        outcome
    }

    async fn create(&self, identity: &str, candidate: Candidate) -> Result<ApplyOutcome> {
        let raw = &candidate.raw;
        let first_seen = raw.timestamp;
        let lead_id = derive_lead_id(identity, first_seen);

        let score = score(
            &candidate.signals,
            candidate.classification.category,
            candidate.risk.map(|r| r.risk_level),
            0,
        );
        let signals = all_signal_names(&candidate.signals);
        let next_action = suggest_next_action(
            candidate.classification.lead_type,
            &signals,
            candidate.risk.map(|r| r.risk_level),
        );

        let lead = Lead {
            lead_id: lead_id.clone(),
            source: raw.source,
            lead_type: candidate.classification.lead_type,
            contact_name: raw
                .sender_name
                .clone()
                .or_else(|| raw.sender_email.clone())
                .unwrap_or_default(),
            contact_email: raw.sender_email.clone(),
            company: raw.sender_email.as_deref().and_then(company_from_email),
            status: LeadStatus::New,
            score,
            confidence: candidate.classification.confidence,
            signals,
            context: truncate_chars(&raw.text(), CONTEXT_CHARS),
            first_seen,
            last_contact: first_seen,
            conversation_count: 1,
            risk_level: candidate.risk.map(|r| r.risk_level),
            foundershield_score: candidate.risk.map(|r| r.score),
            risk_verified: candidate.risk.map(|r| r.verified).unwrap_or(true),
            next_action: next_action.suggestion,
        };

        let interaction = interaction_for(&lead_id, raw);
        self.store.upsert_lead(identity, &lead, &interaction).await?;
        info!(
            lead_id = %lead.lead_id,
            lead_type = %lead.lead_type,
            score = lead.score,
            "Lead created"
        );
        Ok(ApplyOutcome::Created(lead))
    }

    async fn merge(
        &self,
        identity: &str,
        mut lead: Lead,
        candidate: Candidate,
    ) -> Result<ApplyOutcome> {
        let raw = &candidate.raw;

        let seen = self.store.interaction_source_ids(&lead.lead_id).await?;
        if seen.contains(&raw.source_id) {
            return Ok(ApplyOutcome::DuplicateIgnored {
                lead_id: lead.lead_id,
            });
        }

        // Engagement bonus counts conversations before this one.
        let prior_conversations = lead.conversation_count;
        lead.conversation_count += 1;
        lead.last_contact = lead.last_contact.max(raw.timestamp);

        // A lead created from notes or calendar has no assessment yet;
        // the first email contact supplies it. Once set, it is fixed.
        if lead.risk_level.is_none() {
            if let Some(assessment) = candidate.risk {
                lead.risk_level = Some(assessment.risk_level);
                lead.foundershield_score = Some(assessment.score);
                lead.risk_verified = assessment.verified;
            }
        }

        for name in all_signal_names(&candidate.signals) {
            if !lead.signals.contains(&name) {
                lead.signals.push(name);
            }
        }

        // lead_type is fixed at creation; score against the lead's own
        // category when it still has signals there, otherwise against
        // the candidate's winning category.
        let scoring_category = category_of(lead.lead_type)
            .filter(|&c| candidate.signals.cumulative_strength(c) > 0)
            .unwrap_or(candidate.classification.category);
        lead.score = score(
            &candidate.signals,
            scoring_category,
            lead.risk_level,
            prior_conversations,
        );
        lead.next_action =
            suggest_next_action(lead.lead_type, &lead.signals, lead.risk_level).suggestion;

        let interaction = interaction_for(&lead.lead_id, raw);
        self.store.upsert_lead(identity, &lead, &interaction).await?;
        info!(
            lead_id = %lead.lead_id,
            conversation_count = lead.conversation_count,
            score = lead.score,
            "Lead merged"
        );
        Ok(ApplyOutcome::Merged(lead))
    }
}

fn category_of(lead_type: LeadType) -> Option<SignalCategory> {
    match lead_type {
        LeadType::Customer => Some(SignalCategory::Customer),
        LeadType::Investor => Some(SignalCategory::Investor),
        LeadType::Partner => Some(SignalCategory::Partner),
        LeadType::Other => None,
    }
}

fn all_signal_names(set: &SignalSet) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for s in &set.signals {
        if !out.contains(&s.name) {
            out.push(s.name.clone());
        }
    }
    out
}

fn interaction_for(lead_id: &str, raw: &RawCommunication) -> Interaction {
    let (interaction_type, direction) = match raw.source {
        CommSource::Email => (InteractionType::EmailReceived, Direction::Inbound),
        CommSource::Calendar => (InteractionType::Meeting, Direction::Inbound),
        // Free-text notes record our own activity (calls, outreach).
        CommSource::Notes => (InteractionType::Call, Direction::Outbound),
    };
    Interaction {
        interaction_id: Uuid::new_v4(),
        lead_id: lead_id.to_string(),
        interaction_type,
        direction,
        content_summary: truncate_chars(&raw.body, SUMMARY_CHARS),
        timestamp: raw.timestamp,
        source_id: raw.source_id.clone(),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Invariant check used by tests: first_seen never trails last_contact
/// and every lead has at least one conversation.
pub fn lead_invariants_hold(lead: &Lead) -> bool {
    lead.first_seen <= lead.last_contact && lead.conversation_count >= 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::signals::SignalMatcher;
    use crate::testing::email_comm;
    use leadsignal_common::types::RiskLevel;
    use leadsignal_store::MemoryLeadStore;

    fn candidate(raw: RawCommunication, risk: Option<RiskAssessment>) -> Candidate {
        let matcher = SignalMatcher::new();
        let signals = matcher.extract(&raw);
        let classification = classify(&signals).expect("test record must classify");
        Candidate {
            raw,
            signals,
            classification,
            risk,
        }
    }

    fn verified_ok() -> Option<RiskAssessment> {
        Some(RiskAssessment {
            score: 80,
            risk_level: RiskLevel::LikelyOk,
            verified: true,
        })
    }

    #[tokio::test]
    async fn creates_lead_on_first_contact() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = IdentityResolver::new(store.clone());

        let raw = email_comm("m1", "sarah@techstartup.io", "share pricing and schedule a demo?");
        let outcome = resolver
            .resolve_and_apply(candidate(raw, verified_ok()))
            .await
            .unwrap();

        let lead = match outcome {
            ApplyOutcome::Created(l) => l,
            other => panic!("expected Created, got {other:?}"),
        };
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.conversation_count, 1);
        assert_eq!(lead.lead_type, LeadType::Customer);
        assert_eq!(lead.company.as_deref(), Some("techstartup"));
        assert!(lead_invariants_hold(&lead));
        assert_eq!(store.interactions_for_lead(&lead.lead_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_contact_merges_not_duplicates() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = IdentityResolver::new(store.clone());

        let first = email_comm("m1", "sarah@techstartup.io", "share pricing?");
        let outcome = resolver
            .resolve_and_apply(candidate(first, verified_ok()))
            .await
            .unwrap();
        let created = match outcome {
            ApplyOutcome::Created(l) => l,
            other => panic!("expected Created, got {other:?}"),
        };

        let mut second = email_comm("m2", "SARAH@techstartup.io", "can we see a demo?");
        second.timestamp = created.first_seen + chrono::Duration::hours(4);
        let outcome = resolver
            .resolve_and_apply(candidate(second, verified_ok()))
            .await
            .unwrap();

        let merged = match outcome {
            ApplyOutcome::Merged(l) => l,
            other => panic!("expected Merged, got {other:?}"),
        };
        assert_eq!(merged.lead_id, created.lead_id);
        assert_eq!(merged.conversation_count, 2);
        assert_eq!(merged.first_seen, created.first_seen, "first_seen immutable");
        assert!(merged.last_contact > created.last_contact);
        assert!(merged.signals.contains(&"pricing".to_string()));
        assert!(merged.signals.contains(&"demo".to_string()));
        assert!(lead_invariants_hold(&merged));

        // Still exactly one lead in the store.
        let all = store.list(&Default::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn same_source_id_twice_is_ignored() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = IdentityResolver::new(store.clone());

        let raw = email_comm("m1", "sarah@techstartup.io", "pricing please");
        resolver
            .resolve_and_apply(candidate(raw.clone(), verified_ok()))
            .await
            .unwrap();
        let outcome = resolver
            .resolve_and_apply(candidate(raw, verified_ok()))
            .await
            .unwrap();

        assert!(matches!(outcome, ApplyOutcome::DuplicateIgnored { .. }));
        let all = store.list(&Default::default()).await.unwrap();
        assert_eq!(all[0].conversation_count, 1, "duplicate must not double-count");
    }

    #[tokio::test]
    async fn merge_keeps_lead_type_and_risk_fields() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = IdentityResolver::new(store.clone());

        let first = email_comm("m1", "sarah@techstartup.io", "pricing please");
        let created = match resolver
            .resolve_and_apply(candidate(first, verified_ok()))
            .await
            .unwrap()
        {
            ApplyOutcome::Created(l) => l,
            other => panic!("expected Created, got {other:?}"),
        };

        // Later message full of investor language must not reclassify.
        let mut second = email_comm(
            "m2",
            "sarah@techstartup.io",
            "we also do investment and funding, here is a term sheet",
        );
        second.timestamp = created.first_seen + chrono::Duration::hours(1);
        let merged = match resolver
            .resolve_and_apply(candidate(second, None))
            .await
            .unwrap()
        {
            ApplyOutcome::Merged(l) => l,
            other => panic!("expected Merged, got {other:?}"),
        };

        assert_eq!(merged.lead_type, LeadType::Customer);
        assert_eq!(merged.foundershield_score, created.foundershield_score);
        assert_eq!(merged.risk_level, created.risk_level);
        assert_eq!(merged.context, created.context, "context immutable after creation");
        assert!(merged.signals.contains(&"term_sheet".to_string()));
    }

    #[tokio::test]
    async fn engagement_bonus_applied_on_merge() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = IdentityResolver::new(store.clone());

        let first = email_comm("m1", "sarah@techstartup.io", "pricing please");
        let created = match resolver
            .resolve_and_apply(candidate(first, verified_ok()))
            .await
            .unwrap()
        {
            ApplyOutcome::Created(l) => l,
            other => panic!("expected Created, got {other:?}"),
        };
        assert_eq!(created.score, 70);

        let mut second = email_comm("m2", "sarah@techstartup.io", "pricing again please");
        second.timestamp = created.first_seen + chrono::Duration::hours(1);
        let merged = match resolver
            .resolve_and_apply(candidate(second, None))
            .await
            .unwrap()
        {
            ApplyOutcome::Merged(l) => l,
            other => panic!("expected Merged, got {other:?}"),
        };
        // 70 + min(25, 5 * 1) = 75
        assert_eq!(merged.score, 75);
    }

    #[tokio::test]
    async fn name_only_records_resolve_within_source() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = IdentityResolver::new(store.clone());

        let mut note = email_comm("n1", "", "call notes: wants pricing");
        note.source = CommSource::Notes;
        note.source_id = "n1".to_string();
        note.sender_email = None;
        note.sender_name = Some("Sarah Chen".to_string());

        let mut again = note.clone();
        again.source_id = "n2".to_string();
        again.sender_name = Some("sarah  chen".to_string());
        again.timestamp = note.timestamp + chrono::Duration::days(1);

        resolver.resolve_and_apply(candidate(note, None)).await.unwrap();
        let outcome = resolver.resolve_and_apply(candidate(again, None)).await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::Merged(_)));
    }

    #[tokio::test]
    async fn concurrent_same_identity_creates_one_lead() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = Arc::new(IdentityResolver::new(store.clone()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                let raw = email_comm(
                    &format!("m{i}"),
                    "sarah@techstartup.io",
                    "pricing please",
                );
                resolver.resolve_and_apply(candidate(raw, None)).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let all = store.list(&Default::default()).await.unwrap();
        assert_eq!(all.len(), 1, "racing ingestions must not duplicate the lead");
        assert_eq!(all[0].conversation_count, 8);
        assert_eq!(resolver.live_lock_count(), 0);
    }

    #[tokio::test]
    async fn first_email_merge_backfills_risk_fields() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = IdentityResolver::new(store.clone());

        // Notes record carries the email address but no assessment.
        let mut note = email_comm("n1", "spam@sketchy.biz", "call notes: wants pricing");
        note.source = CommSource::Notes;
        let created = match resolver.resolve_and_apply(candidate(note, None)).await.unwrap() {
            ApplyOutcome::Created(l) => l,
            other => panic!("expected Created, got {other:?}"),
        };
        assert!(created.risk_level.is_none());

        let mut email = email_comm("m2", "spam@sketchy.biz", "pricing and a demo please");
        email.timestamp = created.first_seen + chrono::Duration::hours(1);
        let flagged = Some(RiskAssessment {
            score: 5,
            risk_level: RiskLevel::HighRisk,
            verified: true,
        });
        let merged = match resolver
            .resolve_and_apply(candidate(email, flagged))
            .await
            .unwrap()
        {
            ApplyOutcome::Merged(l) => l,
            other => panic!("expected Merged, got {other:?}"),
        };

        assert_eq!(merged.risk_level, Some(RiskLevel::HighRisk));
        assert_eq!(merged.foundershield_score, Some(5));
        assert!(merged.risk_verified);
        // (70 + 15) * 0.5 + 5 = 47.5 -> 48
        assert_eq!(merged.score, 48);
        assert!(merged.next_action.contains("Manual review"));
    }

    #[tokio::test]
    async fn later_assessments_do_not_overwrite_risk_fields() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = IdentityResolver::new(store.clone());

        let first = email_comm("m1", "sarah@techstartup.io", "pricing please");
        resolver
            .resolve_and_apply(candidate(first, verified_ok()))
            .await
            .unwrap();

        let mut second = email_comm("m2", "sarah@techstartup.io", "pricing again");
        second.timestamp = chrono::Utc::now() + chrono::Duration::hours(1);
        let worse = Some(RiskAssessment {
            score: 5,
            risk_level: RiskLevel::HighRisk,
            verified: true,
        });
        let merged = match resolver
            .resolve_and_apply(candidate(second, worse))
            .await
            .unwrap()
        {
            ApplyOutcome::Merged(l) => l,
            other => panic!("expected Merged, got {other:?}"),
        };
        assert_eq!(merged.risk_level, Some(RiskLevel::LikelyOk));
        assert_eq!(merged.foundershield_score, Some(80));
    }

    #[tokio::test]
    async fn identity_locks_released_after_apply() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = IdentityResolver::new(store);

        for i in 0..3 {
            let raw = email_comm(
                &format!("m{i}"),
                &format!("user{i}@corp{i}.com"),
                "pricing please",
            );
            resolver.resolve_and_apply(candidate(raw, None)).await.unwrap();
        }
        assert_eq!(resolver.live_lock_count(), 0);
    }

    #[tokio::test]
    async fn record_without_identity_is_an_error() {
        let store = Arc::new(MemoryLeadStore::new());
        let resolver = IdentityResolver::new(store);

        let mut raw = email_comm("m1", "", "pricing please");
        raw.sender_email = None;
        raw.sender_name = None;
        assert!(resolver.resolve_and_apply(candidate(raw, None)).await.is_err());
    }
}
