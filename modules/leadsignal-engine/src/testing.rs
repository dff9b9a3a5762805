// Test fixtures and mocks — MOCK → FUNCTION → OUTPUT. No network, no
// database; `cargo test` in seconds.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use leadsignal_common::types::{
    CommSource, Direction, Interaction, InteractionType, Lead, LeadStatus, LeadType,
    RawCommunication, RiskAssessment, RiskLevel,
};
use leadsignal_store::LeadStore;

use crate::pipeline::sources::SourceCollector;
use crate::risk::RiskVerifier;

/// An inbound email record with sane defaults.
pub fn email_comm(source_id: &str, email: &str, body: &str) -> RawCommunication {
    RawCommunication {
        source: CommSource::Email,
        source_id: source_id.to_string(),
        sender_name: Some("Sarah Chen".to_string()),
        sender_email: (!email.is_empty()).then(|| email.to_string()),
        subject: None,
        body: body.to_string(),
        timestamp: Utc::now(),
    }
}

/// A fully-populated customer lead, as the resolver would create it
/// for a pricing+demo email.
pub fn sample_lead(email: &str) -> Lead {
    let now = Utc::now();
    Lead {
        lead_id: "lead-0000000000000001".to_string(),
        source: CommSource::Email,
        lead_type: LeadType::Customer,
        contact_name: "Sarah Chen".to_string(),
        contact_email: Some(email.to_string()),
        company: Some("techstartup".to_string()),
        status: LeadStatus::New,
        score: 85,
        confidence: 0.9,
        signals: vec!["pricing".to_string(), "demo".to_string()],
        context: "can you share pricing and schedule a demo?".to_string(),
        first_seen: now,
        last_contact: now,
        conversation_count: 1,
        risk_level: Some(RiskLevel::LikelyOk),
        foundershield_score: Some(80),
        risk_verified: true,
        next_action: "Send pricing information and schedule demo".to_string(),
    }
}

/// Insert a sample lead (with its first interaction) into a store and
/// return it.
pub async fn stored_lead(store: &dyn LeadStore, email: &str) -> Lead {
    let lead = sample_lead(email);
    let interaction = Interaction {
        interaction_id: Uuid::new_v4(),
        lead_id: lead.lead_id.clone(),
        interaction_type: InteractionType::EmailReceived,
        direction: Direction::Inbound,
        content_summary: lead.context.clone(),
        timestamp: lead.first_seen,
        source_id: "seed-1".to_string(),
    };
    store
        .upsert_lead(&format!("email:{email}"), &lead, &interaction)
        .await
        .expect("seed upsert");
    lead
}

/// Collector over a fixed record list.
pub struct StaticCollector {
    source: CommSource,
    records: Vec<RawCommunication>,
}

impl StaticCollector {
    pub fn new(source: CommSource, records: Vec<RawCommunication>) -> Self {
        Self { source, records }
    }
}

#[async_trait]
impl SourceCollector for StaticCollector {
    fn source(&self) -> CommSource {
        self.source
    }

    async fn collect(&self, _days_back: u32) -> Result<Vec<RawCommunication>> {
        Ok(self.records.clone())
    }
}

/// Collector that always fails, for continue-on-failure coverage.
pub struct FailingCollector;

#[async_trait]
impl SourceCollector for FailingCollector {
    fn source(&self) -> CommSource {
        CommSource::Calendar
    }

    async fn collect(&self, _days_back: u32) -> Result<Vec<RawCommunication>> {
        anyhow::bail!("upstream collector unavailable")
    }
}

/// Verifier returning a fixed assessment, counting calls.
pub struct FixedRiskVerifier {
    assessment: RiskAssessment,
    pub calls: AtomicU32,
}

impl FixedRiskVerifier {
    pub fn new(assessment: RiskAssessment) -> Self {
        Self {
            assessment,
            calls: AtomicU32::new(0),
        }
    }

    pub fn likely_ok() -> Self {
        Self::new(RiskAssessment {
            score: 80,
            risk_level: RiskLevel::LikelyOk,
            verified: true,
        })
    }

    pub fn high_risk() -> Self {
        Self::new(RiskAssessment {
            score: 5,
            risk_level: RiskLevel::HighRisk,
            verified: true,
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RiskVerifier for FixedRiskVerifier {
    async fn assess(&self, _email: &str, _body: &str) -> Result<RiskAssessment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.assessment)
    }
}

/// Verifier that always errors, simulating an unreachable service.
pub struct FailingRiskVerifier;

#[async_trait]
impl RiskVerifier for FailingRiskVerifier {
    async fn assess(&self, _email: &str, _body: &str) -> Result<RiskAssessment> {
        anyhow::bail!("risk service timed out")
    }
}

/// Wire a pipeline over a memory store with the given verifier.
pub fn test_pipeline(
    store: Arc<dyn LeadStore>,
    verifier: Arc<dyn RiskVerifier>,
) -> crate::pipeline::IngestPipeline {
    use crate::lifecycle::LifecycleManager;
    use crate::resolver::IdentityResolver;
    use crate::signals::SignalMatcher;

    crate::pipeline::IngestPipeline::new(
        Arc::new(SignalMatcher::new()),
        verifier,
        Arc::new(IdentityResolver::new(store.clone())),
        Arc::new(LifecycleManager::new(store)),
        4,
    )
}
