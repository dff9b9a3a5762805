// Risk verification seam. The FounderShield check is best-effort
// enrichment, not a gate: when the service is unreachable the pipeline
// substitutes the neutral unverified assessment and keeps going.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use foundershield_client::FounderShieldClient;
use leadsignal_common::identity::email_domain;
use leadsignal_common::types::{RiskAssessment, RiskLevel};

#[async_trait]
pub trait RiskVerifier: Send + Sync {
    /// Assess one sender. Only called for email-sourced records.
    async fn assess(&self, email: &str, body: &str) -> Result<RiskAssessment>;
}

pub struct FounderShieldVerifier {
    client: FounderShieldClient,
}

impl FounderShieldVerifier {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Self {
        Self {
            client: FounderShieldClient::new(base_url, api_key, timeout),
        }
    }
}

#[async_trait]
impl RiskVerifier for FounderShieldVerifier {
    async fn assess(&self, email: &str, body: &str) -> Result<RiskAssessment> {
        let domain = email_domain(email);
        let resp = self.client.check(email, &domain, body).await?;
        Ok(RiskAssessment {
            score: resp.score.min(100),
            risk_level: RiskLevel::from_str_loose(&resp.risk_level),
            verified: true,
        })
    }
}

/// Used when no FounderShield credentials are configured. Every lead
/// carries the neutral assessment and the unverified marker.
pub struct NoopVerifier;

#[async_trait]
impl RiskVerifier for NoopVerifier {
    async fn assess(&self, _email: &str, _body: &str) -> Result<RiskAssessment> {
        Ok(RiskAssessment::unverified())
    }
}
