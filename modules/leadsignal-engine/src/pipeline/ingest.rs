// The batch ingestion run.
//
// Extraction and classification are pure and run in record order. The
// risk check is the only network-bound step, so it fans out with
// bounded concurrency and a neutral fallback. Resolution and merging
// go through the per-identity serialization point one record at a
// time, and the run can be cancelled between records — a merge is
// applied atomically or not at all.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use leadsignal_common::types::{CommSource, RawCommunication, RiskAssessment};

use crate::classifier::classify;
use crate::lifecycle::LifecycleManager;
use crate::pipeline::stats::{CollectStats, FailedRecord};
use crate::resolver::{ApplyOutcome, Candidate, IdentityResolver};
use crate::risk::RiskVerifier;
use crate::signals::SignalMatcher;

/// Cooperative cancellation for a collection run. Cancelling stops the
/// run at the next record boundary; the record in flight completes.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub struct IngestPipeline {
    matcher: Arc<SignalMatcher>,
    verifier: Arc<dyn RiskVerifier>,
    resolver: Arc<IdentityResolver>,
    lifecycle: Arc<LifecycleManager>,
    risk_concurrency: usize,
}

impl IngestPipeline {
    pub fn new(
        matcher: Arc<SignalMatcher>,
        verifier: Arc<dyn RiskVerifier>,
        resolver: Arc<IdentityResolver>,
        lifecycle: Arc<LifecycleManager>,
        risk_concurrency: usize,
    ) -> Self {
        Self {
            matcher,
            verifier,
            resolver,
            lifecycle,
            risk_concurrency: risk_concurrency.max(1),
        }
    }

    /// Process one batch of raw communications end to end. Always
    /// returns stats; per-record failures are reported there, never as
    /// a run-level error.
    pub async fn run(&self, records: Vec<RawCommunication>, cancel: &CancelToken) -> CollectStats {
        let mut stats = CollectStats::default();

        // --- Extract + classify (pure, in order) ---
        let mut candidates = Vec::new();
        for raw in records {
            stats.records_seen += 1;
            stats.record_source(raw.source);

            let signals = self.matcher.extract(&raw);
            match classify(&signals) {
                Some(classification) => candidates.push(Candidate {
                    raw,
                    signals,
                    classification,
                    risk: None,
                }),
                None => {
                    debug!(source_id = raw.source_id.as_str(), "No signals matched, record skipped");
                    stats.skipped_no_signals += 1;
                }
            }
        }

        // --- Risk verification, email candidates only ---
        let candidates: Vec<Candidate> = stream::iter(candidates.into_iter().map(|c| {
            let verifier = self.verifier.clone();
            async move { verify_candidate(verifier, c).await }
        }))
        .buffered(self.risk_concurrency)
        .collect()
        .await;

        stats.risk_unverified = candidates
            .iter()
            .filter(|c| matches!(c.risk, Some(r) if !r.verified))
            .count() as u32;

        // --- Resolve + merge, cancellable between records ---
        for candidate in candidates {
            if cancel.is_cancelled() {
                info!("Collection run cancelled");
                stats.cancelled = true;
                break;
            }

            let source_id = candidate.raw.source_id.clone();
            match self.resolver.resolve_and_apply(candidate).await {
                Ok(ApplyOutcome::Created(lead)) => {
                    stats.record_created(lead.lead_type);
                    self.sync_tasks(&lead, &mut stats).await;
                }
                Ok(ApplyOutcome::Merged(lead)) => {
                    stats.leads_merged += 1;
                    self.sync_tasks(&lead, &mut stats).await;
                }
                Ok(ApplyOutcome::DuplicateIgnored { lead_id }) => {
                    debug!(source_id = source_id.as_str(), lead_id = lead_id.as_str(), "Already ingested");
                    stats.duplicates_ignored += 1;
                }
                Err(e) => {
                    warn!(source_id = source_id.as_str(), error = %e, "Record failed, continuing batch");
                    stats.failed.push(FailedRecord {
                        source_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        stats
    }

    async fn sync_tasks(&self, lead: &leadsignal_common::types::Lead, stats: &mut CollectStats) {
        match self.lifecycle.sync_tasks(lead).await {
            Ok(Some(_)) => stats.tasks_created += 1,
            Ok(None) => {}
            Err(e) => {
                warn!(lead_id = lead.lead_id.as_str(), error = %e, "Task creation failed");
                stats.failed.push(FailedRecord {
                    source_id: lead.lead_id.clone(),
                    reason: format!("task creation failed: {e}"),
                });
            }
        }
    }
}

/// Attach a risk assessment to an email candidate. Service failure
/// falls back to the neutral unverified assessment — a lead is never
/// dropped because verification was unavailable.
async fn verify_candidate(verifier: Arc<dyn RiskVerifier>, mut candidate: Candidate) -> Candidate {
    if candidate.raw.source != CommSource::Email {
        return candidate;
    }
    let Some(email) = candidate.raw.sender_email.clone() else {
        return candidate;
    };

    candidate.risk = match verifier.assess(&email, &candidate.raw.body).await {
        Ok(assessment) => Some(assessment),
        Err(e) => {
            warn!(email = email.as_str(), error = %e, "Risk verification unavailable, using neutral fallback");
            Some(RiskAssessment::unverified())
        }
    };
    candidate
}
