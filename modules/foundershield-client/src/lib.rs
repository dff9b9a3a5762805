pub mod error;

pub use error::{FounderShieldError, Result};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Body excerpt length sent to the API. The full message body is never
/// shipped off-box.
const BODY_EXCERPT_CHARS: usize = 500;

const MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, Serialize)]
pub struct CheckRequest {
    pub email: String,
    pub domain: String,
    pub body_excerpt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckResponse {
    /// Reputation score, 0 (certain scam) to 100 (clean).
    pub score: u8,
    /// "likely_ok", "caution", or "high_risk".
    pub risk_level: String,
}

pub struct FounderShieldClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FounderShieldClient {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(String::from),
        }
    }

    /// Check a sender against the FounderShield /v1/check endpoint.
    /// Retries transient failures with doubling backoff before giving up.
    pub async fn check(&self, email: &str, domain: &str, body: &str) -> Result<CheckResponse> {
        let request = CheckRequest {
            email: email.to_string(),
            domain: domain.to_string(),
            body_excerpt: truncate_chars(body, BODY_EXCERPT_CHARS),
        };

        let mut backoff = Duration::from_millis(500);
        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            match self.check_once(&request).await {
                Ok(resp) => return Ok(resp),
                // 4xx means the request itself is bad; retrying won't help.
                Err(FounderShieldError::Api { status, message }) if status < 500 => {
                    return Err(FounderShieldError::Api { status, message });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "FounderShield check failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| FounderShieldError::Network("no attempts made".into())))
    }

    async fn check_once(&self, request: &CheckRequest) -> Result<CheckResponse> {
        let endpoint = format!("{}/v1/check", self.base_url);

        let mut req = self.client.post(&endpoint).json(request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FounderShieldError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
