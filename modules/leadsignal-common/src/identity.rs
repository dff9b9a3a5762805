// Identity normalization and deterministic lead-id derivation.
//
// The matching key for identity resolution is the normalized contact
// email when present, otherwise normalized contact name + source.

use chrono::{DateTime, Utc};

use crate::types::CommSource;

/// Lowercase and trim an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Lowercase, trim, and collapse internal whitespace in a contact name.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The resolver's matching key: normalized email if present, otherwise
/// normalized name scoped by source.
pub fn identity_key(email: Option<&str>, name: Option<&str>, source: CommSource) -> Option<String> {
    if let Some(e) = email {
        let e = normalize_email(e);
        if !e.is_empty() {
            return Some(format!("email:{e}"));
        }
    }
    if let Some(n) = name {
        let n = normalize_name(n);
        if !n.is_empty() {
            return Some(format!("name:{source}:{n}"));
        }
    }
    None
}

/// Extract the sending domain from an email address.
pub fn email_domain(email: &str) -> String {
    normalize_email(email)
        .rsplit('@')
        .next()
        .unwrap_or("")
        .to_string()
}

/// Freemail providers that never indicate a company.
const FREEMAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "outlook.com",
    "hotmail.com",
    "icloud.com",
    "aol.com",
    "proton.me",
    "protonmail.com",
];

/// Best-effort company name from a corporate email domain
/// ("sarah@techstartup.io" -> "techstartup"). None for freemail.
pub fn company_from_email(email: &str) -> Option<String> {
    let domain = email_domain(email);
    if domain.is_empty() || !domain.contains('.') {
        return None;
    }
    if FREEMAIL_DOMAINS.contains(&domain.as_str()) {
        return None;
    }
    domain.split('.').next().map(str::to_string)
}

/// Fast hash for idempotence checks. Not cryptographic.
pub fn content_hash(content: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Stable lead id derived from the identity key and first-seen epoch.
/// The same contact seen again resolves to the existing lead before
/// this is ever recomputed, so the epoch never drifts.
pub fn derive_lead_id(identity: &str, first_seen: DateTime<Utc>) -> String {
    let epoch = first_seen.timestamp();
    format!("lead-{:016x}", content_hash(&format!("{identity}:{epoch}")))
}
