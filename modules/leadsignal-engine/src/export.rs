// CRM export — pure, stateless projection of a Lead into a
// provider-shaped payload. Closed enum dispatch: adding a CRM means
// adding a variant, and unknown target strings fail before any schema
// guessing happens.

use serde_json::{json, Value};

use leadsignal_common::error::LeadSignalError;
use leadsignal_common::types::Lead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmTarget {
    HubSpot,
    Salesforce,
    Pipedrive,
}

impl CrmTarget {
    pub fn parse(s: &str) -> Result<Self, LeadSignalError> {
        match s.to_lowercase().as_str() {
            "hubspot" => Ok(CrmTarget::HubSpot),
            "salesforce" => Ok(CrmTarget::Salesforce),
            "pipedrive" => Ok(CrmTarget::Pipedrive),
            other => Err(LeadSignalError::UnsupportedTarget(other.to_string())),
        }
    }
}

impl std::fmt::Display for CrmTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrmTarget::HubSpot => write!(f, "hubspot"),
            CrmTarget::Salesforce => write!(f, "salesforce"),
            CrmTarget::Pipedrive => write!(f, "pipedrive"),
        }
    }
}

/// Project a lead into the target CRM's shape. Never mutates the lead.
pub fn export(lead: &Lead, target: CrmTarget) -> Value {
    match target {
        CrmTarget::HubSpot => hubspot(lead),
        CrmTarget::Salesforce => salesforce(lead),
        CrmTarget::Pipedrive => pipedrive(lead),
    }
}

fn split_name(full: &str) -> (&str, &str) {
    match full.split_once(' ') {
        Some((first, last)) => (first, last),
        None => (full, ""),
    }
}

fn hubspot(lead: &Lead) -> Value {
    let (first, last) = split_name(&lead.contact_name);
    json!({
        "contact": {
            "properties": {
                "email": lead.contact_email,
                "firstname": first,
                "lastname": last,
                "company": lead.company,
                "lifecyclestage": "lead",
                "hs_lead_status": lead.status.to_string(),
            }
        },
        "deal": {
            "properties": {
                "dealname": format!("{} — {}", lead.contact_name, lead.lead_type),
                "dealstage": lead.status.to_string(),
                "pipeline": "default",
            }
        },
        "notes": [lead.context],
        "custom_fields": custom_fields(lead),
    })
}

fn salesforce(lead: &Lead) -> Value {
    let (first, last) = split_name(&lead.contact_name);
    json!({
        "Lead": {
            "FirstName": first,
            "LastName": if last.is_empty() { "Unknown" } else { last },
            "Email": lead.contact_email,
            "Company": lead.company.as_deref().unwrap_or("Unknown"),
            "Status": lead.status.to_string(),
            "LeadSource": lead.source.to_string(),
            "Description": lead.context,
        },
        "custom_fields": custom_fields(lead),
    })
}

fn pipedrive(lead: &Lead) -> Value {
    json!({
        "person": {
            "name": lead.contact_name,
            "email": lead.contact_email.as_deref().map(|e| vec![e]).unwrap_or_default(),
            "org_name": lead.company,
        },
        "deal": {
            "title": format!("{} ({})", lead.contact_name, lead.lead_type),
            "status": "open",
            "visible_to": 3,
        },
        "note": { "content": lead.context },
        "custom_fields": custom_fields(lead),
    })
}

fn custom_fields(lead: &Lead) -> Value {
    json!({
        "lead_score": lead.score,
        "lead_type": lead.lead_type.to_string(),
        "signals": lead.signals,
        "risk_level": lead.risk_level.map(|r| r.to_string()),
        "foundershield_score": lead.foundershield_score,
        "risk_verified": lead.risk_verified,
        "next_action": lead.next_action,
        "conversation_count": lead.conversation_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_lead;

    #[test]
    fn unknown_target_is_rejected() {
        let err = CrmTarget::parse("unknown_crm").unwrap_err();
        assert!(matches!(err, LeadSignalError::UnsupportedTarget(_)));
    }

    #[test]
    fn known_targets_parse_case_insensitively() {
        assert_eq!(CrmTarget::parse("HubSpot").unwrap(), CrmTarget::HubSpot);
        assert_eq!(CrmTarget::parse("SALESFORCE").unwrap(), CrmTarget::Salesforce);
        assert_eq!(CrmTarget::parse("pipedrive").unwrap(), CrmTarget::Pipedrive);
    }

    #[test]
    fn hubspot_payload_carries_score_and_signals() {
        let lead = sample_lead("sarah@techstartup.io");
        let payload = export(&lead, CrmTarget::HubSpot);
        assert_eq!(payload["custom_fields"]["lead_score"], 85);
        assert_eq!(payload["custom_fields"]["lead_type"], "customer");
        assert_eq!(payload["contact"]["properties"]["email"], "sarah@techstartup.io");
        assert!(payload["custom_fields"]["signals"]
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s == "pricing"));
    }

    #[test]
    fn salesforce_requires_non_empty_last_name() {
        let mut lead = sample_lead("cher@techstartup.io");
        lead.contact_name = "Cher".to_string();
        let payload = export(&lead, CrmTarget::Salesforce);
        assert_eq!(payload["Lead"]["LastName"], "Unknown");
        assert_eq!(payload["Lead"]["FirstName"], "Cher");
    }

    #[test]
    fn export_does_not_mutate_lead() {
        let lead = sample_lead("sarah@techstartup.io");
        let before = serde_json::to_string(&lead).unwrap();
        let _ = export(&lead, CrmTarget::Pipedrive);
        assert_eq!(serde_json::to_string(&lead).unwrap(), before);
    }
}
