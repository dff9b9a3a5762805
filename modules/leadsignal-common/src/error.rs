use thiserror::Error;

use crate::types::LeadStatus;

#[derive(Error, Debug)]
pub enum LeadSignalError {
    #[error("Unsupported CRM export target: {0}")]
    UnsupportedTarget(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: LeadStatus, to: LeadStatus },

    #[error("Lead not found: {0}")]
    LeadNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
