use thiserror::Error;

pub type Result<T> = std::result::Result<T, FounderShieldError>;

#[derive(Debug, Error)]
pub enum FounderShieldError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for FounderShieldError {
    fn from(err: reqwest::Error) -> Self {
        FounderShieldError::Network(err.to_string())
    }
}
