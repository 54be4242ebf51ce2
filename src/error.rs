//! Error types for aws-fail2ban.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WafError {
    #[error("Invalid IP address: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Change token error: {0}")]
    Token(String),

    #[error("AWS API error: {0}")]
    Transport(String),

    #[error("{operation} did not converge after {attempts} attempt(s)")]
    NotConverged { operation: String, attempts: u32 },
}

impl WafError {
    /// Fatal errors abort a convergence loop instead of driving another iteration.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WafError::Validation(_) | WafError::Configuration(_))
    }
}

pub type WafResult<T> = std::result::Result<T, WafError>;
