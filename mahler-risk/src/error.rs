//! Error types for the risk engine.
//!
//! Malformed market data (empty series, unequal lengths, zero variance) is
//! never an error; it produces degenerate numeric results instead. Errors are
//! reserved for structurally invalid inputs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to read config: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl RiskError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

pub type RiskResult<T> = Result<T, RiskError>;
