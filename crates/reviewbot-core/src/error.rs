use thiserror::Error;

/// Invalid construction parameters or settings. Always fatal to start-up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max operations per minute must be positive, got {0}")]
    NonPositiveRate(i64),
    #[error("worker count must be positive, got {0}")]
    NonPositiveWorkers(i64),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
    #[error("missing required setting: {0}")]
    Missing(String),
}

impl ConfigError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid { name: name.into(), reason: reason.into() }
    }
}
