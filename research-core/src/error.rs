//! ABOUTME: Error taxonomy for the deep-research orchestrator
//! ABOUTME: Provides ResearchError, ErrorCategory, and the Result alias

use thiserror::Error;

/// Classification applied to every failure raised inside the pipeline.
///
/// Retryable set is exactly `{Network, Llm}`; everything else surfaces
/// immediately to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Network,
    Llm,
    ResourceLimit,
    Business,
    Unknown,
}

impl ErrorCategory {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Llm)
    }
}

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("llm error: {message}")]
    Llm {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("resource limit exceeded: {message}")]
    ResourceLimit { message: String },

    #[error("business rule violation: {message}")]
    Business { message: String },

    #[error("unknown error: {message}")]
    Unknown {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ResearchError {
    /// The category this error was raised with. Structured errors carry
    /// their category verbatim; this is the "trusted" path through
    /// classification described in SPEC_FULL's Error Classifier.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. } => ErrorCategory::Network,
            Self::Llm { .. } => ErrorCategory::Llm,
            Self::ResourceLimit { .. } => ErrorCategory::ResourceLimit,
            Self::Business { .. } => ErrorCategory::Business,
            Self::Unknown { .. } => ErrorCategory::Unknown,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            source: None,
        }
    }

    pub fn business(message: impl Into<String>) -> Self {
        Self::Business {
            message: message.into(),
        }
    }

    pub fn resource_limit(message: impl Into<String>) -> Self {
        Self::ResourceLimit {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
            source: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResearchError>;
