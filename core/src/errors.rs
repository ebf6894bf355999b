//! Error taxonomy for gateway and resolver calls.
//!
//! Every call returns either its success value or exactly one [`ChainError`].
//! None of these are fatal; the surface decides how to present them.

use thiserror::Error;

use crate::records::{RecordId, RecordKind};
use crate::store::StoreError;
use crate::token::TokenError;

/// Error category for structured logging and surface mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or invalid submission fields, or an unparseable upstream token
    Validation,
    /// Well-formed upstream token naming a record that does not exist
    Reference,
    /// Direct lookup by identifier found nothing
    NotFound,
    /// Token failed to decode on the read path
    Malformed,
    /// Underlying store failed
    Storage,
    /// Configuration could not be loaded
    Config,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Reference => "REFERENCE_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Malformed => "MALFORMED_TOKEN",
            Self::Storage => "STORAGE_ERROR",
            Self::Config => "CONFIG_ERROR",
        }
    }

    /// Whether the caller can fix the problem by changing its input
    pub fn is_client_error(self) -> bool {
        !matches!(self, Self::Storage | Self::Config)
    }
}

/// Submission rejected before anything was written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("`{field}` must be greater than zero (got {value})")]
    NonPositive { field: &'static str, value: f64 },

    #[error("`{field}` is out of range: {reason}")]
    OutOfRange {
        field: &'static str,
        reason: String,
    },

    #[error("invalid `{field}`: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("{kind} submissions require an upstream token")]
    UpstreamTokenRequired { kind: RecordKind },

    #[error("{kind} records are chain roots and take no upstream token")]
    UnexpectedUpstreamToken { kind: RecordKind },

    #[error("upstream token is malformed: {0}")]
    MalformedUpstreamToken(#[source] TokenError),

    #[error("upstream token names a {found} record; a collection token is required")]
    UpstreamNotCollection { found: RecordKind },
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("upstream {kind} record does not exist: {id}")]
    Reference { kind: RecordKind, id: RecordId },

    #[error("{kind} record not found: {id}")]
    NotFound { kind: RecordKind, id: RecordId },

    #[error("malformed token: {0}")]
    Malformed(#[from] TokenError),

    #[error("storage error: {0}")]
    Storage(#[source] StoreError),

    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ChainError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Reference { .. } => ErrorCategory::Reference,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Malformed(_) => ErrorCategory::Malformed,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Config { .. } => ErrorCategory::Config,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<StoreError> for ChainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Storage(other),
        }
    }
}

/// Result type for chain operations
pub type Result<T> = std::result::Result<T, ChainError>;
