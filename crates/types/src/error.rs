use serde::{Deserialize, Serialize};

/// A single cancellation reason within a `TransactionCancelled` error, mirroring
/// the hosted service's per-item `CancellationReason` shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CancellationReason {
    pub code: String,
    pub message: Option<String>,
}

impl CancellationReason {
    pub fn none() -> Self {
        Self {
            code: "None".to_string(),
            message: None,
        }
    }

    pub fn condition_check_failed() -> Self {
        Self {
            code: "ConditionalCheckFailed".to_string(),
            message: Some("the conditional request failed".to_string()),
        }
    }

    pub fn table_not_found(name: &str) -> Self {
        Self {
            code: "ResourceNotFound".to_string(),
            message: Some(format!("table not found: {name}")),
        }
    }
}

/// Error is the single error type returned by every fallible operation of the
/// item engine. Client errors are surfaced verbatim; `Other` wraps
/// infrastructure failures (SQL engine connectivity, driver errors) that
/// propagate without translation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("table not found: {name}")]
    TableNotFound { name: String },

    #[error("invalid expression: {message}")]
    InvalidExpression { message: String },

    #[error("invalid item: {message}")]
    InvalidItem { message: String },

    #[error("item size {size} bytes exceeds the maximum of {max} bytes")]
    ItemTooLarge { size: usize, max: usize },

    #[error("the conditional request failed")]
    ConditionalCheckFailed,

    #[error("transaction cancelled")]
    TransactionCancelled { reasons: Vec<CancellationReason> },

    #[error("validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("limit exceeded: {message}")]
    LimitExceeded { message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_expression(message: impl Into<String>) -> Self {
        Error::InvalidExpression {
            message: message.into(),
        }
    }

    pub fn invalid_item(message: impl Into<String>) -> Self {
        Error::InvalidItem {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::ValidationFailed {
            message: message.into(),
        }
    }

    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        Error::LimitExceeded {
            message: message.into(),
        }
    }

    /// The hosted-service-style error code, used when translating to a
    /// `CancellationReason` inside `transactWrite`/`transactGet`.
    pub fn code(&self) -> &'static str {
        match self {
            Error::TableNotFound { .. } => "ResourceNotFound",
            Error::InvalidExpression { .. } => "ValidationException",
            Error::InvalidItem { .. } => "ValidationException",
            Error::ItemTooLarge { .. } => "ValidationException",
            Error::ConditionalCheckFailed => "ConditionalCheckFailed",
            Error::TransactionCancelled { .. } => "TransactionCanceledException",
            Error::ValidationFailed { .. } => "ValidationException",
            Error::LimitExceeded { .. } => "ValidationException",
            Error::Other(_) => "InternalServerError",
        }
    }

    pub fn as_cancellation_reason(&self) -> CancellationReason {
        CancellationReason {
            code: self.code().to_string(),
            message: Some(self.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
