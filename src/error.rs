//! Error taxonomy
//!
//! Validation failures are always recovered by the resolver's clarification
//! path; assistant failures silently hand over to the keyword fallback. Only
//! dataset ingestion errors may abort a request.

use thiserror::Error;

/// Contract violations raised by the operation validator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Unsupported operation: {0}")]
    UnknownOperation(String),

    #[error("Signal not found: {0}")]
    SignalNotFound(String),

    #[error("{operation} operation requires exactly {expected} signal(s), got {found}")]
    ArityMismatch {
        operation: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid parameter for {operation}: {detail}")]
    InvalidParameter { operation: String, detail: String },
}

impl ValidationError {
    pub fn invalid(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidParameter {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::UnknownOperation(_) => "unknown_operation",
            ValidationError::SignalNotFound(_) => "signal_not_found",
            ValidationError::ArityMismatch { .. } => "arity_mismatch",
            ValidationError::InvalidParameter { .. } => "invalid_parameter",
        }
    }
}

/// Everything that can go wrong while interpreting a query.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Assistant unavailable: {0}")]
    AssistantUnavailable(String),

    #[error("Malformed assistant reply: {0}")]
    MalformedAssistantReply(String),

    #[error("Could not identify an operation or signal in the query")]
    AmbiguousQuery,
}

impl QueryError {
    /// Stable tag carried in answer metadata for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Validation(v) => v.kind(),
            QueryError::AssistantUnavailable(_) => "assistant_unavailable",
            QueryError::MalformedAssistantReply(_) => "malformed_assistant_reply",
            QueryError::AmbiguousQuery => "ambiguous_query",
        }
    }
}

/// Failures during numeric execution of an already validated request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("{operation} needs at least {needed} samples, got {found}")]
    InsufficientSamples {
        operation: String,
        needed: usize,
        found: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl OperationError {
    pub fn kind(&self) -> &'static str {
        match self {
            OperationError::Unsupported(_) => "unsupported_operation",
            OperationError::InsufficientSamples { .. } => "insufficient_samples",
            OperationError::InvalidInput(_) => "invalid_input",
            OperationError::Validation(v) => v.kind(),
        }
    }
}

/// Dataset ingestion failures.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Dataset contains no signals")]
    Empty,

    #[error("Malformed dataset: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(ValidationError::SignalNotFound("x".into()).kind(), "signal_not_found");
        assert_eq!(
            QueryError::from(ValidationError::UnknownOperation("warp".into())).kind(),
            "unknown_operation"
        );
        assert_eq!(QueryError::AmbiguousQuery.kind(), "ambiguous_query");
    }

    #[test]
    fn test_arity_message() {
        let err = ValidationError::ArityMismatch {
            operation: "add".into(),
            expected: 2,
            found: 1,
        };
        assert_eq!(err.to_string(), "add operation requires exactly 2 signal(s), got 1");
    }
}
