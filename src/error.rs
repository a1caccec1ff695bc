use miette::Diagnostic;
use rust_decimal::Decimal;
use thiserror::Error;

/// Closed error taxonomy for the transfer core.
///
/// Every variant maps to exactly one HTTP status in the interface layer.
/// `Internal` carries a source that is logged but never shown to callers.
#[derive(Error, Diagnostic, Debug)]
pub enum PaymentError {
    #[error("validation error on '{field}': {message}")]
    #[diagnostic(code(pixflow::validation))]
    Validation { field: String, message: String },

    #[error("{resource} not found: {id}")]
    #[diagnostic(code(pixflow::not_found))]
    NotFound { resource: &'static str, id: String },

    #[error("insufficient funds: available={available:.2} required={required:.2}")]
    #[diagnostic(code(pixflow::insufficient_funds))]
    InsufficientFunds { available: Decimal, required: Decimal },

    #[error("limit exceeded [{which}]: limit={ceiling:.2} current={attempted:.2}")]
    #[diagnostic(code(pixflow::limit_exceeded))]
    LimitExceeded {
        which: &'static str,
        ceiling: Decimal,
        attempted: Decimal,
    },

    #[error("conflict: {0}")]
    #[diagnostic(code(pixflow::conflict))]
    Conflict(String),

    #[error("unauthorized: {0}")]
    #[diagnostic(code(pixflow::unauthorized))]
    Unauthorized(String),

    #[error("account blocked: {0}")]
    #[diagnostic(code(pixflow::account_blocked))]
    AccountBlocked(String),

    #[error("external service error [{service}]: {source}")]
    #[diagnostic(code(pixflow::external_service))]
    ExternalService {
        service: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("circuit breaker open for service: {service}")]
    #[diagnostic(code(pixflow::circuit_open))]
    CircuitOpen { service: &'static str },

    #[error("operation timed out: {operation}")]
    #[diagnostic(code(pixflow::timeout))]
    Timeout { operation: &'static str },

    #[error("internal error: {0}")]
    #[diagnostic(code(pixflow::internal))]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl PaymentError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn external(
        service: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ExternalService {
            service,
            source: source.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(Box::new(std::io::Error::other(message.into())))
    }

    /// Machine-readable kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::LimitExceeded { .. } => "limit_exceeded",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized(_) => "unauthorized",
            Self::AccountBlocked(_) => "account_blocked",
            Self::ExternalService { .. } => "external_service",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(Box::new(err))
    }
}

impl From<std::io::Error> for PaymentError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Internal(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_funds_message() {
        let err = PaymentError::InsufficientFunds {
            available: dec!(50),
            required: dec!(100),
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: available=50.00 required=100.00"
        );
        assert_eq!(err.kind(), "insufficient_funds");
    }

    #[test]
    fn test_validation_names_field() {
        let err = PaymentError::validation("amount", "must be positive");
        assert_eq!(
            err.to_string(),
            "validation error on 'amount': must be positive"
        );
    }
}
