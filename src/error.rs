use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::MoneyError;

/// Typed failures of the ledger core. Every failure aborts the whole operation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Loan {0} is not active")]
    LoanNotActive(String),
    #[error("Insufficient amount: {required} required, {paid} paid")]
    InsufficientAmount { required: String, paid: String },
    #[error("Operator {0} already has an open till")]
    TillAlreadyOpen(String),
    #[error("Till {0} is not open")]
    TillNotOpen(String),
    /// The till balance is deliberately absent so an open till stays blind.
    #[error("Insufficient funds in till {till} for {requested}")]
    InsufficientFunds { till: String, requested: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Collateral {0} already secures an active loan")]
    CollateralInUse(String),
    #[error("Duplicate payment for idempotency key {0}")]
    DuplicatePayment(String),
    #[error("Concurrent modification of {0}")]
    ConcurrentModification(String),
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl CoreError {
    /// Stable snake_case name used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidAmount(_) => "invalid_amount",
            CoreError::DivisionByZero => "division_by_zero",
            CoreError::LoanNotActive(_) => "loan_not_active",
            CoreError::InsufficientAmount { .. } => "insufficient_amount",
            CoreError::TillAlreadyOpen(_) => "till_already_open",
            CoreError::TillNotOpen(_) => "till_not_open",
            CoreError::InsufficientFunds { .. } => "insufficient_funds",
            CoreError::InvalidConfiguration(_) => "invalid_configuration",
            CoreError::NotFound(_) => "not_found",
            CoreError::CollateralInUse(_) => "collateral_in_use",
            CoreError::DuplicatePayment(_) => "duplicate_payment",
            CoreError::ConcurrentModification(_) => "concurrent_modification",
            CoreError::Storage(_) => "storage",
            CoreError::CorruptRecord(_) => "corrupt_record",
        }
    }
}

impl From<MoneyError> for CoreError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::InvalidAmount(raw) => CoreError::InvalidAmount(raw),
            MoneyError::DivisionByZero => CoreError::DivisionByZero,
            MoneyError::Overflow(what) => CoreError::InvalidAmount(format!("overflow in {}", what)),
        }
    }
}

/// HTTP-facing error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Core(err) => {
                let status = match &err {
                    CoreError::InvalidAmount(_)
                    | CoreError::DivisionByZero
                    | CoreError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::LoanNotActive(_)
                    | CoreError::TillAlreadyOpen(_)
                    | CoreError::TillNotOpen(_)
                    | CoreError::CollateralInUse(_)
                    | CoreError::DuplicatePayment(_)
                    | CoreError::ConcurrentModification(_) => StatusCode::CONFLICT,
                    CoreError::InsufficientAmount { .. } | CoreError::InsufficientFunds { .. } => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    CoreError::Storage(_) | CoreError::CorruptRecord(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "request failed");
                }
                (status, err.kind(), err.to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}
