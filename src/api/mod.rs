pub mod health;
pub mod loans;
pub mod tills;
pub mod waterfall;

use crate::config::Config;
use crate::db::Repository;
use crate::error::AppError;
use crate::orchestration::Ledger;
use axum::{
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub config: Config,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let ledger = Arc::new(Ledger::new(repo, config.ledger_policy()));
        Self { ledger, config }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/loans", post(loans::disburse))
        .route("/v1/loans/:id", get(loans::get_loan))
        .route("/v1/loans/:id/quote", get(loans::get_quote))
        .route("/v1/loans/:id/payments", get(loans::get_payments))
        .route("/v1/loans/:id/renewals", post(loans::renew))
        .route("/v1/tills", post(tills::open_till))
        .route("/v1/tills/:id", get(tills::get_till))
        .route("/v1/tills/:id/movements", post(tills::record_movement))
        .route("/v1/tills/:id/close", post(tills::close_till))
        .route("/v1/waterfall", post(waterfall::distribute))
        .layer(cors)
        .with_state(state)
}

/// Parse a path or query identifier, rejecting malformed input with 400.
fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, AppError> {
    T::from_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {} id", what)))
}

/// `asOf` query parameter, defaulting to today's UTC date.
fn as_of_or_today(raw: Option<&str>) -> Result<NaiveDate, AppError> {
    match raw {
        Some(s) => NaiveDate::from_str(s)
            .map_err(|_| AppError::BadRequest("asOf must be a YYYY-MM-DD date".into())),
        None => Ok(chrono::Utc::now().date_naive()),
    }
}
