use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::tills::MovementDto;
use crate::api::{as_of_or_today, parse_id, AppState};
use crate::domain::{Loan, LoanId, Money, Payment, Percent, RenewalMode};
use crate::engine::{PayoffQuote, RenewalOutcome, RenewalRequest};
use crate::error::{AppError, CoreError};
use crate::orchestration::{DisbursementRequest, LoanView};

/// Read-only views may look at any date. Mutations always use the server date.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsOfQuery {
    pub as_of: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisburseBody {
    pub collateral_id: Option<String>,
    pub description: String,
    pub appraised_value: String,
    pub principal: String,
    pub monthly_rate_percent: String,
    pub period_days: u32,
    pub till_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisburseResponse {
    pub loan: Loan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement: Option<MovementDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewBody {
    pub mode: String,
    pub amount_paid: String,
    pub till_id: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalResponse {
    #[serde(flatten)]
    pub outcome: RenewalOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement: Option<MovementDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsResponse {
    pub loan_id: LoanId,
    pub payment_count: usize,
    pub total_paid: Money,
    pub payments: Vec<Payment>,
}

pub async fn disburse(
    State(state): State<AppState>,
    Json(body): Json<DisburseBody>,
) -> Result<(StatusCode, Json<DisburseResponse>), AppError> {
    let request = DisbursementRequest {
        collateral_id: body
            .collateral_id
            .as_deref()
            .map(|raw| parse_id(raw, "collateral"))
            .transpose()?,
        description: body.description,
        appraised_value: Money::parse(&body.appraised_value).map_err(CoreError::from)?,
        principal: Money::parse(&body.principal).map_err(CoreError::from)?,
        monthly_rate_percent: Percent::parse(&body.monthly_rate_percent)
            .map_err(CoreError::from)?,
        period_days: body.period_days,
        disbursed_at: Utc::now().date_naive(),
        till_id: body
            .till_id
            .as_deref()
            .map(|raw| parse_id(raw, "till"))
            .transpose()?,
    };

    let (loan, movement) = state.ledger.disburse(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(DisburseResponse {
            loan,
            movement: movement.as_ref().map(MovementDto::from),
        }),
    ))
}

pub async fn get_loan(
    Path(id): Path<String>,
    Query(params): Query<AsOfQuery>,
    State(state): State<AppState>,
) -> Result<Json<LoanView>, AppError> {
    let loan_id: LoanId = parse_id(&id, "loan")?;
    let as_of = as_of_or_today(params.as_of.as_deref())?;
    Ok(Json(state.ledger.loan_view(loan_id, as_of).await?))
}

pub async fn get_quote(
    Path(id): Path<String>,
    Query(params): Query<AsOfQuery>,
    State(state): State<AppState>,
) -> Result<Json<PayoffQuote>, AppError> {
    let loan_id: LoanId = parse_id(&id, "loan")?;
    let as_of = as_of_or_today(params.as_of.as_deref())?;
    Ok(Json(state.ledger.payoff_quote(loan_id, as_of).await?))
}

pub async fn get_payments(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PaymentsResponse>, AppError> {
    let loan_id: LoanId = parse_id(&id, "loan")?;
    let repo = state.ledger.repo();
    repo.get_loan(loan_id).await?;
    let payments = repo.list_payments(loan_id).await?;

    Ok(Json(PaymentsResponse {
        loan_id,
        payment_count: payments.len(),
        total_paid: payments.iter().map(|p| p.amount).sum(),
        payments,
    }))
}

pub async fn renew(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<RenewBody>,
) -> Result<Json<RenewalResponse>, AppError> {
    let loan_id: LoanId = parse_id(&id, "loan")?;
    let mode = body
        .mode
        .parse::<RenewalMode>()
        .map_err(|_| AppError::BadRequest(format!("Unknown renewal mode: {}", body.mode)))?;

    let request = RenewalRequest {
        loan_id,
        mode,
        amount_paid: Money::parse(&body.amount_paid).map_err(CoreError::from)?,
        till_id: body
            .till_id
            .as_deref()
            .map(|raw| parse_id(raw, "till"))
            .transpose()?,
        as_of: Utc::now().date_naive(),
        idempotency_key: body.idempotency_key.filter(|k| !k.trim().is_empty()),
    };

    let outcome = state.ledger.renew(request).await?;
    Ok(Json(RenewalResponse {
        movement: outcome.movement.as_ref().map(MovementDto::from),
        outcome,
    }))
}
