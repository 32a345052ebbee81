use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{parse_id, AppState};
use crate::domain::{
    Direction, Money, Movement, OperatorId, Reconciliation, Till, TillId, TillState,
};
use crate::error::{AppError, CoreError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTillBody {
    pub operator_id: String,
    pub opening_balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementBody {
    pub direction: String,
    pub amount: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTillBody {
    pub physical_count: String,
    pub notes: Option<String>,
}

/// Till as exposed to operators. The running balance stays hidden while the
/// till is open so the closing count is blind.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TillDto {
    pub id: TillId,
    pub operator_id: OperatorId,
    pub state: TillState,
    pub opening_balance: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_balance: Option<Money>,
    pub opened_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<&Till> for TillDto {
    fn from(till: &Till) -> Self {
        TillDto {
            id: till.id,
            operator_id: till.operator_id.clone(),
            state: till.state,
            opening_balance: till.opening_balance,
            current_balance: (!till.is_open()).then_some(till.current_balance),
            opened_at: till.opened_at,
            closed_at: till.closed_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TillResponse {
    pub till: TillDto,
    pub movement_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<Reconciliation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementResponse {
    pub till: TillDto,
    pub movement: MovementDto,
}

/// Movement without the running balances, for the same blind-count reason.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementDto {
    pub id: String,
    pub direction: Direction,
    pub amount: Money,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Movement> for MovementDto {
    fn from(movement: &Movement) -> Self {
        MovementDto {
            id: movement.id.to_string(),
            direction: movement.direction,
            amount: movement.amount,
            reason: movement.reason.clone(),
            created_at: movement.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTillResponse {
    pub till: TillDto,
    pub reconciliation: Reconciliation,
}

pub async fn open_till(
    State(state): State<AppState>,
    Json(body): Json<OpenTillBody>,
) -> Result<(StatusCode, Json<TillDto>), AppError> {
    let operator_id = body.operator_id.trim();
    if operator_id.is_empty() {
        return Err(AppError::BadRequest("operatorId is required".into()));
    }
    let opening_balance = Money::parse(&body.opening_balance).map_err(CoreError::from)?;

    let till = state
        .ledger
        .open_till(OperatorId::new(operator_id), opening_balance)
        .await?;
    Ok((StatusCode::CREATED, Json(TillDto::from(&till))))
}

pub async fn get_till(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TillResponse>, AppError> {
    let till_id: TillId = parse_id(&id, "till")?;
    let (till, movements) = state.ledger.till_history(till_id).await?;
    let reconciliation = match till.state {
        TillState::Closed => state.ledger.repo().get_reconciliation(till_id).await?,
        TillState::Open => None,
    };

    Ok(Json(TillResponse {
        till: TillDto::from(&till),
        movement_count: movements.len(),
        reconciliation,
    }))
}

pub async fn record_movement(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<MovementBody>,
) -> Result<(StatusCode, Json<MovementResponse>), AppError> {
    let till_id: TillId = parse_id(&id, "till")?;
    let direction = body
        .direction
        .parse::<Direction>()
        .map_err(|_| AppError::BadRequest(format!("Unknown direction: {}", body.direction)))?;
    let amount = Money::parse(&body.amount).map_err(CoreError::from)?;

    let (till, movement) = state
        .ledger
        .record_movement(till_id, direction, amount, body.reason)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MovementResponse {
            till: TillDto::from(&till),
            movement: MovementDto::from(&movement),
        }),
    ))
}

pub async fn close_till(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<CloseTillBody>,
) -> Result<Json<CloseTillResponse>, AppError> {
    let till_id: TillId = parse_id(&id, "till")?;
    let physical_count = Money::parse(&body.physical_count).map_err(CoreError::from)?;

    let (till, reconciliation) = state
        .ledger
        .close_till(till_id, physical_count, body.notes)
        .await?;
    Ok(Json(CloseTillResponse {
        till: TillDto::from(&till),
        reconciliation,
    }))
}
