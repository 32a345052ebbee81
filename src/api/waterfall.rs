use axum::Json;
use serde::Deserialize;

use crate::domain::{Money, Percent};
use crate::engine::{self, WaterfallInput, WaterfallResult};
use crate::error::{AppError, CoreError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterfallBody {
    pub capital_contributed: String,
    pub total_profit: String,
    pub hurdle_rate_percent: String,
    pub carried_interest_percent: String,
}

pub async fn distribute(Json(body): Json<WaterfallBody>) -> Result<Json<WaterfallResult>, AppError> {
    let input = WaterfallInput {
        capital_contributed: Money::parse(&body.capital_contributed).map_err(CoreError::from)?,
        total_profit: Money::parse(&body.total_profit).map_err(CoreError::from)?,
        hurdle_rate_percent: Percent::parse(&body.hurdle_rate_percent).map_err(CoreError::from)?,
        carried_interest_percent: Percent::parse(&body.carried_interest_percent)
            .map_err(CoreError::from)?,
    };
    Ok(Json(engine::distribute(&input)?))
}
