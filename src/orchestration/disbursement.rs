//! Loan origination against pledged collateral.

use crate::domain::{
    Collateral, CollateralId, CollateralState, Direction, Loan, LoanId, LoanState, Money,
    Movement, Percent, TillId,
};
use crate::engine::{loan_ledger, till};
use crate::error::CoreError;
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::Ledger;

/// A cashier's request to lend against an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisbursementRequest {
    /// Re-pledge a known item. A fresh id is generated when absent.
    pub collateral_id: Option<CollateralId>,
    pub description: String,
    pub appraised_value: Money,
    pub principal: Money,
    pub monthly_rate_percent: Percent,
    pub period_days: u32,
    pub disbursed_at: NaiveDate,
    /// Till that pays the principal out, if any.
    pub till_id: Option<TillId>,
}

/// Build the new loan and its collateral record.
///
/// `existing` is the stored collateral when the request names one. `today`
/// bounds the disbursement date.
fn originate(
    request: &DisbursementRequest,
    existing: Option<&Collateral>,
    today: NaiveDate,
) -> Result<(Loan, Collateral), CoreError> {
    if !request.principal.is_positive() {
        return Err(CoreError::InvalidAmount(format!(
            "principal {} must be positive",
            request.principal
        )));
    }
    till::require_whole_cents(request.principal, "principal")?;
    if request.disbursed_at > today {
        return Err(CoreError::InvalidConfiguration(format!(
            "disbursement date {} is after {}",
            request.disbursed_at, today
        )));
    }
    if request.appraised_value.is_negative() {
        return Err(CoreError::InvalidAmount(format!(
            "appraised value {} is negative",
            request.appraised_value
        )));
    }
    if request.monthly_rate_percent.is_negative() {
        return Err(CoreError::InvalidConfiguration(format!(
            "monthly rate {} is negative",
            request.monthly_rate_percent
        )));
    }
    if request.period_days == 0 {
        return Err(CoreError::InvalidConfiguration(
            "period_days must be positive".into(),
        ));
    }

    let collateral_id = request.collateral_id.unwrap_or_default();
    if let Some(stored) = existing {
        if stored.state == CollateralState::InCustody {
            return Err(CoreError::CollateralInUse(collateral_id.to_string()));
        }
    }

    let loan = Loan {
        id: LoanId::new(),
        collateral_id,
        principal: request.principal,
        monthly_rate_percent: request.monthly_rate_percent,
        disbursed_at: request.disbursed_at,
        accrual_start: request.disbursed_at,
        due_at: loan_ledger::advance_days(request.disbursed_at, request.period_days)?,
        period_days: request.period_days,
        outstanding_principal: request.principal,
        state: LoanState::Active,
        version: 0,
    };
    let collateral = Collateral {
        id: collateral_id,
        loan_id: Some(loan.id),
        description: request.description.trim().to_string(),
        appraised_value: request.appraised_value,
        state: CollateralState::InCustody,
    };
    Ok((loan, collateral))
}

impl Ledger {
    /// Create a loan and take its collateral into custody.
    ///
    /// When `till_id` is set the principal leaves that till in the same
    /// transaction; a closed till or a short drawer aborts the whole loan.
    pub async fn disburse(
        &self,
        request: DisbursementRequest,
    ) -> Result<(Loan, Option<Movement>), CoreError> {
        let mut tx = self.repo.begin_write().await?;

        let existing = match request.collateral_id {
            Some(id) => tx.get_collateral_by_id(id).await?,
            None => None,
        };
        let now = Utc::now();
        let (loan, collateral) = originate(&request, existing.as_ref(), now.date_naive())
            .inspect_err(|e| warn!(error = %e, "disbursement rejected"))?;

        tx.save_collateral(&collateral).await?;
        tx.insert_loan(&loan).await?;

        let movement = match request.till_id {
            Some(till_id) => {
                let current = tx
                    .get_till(till_id)
                    .await?
                    .ok_or_else(|| CoreError::TillNotOpen(till_id.to_string()))?;
                let reason = format!("disbursement for loan {}", loan.id);
                let (next, movement) =
                    till::record_movement(&current, Direction::Out, loan.principal, reason, now)
                        .inspect_err(|e| warn!(till_id = %till_id, error = %e, "disbursement rejected"))?;
                tx.save_till(&next).await?;
                tx.append_movement(&movement).await?;
                Some(movement)
            }
            None => None,
        };

        tx.commit().await?;

        info!(
            loan_id = %loan.id,
            collateral_id = %collateral.id,
            principal = %loan.principal,
            due_at = %loan.due_at,
            "loan disbursed"
        );
        Ok((loan, movement))
    }
}
