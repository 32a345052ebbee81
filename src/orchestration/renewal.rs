//! Renewal commits and loan read models.

use crate::domain::{Collateral, DisplayStatus, Loan, LoanId};
use crate::engine::loan_ledger::{self, PayoffQuote};
use crate::engine::renewal::{self, RenewalOutcome, RenewalRequest};
use crate::error::CoreError;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::Ledger;

/// A loan as shown to the operator on a given date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanView {
    pub loan: Loan,
    pub collateral: Collateral,
    pub display_status: DisplayStatus,
    pub quote: PayoffQuote,
}

impl Ledger {
    /// Apply a payment to a loan and commit every affected record at once.
    ///
    /// The loan, payment, collateral release, and till movement become
    /// visible together or not at all.
    pub async fn renew(&self, request: RenewalRequest) -> Result<RenewalOutcome, CoreError> {
        let mut tx = self.repo.begin_write().await?;

        if let Some(key) = request.idempotency_key.as_deref() {
            if tx.payment_key_exists(request.loan_id, key).await? {
                warn!(loan_id = %request.loan_id, key = key, "duplicate renewal ignored");
                return Err(CoreError::DuplicatePayment(key.to_string()));
            }
        }

        let loan = tx.get_loan(request.loan_id).await?;
        let collateral = tx.get_collateral(loan.id).await?;
        let till = match request.till_id {
            Some(till_id) => tx.get_till(till_id).await?,
            None => None,
        };

        let mut outcome = renewal::apply(
            &loan,
            &collateral,
            till.as_ref(),
            &request,
            &self.policy,
            Utc::now(),
        )
        .inspect_err(|e| {
            warn!(
                loan_id = %request.loan_id,
                mode = %request.mode,
                amount = %request.amount_paid,
                error = %e,
                "renewal rejected"
            )
        })?;

        outcome.loan.version = tx.save_loan(&outcome.loan).await?;
        if let Some(released) = &outcome.released_collateral {
            tx.save_collateral(released).await?;
        }
        if let (Some(next_till), Some(movement)) = (outcome.till.as_mut(), &outcome.movement) {
            next_till.version = tx.save_till(next_till).await?;
            tx.append_movement(movement).await?;
        }
        tx.append_payment(&outcome.payment).await?;

        tx.commit().await?;

        info!(
            loan_id = %outcome.loan.id,
            mode = %request.mode,
            amount = %request.amount_paid,
            outstanding = %outcome.loan.outstanding_principal,
            due_at = %outcome.loan.due_at,
            state = %outcome.loan.state,
            "renewal applied"
        );
        Ok(outcome)
    }

    /// Loan, collateral, status label, and payoff quote as of `as_of`.
    pub async fn loan_view(&self, loan_id: LoanId, as_of: NaiveDate) -> Result<LoanView, CoreError> {
        let loan = self.repo.get_loan(loan_id).await?;
        let collateral = self.repo.get_collateral(loan_id).await?;
        Ok(LoanView {
            display_status: loan_ledger::display_status(
                &loan,
                as_of,
                self.policy.at_risk_window_days,
            ),
            quote: loan_ledger::payoff_quote(&loan, as_of, &self.policy)?,
            loan,
            collateral,
        })
    }

    pub async fn payoff_quote(&self, loan_id: LoanId, as_of: NaiveDate) -> Result<PayoffQuote, CoreError> {
        let loan = self.repo.get_loan(loan_id).await?;
        loan_ledger::payoff_quote(&loan, as_of, &self.policy)
    }
}
