//! Till sessions: open, cash movements, blind close.

use crate::domain::{
    Direction, Money, Movement, OperatorId, Reconciliation, ReconciliationOutcome, Till, TillId,
};
use crate::engine::till;
use crate::error::CoreError;
use chrono::Utc;
use tracing::{info, warn};

use super::Ledger;

impl Ledger {
    /// Open a till for an operator who has none open.
    pub async fn open_till(
        &self,
        operator_id: OperatorId,
        opening_balance: Money,
    ) -> Result<Till, CoreError> {
        let mut tx = self.repo.begin_write().await?;
        let existing = tx.find_open_till(&operator_id).await?;
        let opened = till::open_till(operator_id, opening_balance, existing.as_ref(), Utc::now())?;
        tx.insert_till(&opened).await?;
        tx.commit().await?;

        info!(
            till_id = %opened.id,
            operator_id = %opened.operator_id,
            opening_balance = %opened.opening_balance,
            "till opened"
        );
        Ok(opened)
    }

    /// Record one manual cash movement.
    pub async fn record_movement(
        &self,
        till_id: TillId,
        direction: Direction,
        amount: Money,
        reason: String,
    ) -> Result<(Till, Movement), CoreError> {
        let mut tx = self.repo.begin_write().await?;
        let current = tx
            .get_till(till_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("till {}", till_id)))?;

        let (mut next, movement) =
            till::record_movement(&current, direction, amount, reason, Utc::now())?;
        next.version = tx.save_till(&next).await?;
        tx.append_movement(&movement).await?;
        tx.commit().await?;

        info!(
            till_id = %till_id,
            direction = direction.as_str(),
            amount = %amount,
            "till movement recorded"
        );
        Ok((next, movement))
    }

    /// Close a till against the operator's physical count.
    pub async fn close_till(
        &self,
        till_id: TillId,
        physical_count: Money,
        notes: Option<String>,
    ) -> Result<(Till, Reconciliation), CoreError> {
        let mut tx = self.repo.begin_write().await?;
        let current = tx
            .get_till(till_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("till {}", till_id)))?;

        let (mut closed, reconciliation) =
            till::close_till(&current, physical_count, notes, Utc::now())?;
        closed.version = tx.save_till(&closed).await?;
        tx.save_reconciliation(&reconciliation).await?;
        tx.commit().await?;

        if reconciliation.outcome == ReconciliationOutcome::Match {
            info!(till_id = %till_id, "till closed balanced");
        } else {
            warn!(
                till_id = %till_id,
                outcome = reconciliation.outcome.as_str(),
                variance = %reconciliation.variance,
                "till closed with variance"
            );
        }
        Ok((closed, reconciliation))
    }

    /// Till with its movement log, checked against the stored balance.
    pub async fn till_history(&self, till_id: TillId) -> Result<(Till, Vec<Movement>), CoreError> {
        let current = self.repo.get_till(till_id).await?;
        let movements = self.repo.list_movements(till_id).await?;
        till::audit_movements(&current, &movements)?;
        Ok((current, movements))
    }
}
