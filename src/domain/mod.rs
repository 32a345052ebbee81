//! Domain types for the pawn-shop ledger.
//!
//! This module provides:
//! - Exact money and percentage types (no binary floating point)
//! - Entity identifiers
//! - Loan, Collateral, Payment, Till, Movement, and Reconciliation records

pub mod loan;
pub mod money;
pub mod payment;
pub mod percent;
pub mod primitives;
pub mod till;

pub use loan::{Collateral, CollateralState, DisplayStatus, Loan, LoanState};
pub use money::{Money, MoneyError};
pub use payment::{Payment, RenewalMode};
pub use percent::Percent;
pub use primitives::{CollateralId, LoanId, MovementId, OperatorId, PaymentId, TillId};
pub use till::{Direction, Movement, Reconciliation, ReconciliationOutcome, Till, TillState};
