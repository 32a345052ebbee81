//! Pure computation engines for the ledger core.
//!
//! Nothing in here performs I/O or reads a clock; callers pass `as_of` dates and
//! timestamps explicitly and persist the returned records.

pub mod loan_ledger;
pub mod renewal;
pub mod till;
pub mod waterfall;

pub use loan_ledger::{
    accrued_interest, display_status, payoff_quote, penalty_interest, LedgerPolicy, PayoffQuote,
};
pub use renewal::{RenewalOutcome, RenewalRequest};
pub use waterfall::{distribute, CarrySplit, WaterfallInput, WaterfallResult};
