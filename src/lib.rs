pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, LedgerTx, Repository};
pub use domain::{
    Collateral, Direction, Loan, LoanId, Money, Movement, Payment, Percent, Reconciliation,
    RenewalMode, Till, TillId,
};
pub use error::{AppError, CoreError};
pub use orchestration::Ledger;
