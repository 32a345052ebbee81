//! Transactional use cases.
//!
//! Each operation reads the current records inside one `LedgerTx`, runs the
//! pure engine step, writes every resulting record, and commits. Any failure
//! before the commit leaves the database untouched.

mod disbursement;
mod renewal;
mod tills;

pub use disbursement::DisbursementRequest;
pub use renewal::LoanView;

use crate::db::Repository;
use crate::engine::LedgerPolicy;
use std::sync::Arc;

/// Entry point for every ledger mutation.
#[derive(Clone)]
pub struct Ledger {
    repo: Arc<Repository>,
    policy: LedgerPolicy,
}

impl Ledger {
    pub fn new(repo: Arc<Repository>, policy: LedgerPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }
}
