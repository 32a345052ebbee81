//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - Repository reads and serialized ledger write transactions

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{LedgerTx, Repository};
