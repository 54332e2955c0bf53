//! Contains the SQLite backed implementations of the store traits.

mod group;
mod ledger;
mod plan;

pub use group::SQLiteGroupStore;
pub use ledger::SQLiteLedgerStore;
pub use plan::SQLitePaymentPlanStore;

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, db::initialize};

/// The SQLite backed stores, sharing one connection.
///
/// Sharing the connection is load-bearing: it is the mutual-exclusion
/// scope that serializes the resolve-then-append sequence of concurrent
/// transfers.
#[derive(Debug, Clone)]
pub struct SQLiteStores {
    /// The append-only transaction log.
    pub ledger: SQLiteLedgerStore,
    /// The recurring transfer definitions.
    pub plans: SQLitePaymentPlanStore,
    /// Groups and memberships.
    pub groups: SQLiteGroupStore,
}

/// Create the SQLite backed stores over `connection`.
///
/// This function will modify the database by adding the tables for the
/// domain models.
///
/// # Errors
/// Returns an error if the schema could not be created.
pub fn create_stores(connection: Connection) -> Result<SQLiteStores, Error> {
    initialize(&connection)?;

    let connection = Arc::new(Mutex::new(connection));

    Ok(SQLiteStores {
        ledger: SQLiteLedgerStore::new(connection.clone()),
        plans: SQLitePaymentPlanStore::new(connection.clone()),
        groups: SQLiteGroupStore::new(connection),
    })
}
