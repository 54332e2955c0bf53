//! Defines the ledger store trait and the balance read path.

use crate::{
    Error,
    database_id::{EntryId, GroupId, UserId},
    models::{LedgerEntry, NewTransfer},
};

/// Handles appends to and reads from the append-only transaction log.
///
/// The log is the only source of truth for balances; there is no stored
/// balance column anywhere.
pub trait LedgerStore {
    /// Execute `transfer` and append the resulting entry to the log.
    ///
    /// Implementers must make the balance-resolve-then-append sequence
    /// atomic with respect to concurrent appends touching the same
    /// parties, and must reject transfers that would leave a non-bank
    /// sender with a negative balance. A transfer either fully commits or
    /// leaves the log untouched.
    ///
    /// # Errors
    /// - [Error::InsufficientFunds] if the sender cannot cover the amount.
    /// - [Error::SqlError] if the durable write fails.
    fn append(&mut self, transfer: &NewTransfer) -> Result<LedgerEntry, Error>;

    /// Retrieve a single entry by group and ID.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if no such entry exists in the group.
    fn get(&self, group: GroupId, id: EntryId) -> Result<LedgerEntry, Error>;

    /// Retrieve entries in the way defined by `query`.
    fn get_query(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>, Error>;

    /// Count the entries matching `query`, ignoring its pagination fields.
    fn count(&self, query: &LedgerQuery) -> Result<u64, Error>;

    /// The entry with the greatest creation order in which `user` takes
    /// part in `group`, or `None` if they have no history there.
    ///
    /// Ties in creation time are broken by entry ID, so insertion order
    /// wins within one second.
    fn most_recent_entry_for_user(
        &self,
        group: GroupId,
        user: UserId,
    ) -> Result<Option<LedgerEntry>, Error>;

    /// Derive `user`'s current balance in `group` from the log.
    ///
    /// The balance is the closing balance on the user's side of their most
    /// recent entry. A user with no ledger history has a balance of zero;
    /// that is the documented initial condition, not an error being
    /// defaulted.
    fn balance_of(&self, group: GroupId, user: UserId) -> Result<i64, Error> {
        match self.most_recent_entry_for_user(group, user)? {
            None => Ok(0),
            Some(entry) => entry
                .closing_balance(user)
                .ok_or(Error::EntryParticipantMismatch(entry.id)),
        }
    }
}

/// Defines which ledger entries [LedgerStore::get_query] should fetch.
///
/// Used for reporting; balance derivation goes through
/// [LedgerStore::most_recent_entry_for_user] instead.
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    /// The group whose ledger to read.
    pub group_id: GroupId,
    /// Only include entries in which this user takes part, on either side.
    pub participant: Option<UserId>,
    /// Only include entries with the bank on either side.
    pub bank_only: bool,
    /// Only include entries whose title contains this text.
    pub title_contains: Option<String>,
    /// Skip the first `offset` matching entries.
    pub offset: u64,
    /// Select up to `limit` entries, or all of them when `None`.
    pub limit: Option<u64>,
    /// The order to sort entries by creation time.
    pub order: SortOrder,
}

/// The order to sort entries in a [LedgerQuery].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first.
    Ascending,
    /// Newest first.
    #[default]
    Descending,
}
