//! Implements a SQLite backed ledger store.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row, params_from_iter, types::Value};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{EntryId, GroupId, UserId},
    db::{CreateTable, MapRow},
    models::{EntrySide, LedgerEntry, NewTransfer, Party},
    stores::{LedgerQuery, LedgerStore, SortOrder},
};

const ENTRY_COLUMNS: &str = "id, created, group_id, title, description, amount, \
     sender_is_bank, sender_id, new_balance_sender, \
     receiver_is_bank, receiver_id, new_balance_receiver, payment_plan_id";

/// Stores ledger entries in a SQLite database.
///
/// All stores of one database share a single connection behind a mutex, so
/// an append holds the only path to the data for its whole
/// resolve-then-insert transaction. That is what makes concurrent
/// transfers against the same account safe.
#[derive(Debug, Clone)]
pub struct SQLiteLedgerStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteLedgerStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl LedgerStore for SQLiteLedgerStore {
    /// Execute `transfer` and append the resulting entry.
    ///
    /// The balance reads and the insert run in one SQL transaction while
    /// the connection is held, so a concurrent transfer debiting the same
    /// account observes either the pre- or the post-state of this one,
    /// never a stale balance.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::InsufficientFunds] if the sender cannot cover the amount,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn append(&mut self, transfer: &NewTransfer) -> Result<LedgerEntry, Error> {
        let connection = self.connection.lock().unwrap();
        let tx = connection.unchecked_transaction()?;

        let sender = match transfer.sender {
            Party::Bank => EntrySide::Bank,
            Party::Member(id) => {
                let balance = closing_balance(&tx, transfer.group_id, id)?;

                if balance - transfer.amount < 0 {
                    return Err(Error::InsufficientFunds);
                }

                EntrySide::Member {
                    id,
                    new_balance: balance - transfer.amount,
                }
            }
        };

        let receiver = match transfer.receiver {
            Party::Bank => EntrySide::Bank,
            Party::Member(id) => {
                let balance = closing_balance(&tx, transfer.group_id, id)?;

                EntrySide::Member {
                    id,
                    new_balance: balance + transfer.amount,
                }
            }
        };

        let (sender_is_bank, sender_id, new_balance_sender) = side_columns(&sender);
        let (receiver_is_bank, receiver_id, new_balance_receiver) = side_columns(&receiver);

        let entry = tx
            .prepare(&format!(
                "INSERT INTO ledger_entry (created, group_id, title, description, amount, \
                     sender_is_bank, sender_id, new_balance_sender, \
                     receiver_is_bank, receiver_id, new_balance_receiver, payment_plan_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 RETURNING {ENTRY_COLUMNS}"
            ))?
            .query_row(
                (
                    OffsetDateTime::now_utc().unix_timestamp(),
                    transfer.group_id.as_i64(),
                    &transfer.title,
                    &transfer.description,
                    transfer.amount,
                    sender_is_bank,
                    sender_id,
                    new_balance_sender,
                    receiver_is_bank,
                    receiver_id,
                    new_balance_receiver,
                    transfer.payment_plan_id,
                ),
                Self::map_row,
            )?;

        tx.commit()?;

        Ok(entry)
    }

    /// Retrieve an entry in the database by its group and `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to an entry in the group,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn get(&self, group: GroupId, id: EntryId) -> Result<LedgerEntry, Error> {
        let entry = self
            .connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM ledger_entry WHERE group_id = ?1 AND id = ?2"
            ))?
            .query_row((group.as_i64(), id), Self::map_row)?;

        Ok(entry)
    }

    /// Query for ledger entries in the database.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is a SQL error.
    fn get_query(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>, Error> {
        let (where_clause, parameters) = build_filter(query);

        let mut query_string =
            format!("SELECT {ENTRY_COLUMNS} FROM ledger_entry WHERE {where_clause}");

        match query.order {
            SortOrder::Ascending => query_string.push_str(" ORDER BY created ASC, id ASC"),
            SortOrder::Descending => query_string.push_str(" ORDER BY created DESC, id DESC"),
        }

        if let Some(limit) = query.limit {
            query_string.push_str(&format!(" LIMIT {limit} OFFSET {}", query.offset));
        } else if query.offset > 0 {
            query_string.push_str(&format!(" LIMIT -1 OFFSET {}", query.offset));
        }

        self.connection
            .lock()
            .unwrap()
            .prepare(&query_string)?
            .query_map(params_from_iter(parameters.iter()), Self::map_row)?
            .map(|maybe_entry| maybe_entry.map_err(Error::SqlError))
            .collect()
    }

    /// Count the entries matching `query`.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is a SQL error.
    fn count(&self, query: &LedgerQuery) -> Result<u64, Error> {
        let (where_clause, parameters) = build_filter(query);

        self.connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "SELECT COUNT(id) FROM ledger_entry WHERE {where_clause}"
            ))?
            .query_row(params_from_iter(parameters.iter()), |row| {
                row.get::<_, i64>(0)
            })
            .map(|count| count as u64)
            .map_err(|error| error.into())
    }

    fn most_recent_entry_for_user(
        &self,
        group: GroupId,
        user: UserId,
    ) -> Result<Option<LedgerEntry>, Error> {
        let connection = self.connection.lock().unwrap();

        most_recent(&connection, group, user)
    }
}

/// Split an entry side into the `is_bank`, `id` and `new_balance` columns.
fn side_columns(side: &EntrySide) -> (bool, Option<i64>, Option<i64>) {
    match side {
        EntrySide::Bank => (true, None, None),
        EntrySide::Member { id, new_balance } => (false, Some(id.as_i64()), Some(*new_balance)),
    }
}

/// Read an entry side starting at the `is_bank` column.
fn side_from_row(row: &Row, offset: usize) -> Result<EntrySide, rusqlite::Error> {
    let is_bank: bool = row.get(offset)?;

    if is_bank {
        return Ok(EntrySide::Bank);
    }

    Ok(EntrySide::Member {
        id: UserId::new(row.get(offset + 1)?),
        new_balance: row.get(offset + 2)?,
    })
}

/// The most recent entry `user` takes part in within `group`, read through
/// `connection`.
///
/// Callers that need the read to be consistent with a following write must
/// run both inside one SQL transaction.
fn most_recent(
    connection: &Connection,
    group: GroupId,
    user: UserId,
) -> Result<Option<LedgerEntry>, Error> {
    let result = connection
        .prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entry \
             WHERE group_id = ?1 AND (sender_id = ?2 OR receiver_id = ?2) \
             ORDER BY created DESC, id DESC LIMIT 1"
        ))?
        .query_row((group.as_i64(), user.as_i64()), SQLiteLedgerStore::map_row);

    match result {
        Ok(entry) => Ok(Some(entry)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// The closing balance of `user` in `group`, zero without history.
fn closing_balance(connection: &Connection, group: GroupId, user: UserId) -> Result<i64, Error> {
    match most_recent(connection, group, user)? {
        None => Ok(0),
        Some(entry) => entry
            .closing_balance(user)
            .ok_or(Error::EntryParticipantMismatch(entry.id)),
    }
}

/// Assemble the WHERE clause and its parameters for `query`.
fn build_filter(query: &LedgerQuery) -> (String, Vec<Value>) {
    let mut clauses = vec!["group_id = ?1".to_string()];
    let mut parameters = vec![Value::Integer(query.group_id.as_i64())];

    if let Some(user) = query.participant {
        clauses.push(format!(
            "(sender_id = ?{n} OR receiver_id = ?{n})",
            n = parameters.len() + 1
        ));
        parameters.push(Value::Integer(user.as_i64()));
    }

    if query.bank_only {
        clauses.push("(sender_is_bank = 1 OR receiver_is_bank = 1)".to_string());
    }

    if let Some(ref text) = query.title_contains {
        clauses.push(format!("title LIKE ?{}", parameters.len() + 1));
        parameters.push(Value::Text(format!("%{text}%")));
    }

    (clauses.join(" AND "), parameters)
}

impl CreateTable for SQLiteLedgerStore {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS ledger_entry (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    created INTEGER NOT NULL,
                    group_id INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    amount INTEGER NOT NULL,
                    sender_is_bank INTEGER NOT NULL,
                    sender_id INTEGER,
                    new_balance_sender INTEGER,
                    receiver_is_bank INTEGER NOT NULL,
                    receiver_id INTEGER,
                    new_balance_receiver INTEGER,
                    payment_plan_id INTEGER,
                    FOREIGN KEY(group_id) REFERENCES \"group\"(id) ON DELETE CASCADE
                    )",
            (),
        )?;

        connection.execute(
            "CREATE INDEX IF NOT EXISTS ledger_entry_sender_idx
                 ON ledger_entry (group_id, sender_id, created)",
            (),
        )?;

        connection.execute(
            "CREATE INDEX IF NOT EXISTS ledger_entry_receiver_idx
                 ON ledger_entry (group_id, receiver_id, created)",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for SQLiteLedgerStore {
    type ReturnType = LedgerEntry;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        Ok(LedgerEntry {
            id: row.get(offset)?,
            created: row.get(offset + 1)?,
            group_id: GroupId::new(row.get(offset + 2)?),
            title: row.get(offset + 3)?,
            description: row.get(offset + 4)?,
            amount: row.get(offset + 5)?,
            sender: side_from_row(row, offset + 6)?,
            receiver: side_from_row(row, offset + 9)?,
            payment_plan_id: row.get(offset + 12)?,
        })
    }
}

#[cfg(test)]
mod sqlite_ledger_store_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        database_id::{GroupId, UserId},
        models::{EntrySide, NewTransfer, Party},
        stores::{
            GroupStore, LedgerQuery, LedgerStore, SortOrder,
            sqlite::{SQLiteLedgerStore, create_stores},
        },
    };

    fn store_with_group() -> (SQLiteLedgerStore, GroupId) {
        let stores = create_stores(Connection::open_in_memory().unwrap()).unwrap();
        let mut groups = stores.groups;
        let group = groups.create("Flat 5", "Shared flat expenses").unwrap();

        (stores.ledger, group.id)
    }

    fn transfer(group: GroupId, sender: Party, receiver: Party, amount: i64) -> NewTransfer {
        NewTransfer {
            group_id: group,
            sender,
            receiver,
            amount,
            title: "Lunch money".to_string(),
            description: String::new(),
            payment_plan_id: None,
        }
    }

    #[test]
    fn append_bakes_closing_balances_into_the_entry() {
        let (mut store, group) = store_with_group();
        let alice = UserId::new(1);

        let entry = store
            .append(&transfer(group, Party::Bank, Party::Member(alice), 100))
            .unwrap();

        assert_eq!(entry.sender, EntrySide::Bank);
        assert_eq!(
            entry.receiver,
            EntrySide::Member {
                id: alice,
                new_balance: 100
            }
        );
        assert_eq!(entry.amount, 100);
        assert_eq!(entry.payment_plan_id, None);
    }

    #[test]
    fn append_rejects_an_overdrawing_sender_and_writes_nothing() {
        let (mut store, group) = store_with_group();
        let alice = UserId::new(1);

        store
            .append(&transfer(group, Party::Bank, Party::Member(alice), 50))
            .unwrap();

        let result = store.append(&transfer(group, Party::Member(alice), Party::Bank, 51));

        assert_eq!(result, Err(Error::InsufficientFunds));

        let query = LedgerQuery {
            group_id: group,
            ..Default::default()
        };
        assert_eq!(store.count(&query), Ok(1), "no entry should be appended");
        assert_eq!(store.balance_of(group, alice), Ok(50));
    }

    #[test]
    fn balance_of_is_zero_without_history() {
        let (store, group) = store_with_group();

        assert_eq!(store.balance_of(group, UserId::new(42)), Ok(0));
    }

    #[test]
    fn balance_of_is_idempotent() {
        let (mut store, group) = store_with_group();
        let alice = UserId::new(1);

        store
            .append(&transfer(group, Party::Bank, Party::Member(alice), 75))
            .unwrap();

        let first = store.balance_of(group, alice).unwrap();
        let second = store.balance_of(group, alice).unwrap();

        assert_eq!(first, 75);
        assert_eq!(first, second);
    }

    #[test]
    fn most_recent_entry_ties_are_broken_by_insertion_order() {
        let (mut store, group) = store_with_group();
        let alice = UserId::new(1);

        // Both appends land within the same second, so `created` cannot
        // tell them apart.
        store
            .append(&transfer(group, Party::Bank, Party::Member(alice), 10))
            .unwrap();
        let last = store
            .append(&transfer(group, Party::Bank, Party::Member(alice), 20))
            .unwrap();

        let got = store.most_recent_entry_for_user(group, alice).unwrap();

        assert_eq!(got, Some(last));
        assert_eq!(store.balance_of(group, alice), Ok(30));
    }

    #[test]
    fn get_entry_fails_on_invalid_id() {
        let (mut store, group) = store_with_group();

        let entry = store
            .append(&transfer(group, Party::Bank, Party::Member(UserId::new(1)), 10))
            .unwrap();

        assert_eq!(store.get(group, entry.id + 654), Err(Error::NotFound));
    }

    #[test]
    fn get_entry_is_scoped_to_the_group() {
        let (mut store, group) = store_with_group();

        let entry = store
            .append(&transfer(group, Party::Bank, Party::Member(UserId::new(1)), 10))
            .unwrap();

        let other_group = GroupId::new(group.as_i64() + 1);

        assert_eq!(store.get(other_group, entry.id), Err(Error::NotFound));
    }

    #[test]
    fn query_filters_by_participant() {
        let (mut store, group) = store_with_group();
        let alice = UserId::new(1);
        let bob = UserId::new(2);

        store
            .append(&transfer(group, Party::Bank, Party::Member(alice), 100))
            .unwrap();
        store
            .append(&transfer(group, Party::Bank, Party::Member(bob), 100))
            .unwrap();
        store
            .append(&transfer(group, Party::Member(alice), Party::Member(bob), 25))
            .unwrap();

        let got = store
            .get_query(&LedgerQuery {
                group_id: group,
                participant: Some(alice),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(got.len(), 2, "want the two entries involving alice");
        assert!(
            got.iter()
                .all(|entry| entry.sender.is_member(alice) || entry.receiver.is_member(alice))
        );
    }

    #[test]
    fn query_filters_by_bank_side() {
        let (mut store, group) = store_with_group();
        let alice = UserId::new(1);
        let bob = UserId::new(2);

        store
            .append(&transfer(group, Party::Bank, Party::Member(alice), 100))
            .unwrap();
        store
            .append(&transfer(group, Party::Member(alice), Party::Member(bob), 25))
            .unwrap();

        let got = store
            .get_query(&LedgerQuery {
                group_id: group,
                bank_only: true,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].sender, EntrySide::Bank);
    }

    #[test]
    fn query_filters_by_title_substring() {
        let (mut store, group) = store_with_group();
        let alice = UserId::new(1);

        store
            .append(&transfer(group, Party::Bank, Party::Member(alice), 100))
            .unwrap();
        store
            .append(&NewTransfer {
                title: "Groceries week 12".to_string(),
                ..transfer(group, Party::Bank, Party::Member(alice), 40)
            })
            .unwrap();

        let got = store
            .get_query(&LedgerQuery {
                group_id: group,
                title_contains: Some("week".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].title, "Groceries week 12");
    }

    #[test]
    fn query_defaults_to_newest_first_and_paginates() {
        let (mut store, group) = store_with_group();
        let alice = UserId::new(1);

        let mut ids = Vec::new();
        for amount in 1..=5 {
            let entry = store
                .append(&transfer(group, Party::Bank, Party::Member(alice), amount))
                .unwrap();
            ids.push(entry.id);
        }

        let got = store
            .get_query(&LedgerQuery {
                group_id: group,
                offset: 1,
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();

        let got_ids: Vec<_> = got.iter().map(|entry| entry.id).collect();
        assert_eq!(got_ids, vec![ids[3], ids[2]], "want the second newest pair");

        let oldest_first = store
            .get_query(&LedgerQuery {
                group_id: group,
                order: SortOrder::Ascending,
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();

        let oldest_ids: Vec<_> = oldest_first.iter().map(|entry| entry.id).collect();
        assert_eq!(oldest_ids, vec![ids[0], ids[1]]);
    }

    #[test]
    fn count_ignores_pagination() {
        let (mut store, group) = store_with_group();
        let alice = UserId::new(1);

        for amount in 1..=4 {
            store
                .append(&transfer(group, Party::Bank, Party::Member(alice), amount))
                .unwrap();
        }

        let query = LedgerQuery {
            group_id: group,
            limit: Some(2),
            ..Default::default()
        };

        assert_eq!(store.count(&query), Ok(4));
    }
}
