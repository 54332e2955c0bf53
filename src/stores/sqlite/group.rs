//! Implements a SQLite backed group store.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row};

use crate::{
    Error,
    database_id::{GroupId, UserId},
    db::{CreateTable, MapRow},
    models::{Group, Membership},
    stores::GroupStore,
};

/// Stores groups and memberships in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteGroupStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteGroupStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl GroupStore for SQLiteGroupStore {
    /// Create a new group in the database.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is a SQL error.
    fn create(&mut self, name: &str, description: &str) -> Result<Group, Error> {
        let group = self
            .connection
            .lock()
            .unwrap()
            .prepare(
                "INSERT INTO \"group\" (name, description) VALUES (?1, ?2)
                 RETURNING id, name, description",
            )?
            .query_row((name, description), Self::map_row)?;

        Ok(group)
    }

    /// Retrieve a group in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid group,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn get(&self, id: GroupId) -> Result<Group, Error> {
        let group = self
            .connection
            .lock()
            .unwrap()
            .prepare("SELECT id, name, description FROM \"group\" WHERE id = ?1")?
            .query_row((id.as_i64(),), Self::map_row)?;

        Ok(group)
    }

    /// Delete a group together with everything hanging off it.
    ///
    /// The cascade is explicit so it does not depend on foreign key
    /// enforcement being switched on for the connection.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid group,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn delete(&mut self, id: GroupId) -> Result<(), Error> {
        let connection = self.connection.lock().unwrap();
        let tx = connection.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM group_membership WHERE group_id = ?1",
            (id.as_i64(),),
        )?;
        tx.execute(
            "DELETE FROM ledger_entry WHERE group_id = ?1",
            (id.as_i64(),),
        )?;
        tx.execute(
            "DELETE FROM payment_plan WHERE group_id = ?1",
            (id.as_i64(),),
        )?;

        let deleted = tx.execute("DELETE FROM \"group\" WHERE id = ?1", (id.as_i64(),))?;

        if deleted == 0 {
            return Err(Error::NotFound);
        }

        tx.commit()?;

        Ok(())
    }

    fn add_member(&mut self, group: GroupId, user: UserId) -> Result<(), Error> {
        let connection = self.connection.lock().unwrap();

        group_exists(&connection, group)?;

        connection.execute(
            "INSERT INTO group_membership (group_id, user_id, is_member, is_admin)
             VALUES (?1, ?2, 1, 0)
             ON CONFLICT(group_id, user_id) DO UPDATE SET is_member = 1",
            (group.as_i64(), user.as_i64()),
        )?;

        Ok(())
    }

    /// Revoke the member role from `user`.
    ///
    /// A departing member takes their recurring transfers with them: every
    /// payment plan in the group in which they take part is deleted, with
    /// the back-references on generated entries cleared first.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if the membership does not exist,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn remove_member(&mut self, group: GroupId, user: UserId) -> Result<(), Error> {
        let connection = self.connection.lock().unwrap();
        let tx = connection.unchecked_transaction()?;

        let membership = membership_row(&tx, group, user)?;

        tx.execute(
            "UPDATE ledger_entry SET payment_plan_id = NULL
             WHERE payment_plan_id IN (
                 SELECT id FROM payment_plan
                 WHERE group_id = ?1 AND (sender_id = ?2 OR receiver_id = ?2)
             )",
            (group.as_i64(), user.as_i64()),
        )?;
        tx.execute(
            "DELETE FROM payment_plan
             WHERE group_id = ?1 AND (sender_id = ?2 OR receiver_id = ?2)",
            (group.as_i64(), user.as_i64()),
        )?;

        if membership.is_admin {
            tx.execute(
                "UPDATE group_membership SET is_member = 0 WHERE group_id = ?1 AND user_id = ?2",
                (group.as_i64(), user.as_i64()),
            )?;
        } else {
            tx.execute(
                "DELETE FROM group_membership WHERE group_id = ?1 AND user_id = ?2",
                (group.as_i64(), user.as_i64()),
            )?;
        }

        tx.commit()?;

        Ok(())
    }

    fn add_admin(&mut self, group: GroupId, user: UserId) -> Result<(), Error> {
        let connection = self.connection.lock().unwrap();

        group_exists(&connection, group)?;

        connection.execute(
            "INSERT INTO group_membership (group_id, user_id, is_member, is_admin)
             VALUES (?1, ?2, 0, 1)
             ON CONFLICT(group_id, user_id) DO UPDATE SET is_admin = 1",
            (group.as_i64(), user.as_i64()),
        )?;

        Ok(())
    }

    fn remove_admin(&mut self, group: GroupId, user: UserId) -> Result<(), Error> {
        let connection = self.connection.lock().unwrap();
        let tx = connection.unchecked_transaction()?;

        let membership = membership_row(&tx, group, user)?;

        if membership.is_member {
            tx.execute(
                "UPDATE group_membership SET is_admin = 0 WHERE group_id = ?1 AND user_id = ?2",
                (group.as_i64(), user.as_i64()),
            )?;
        } else {
            tx.execute(
                "DELETE FROM group_membership WHERE group_id = ?1 AND user_id = ?2",
                (group.as_i64(), user.as_i64()),
            )?;
        }

        tx.commit()?;

        Ok(())
    }

    fn is_member(&self, group: GroupId, user: UserId) -> Result<bool, Error> {
        has_role(&self.connection.lock().unwrap(), group, user, "is_member")
    }

    fn is_admin(&self, group: GroupId, user: UserId) -> Result<bool, Error> {
        has_role(&self.connection.lock().unwrap(), group, user, "is_admin")
    }

    fn members(&self, group: GroupId) -> Result<Vec<UserId>, Error> {
        self.connection
            .lock()
            .unwrap()
            .prepare(
                "SELECT user_id FROM group_membership
                 WHERE group_id = ?1 AND is_member = 1
                 ORDER BY user_id",
            )?
            .query_map((group.as_i64(),), |row| row.get(0).map(UserId::new))?
            .map(|maybe_id| maybe_id.map_err(Error::SqlError))
            .collect()
    }
}

/// Fail with [Error::NotFound] unless `group` exists.
fn group_exists(connection: &Connection, group: GroupId) -> Result<(), Error> {
    connection
        .prepare("SELECT id FROM \"group\" WHERE id = ?1")?
        .query_row((group.as_i64(),), |row| row.get::<_, i64>(0))
        .map(|_| ())
        .map_err(|error| error.into())
}

/// The membership row for `(group, user)`, or [Error::NotFound].
fn membership_row(
    connection: &Connection,
    group: GroupId,
    user: UserId,
) -> Result<Membership, Error> {
    let membership = connection
        .prepare(
            "SELECT group_id, user_id, is_member, is_admin FROM group_membership
             WHERE group_id = ?1 AND user_id = ?2",
        )?
        .query_row((group.as_i64(), user.as_i64()), |row| {
            Ok(Membership {
                group_id: GroupId::new(row.get(0)?),
                user_id: UserId::new(row.get(1)?),
                is_member: row.get(2)?,
                is_admin: row.get(3)?,
            })
        })?;

    Ok(membership)
}

/// Whether `(group, user)` holds `role`, one of the two role columns.
fn has_role(
    connection: &Connection,
    group: GroupId,
    user: UserId,
    role: &str,
) -> Result<bool, Error> {
    let result = connection
        .prepare(&format!(
            "SELECT 1 FROM group_membership
             WHERE group_id = ?1 AND user_id = ?2 AND {role} = 1"
        ))?
        .query_row((group.as_i64(), user.as_i64()), |row| row.get::<_, i64>(0));

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(error) => Err(error.into()),
    }
}

impl CreateTable for SQLiteGroupStore {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS \"group\" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL
                    )",
            (),
        )?;

        connection.execute(
            "CREATE TABLE IF NOT EXISTS group_membership (
                    group_id INTEGER NOT NULL,
                    user_id INTEGER NOT NULL,
                    is_member INTEGER NOT NULL DEFAULT 0,
                    is_admin INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (group_id, user_id),
                    FOREIGN KEY(group_id) REFERENCES \"group\"(id) ON DELETE CASCADE
                    )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for SQLiteGroupStore {
    type ReturnType = Group;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        Ok(Group {
            id: GroupId::new(row.get(offset)?),
            name: row.get(offset + 1)?,
            description: row.get(offset + 2)?,
        })
    }
}
