//! Implements a SQLite backed payment plan store.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Row, params_from_iter, types::Value};

use crate::{
    Error,
    database_id::{GroupId, PlanId, UserId},
    db::{CreateTable, MapRow},
    models::{NewPaymentPlan, Party, PaymentPlan},
    schedule::ScheduleUnit,
    stores::{PaymentPlanStore, PlanQuery, SortOrder},
};

const PLAN_COLUMNS: &str = "id, group_id, name, description, amount, \
     sender_is_bank, sender_id, receiver_is_bank, receiver_id, \
     schedule, schedule_unit, next_execute, payment_count";

/// Stores payment plans in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLitePaymentPlanStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLitePaymentPlanStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }
}

impl PaymentPlanStore for SQLitePaymentPlanStore {
    /// Persist a validated payment plan.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is a SQL error.
    fn create(&mut self, plan: NewPaymentPlan) -> Result<PaymentPlan, Error> {
        let (sender_is_bank, sender_id) = party_columns(plan.sender);
        let (receiver_is_bank, receiver_id) = party_columns(plan.receiver);

        let created_plan = self
            .connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "INSERT INTO payment_plan (group_id, name, description, amount, \
                     sender_is_bank, sender_id, receiver_is_bank, receiver_id, \
                     schedule, schedule_unit, next_execute, payment_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 RETURNING {PLAN_COLUMNS}"
            ))?
            .query_row(
                (
                    plan.group_id.as_i64(),
                    &plan.name,
                    &plan.description,
                    plan.amount,
                    sender_is_bank,
                    sender_id,
                    receiver_is_bank,
                    receiver_id,
                    plan.schedule,
                    plan.schedule_unit.as_str(),
                    plan.next_execute,
                    plan.payments_left.map_or(-1, i64::from),
                ),
                Self::map_row,
            )?;

        Ok(created_plan)
    }

    /// Retrieve a plan in the database by its group and `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a plan in the group,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn get(&self, group: GroupId, id: PlanId) -> Result<PaymentPlan, Error> {
        let plan = self
            .connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "SELECT {PLAN_COLUMNS} FROM payment_plan WHERE group_id = ?1 AND id = ?2"
            ))?
            .query_row((group.as_i64(), id), Self::map_row)?;

        Ok(plan)
    }

    /// Query for payment plans in the database, ordered by their next
    /// execution time.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is a SQL error.
    fn get_query(&self, query: &PlanQuery) -> Result<Vec<PaymentPlan>, Error> {
        let (where_clause, parameters) = build_filter(query);

        let mut query_string =
            format!("SELECT {PLAN_COLUMNS} FROM payment_plan WHERE {where_clause}");

        match query.order {
            SortOrder::Ascending => query_string.push_str(" ORDER BY next_execute ASC, id ASC"),
            SortOrder::Descending => query_string.push_str(" ORDER BY next_execute DESC, id DESC"),
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
            .map(|maybe_plan| maybe_plan.map_err(Error::SqlError))
            .collect()
    }

    /// Count the plans matching `query`.
    ///
    /// # Errors
    /// This function will return an [Error::SqlError] if there is a SQL error.
    fn count(&self, query: &PlanQuery) -> Result<u64, Error> {
        let (where_clause, parameters) = build_filter(query);

        self.connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "SELECT COUNT(id) FROM payment_plan WHERE {where_clause}"
            ))?
            .query_row(params_from_iter(parameters.iter()), |row| {
                row.get::<_, i64>(0)
            })
            .map(|count| count as u64)
            .map_err(|error| error.into())
    }

    /// Persist `plan`'s current state.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if the plan no longer exists,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn update(&mut self, plan: &PaymentPlan) -> Result<(), Error> {
        let updated = self.connection.lock().unwrap().execute(
            "UPDATE payment_plan
             SET name = ?1, description = ?2, amount = ?3, schedule = ?4,
                 schedule_unit = ?5, next_execute = ?6, payment_count = ?7
             WHERE group_id = ?8 AND id = ?9",
            (
                &plan.name,
                &plan.description,
                plan.amount,
                plan.schedule,
                plan.schedule_unit.as_str(),
                plan.next_execute,
                plan.payments_left.map_or(-1, i64::from),
                plan.group_id.as_i64(),
                plan.id,
            ),
        )?;

        if updated == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }

    /// Delete a plan, keeping the entries it generated but clearing their
    /// back-references.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a plan in the group,
    /// - or [Error::SqlError] if there is some other SQL error.
    fn delete(&mut self, group: GroupId, id: PlanId) -> Result<(), Error> {
        let connection = self.connection.lock().unwrap();
        let tx = connection.unchecked_transaction()?;

        tx.execute(
            "UPDATE ledger_entry SET payment_plan_id = NULL WHERE payment_plan_id = ?1",
            (id,),
        )?;

        let deleted = tx.execute(
            "DELETE FROM payment_plan WHERE group_id = ?1 AND id = ?2",
            (group.as_i64(), id),
        )?;

        if deleted == 0 {
            return Err(Error::NotFound);
        }

        tx.commit()?;

        Ok(())
    }

    fn due_plans(&self, now: i64) -> Result<Vec<PaymentPlan>, Error> {
        self.connection
            .lock()
            .unwrap()
            .prepare(&format!(
                "SELECT {PLAN_COLUMNS} FROM payment_plan WHERE next_execute <= ?1"
            ))?
            .query_map((now,), Self::map_row)?
            .map(|maybe_plan| maybe_plan.map_err(Error::SqlError))
            .collect()
    }
}

/// Split a party into the `is_bank` and `id` columns.
fn party_columns(party: Party) -> (bool, Option<i64>) {
    match party {
        Party::Bank => (true, None),
        Party::Member(id) => (false, Some(id.as_i64())),
    }
}

/// Read a party starting at the `is_bank` column.
fn party_from_row(row: &Row, offset: usize) -> Result<Party, rusqlite::Error> {
    let is_bank: bool = row.get(offset)?;

    if is_bank {
        return Ok(Party::Bank);
    }

    Ok(Party::Member(UserId::new(row.get(offset + 1)?)))
}

/// Assemble the WHERE clause and its parameters for `query`.
fn build_filter(query: &PlanQuery) -> (String, Vec<Value>) {
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

    if let Some(ref text) = query.name_contains {
        clauses.push(format!("name LIKE ?{}", parameters.len() + 1));
        parameters.push(Value::Text(format!("%{text}%")));
    }

    (clauses.join(" AND "), parameters)
}

impl CreateTable for SQLitePaymentPlanStore {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS payment_plan (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    group_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    amount INTEGER NOT NULL,
                    sender_is_bank INTEGER NOT NULL,
                    sender_id INTEGER,
                    receiver_is_bank INTEGER NOT NULL,
                    receiver_id INTEGER,
                    schedule INTEGER NOT NULL,
                    schedule_unit TEXT NOT NULL,
                    next_execute INTEGER NOT NULL,
                    payment_count INTEGER NOT NULL,
                    FOREIGN KEY(group_id) REFERENCES \"group\"(id) ON DELETE CASCADE
                    )",
            (),
        )?;

        connection.execute(
            "CREATE INDEX IF NOT EXISTS payment_plan_due_idx ON payment_plan (next_execute)",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for SQLitePaymentPlanStore {
    type ReturnType = PaymentPlan;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error> {
        let unit_text: String = row.get(offset + 10)?;
        let schedule_unit = unit_text.parse::<ScheduleUnit>().map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                offset + 10,
                rusqlite::types::Type::Text,
                Box::new(error),
            )
        })?;

        let payment_count: i64 = row.get(offset + 12)?;

        Ok(PaymentPlan {
            id: row.get(offset)?,
            group_id: GroupId::new(row.get(offset + 1)?),
            name: row.get(offset + 2)?,
            description: row.get(offset + 3)?,
            amount: row.get(offset + 4)?,
            sender: party_from_row(row, offset + 5)?,
            receiver: party_from_row(row, offset + 7)?,
            schedule: row.get(offset + 9)?,
            schedule_unit,
            next_execute: row.get(offset + 11)?,
            payments_left: u32::try_from(payment_count).ok(),
        })
    }
}
