//! Groupbank tracks shared money balances inside user defined groups.
//!
//! Members transfer virtual currency to each other or to and from a
//! notional bank account owned by group admins, and recurring transfers
//! can be scheduled to execute automatically.
//!
//! The heart of the crate is an append-only transaction log from which
//! every balance is derived ([stores::LedgerStore]), a transfer engine
//! that turns validated inputs into exactly one log entry each
//! ([transfer::TransferEngine]), and a scheduler that materializes due
//! payment plans into transfers on a fixed tick
//! ([scheduler::PlanScheduler]).
//!
//! User accounts, authentication and the request layer live outside this
//! crate; they hand the core validated, authorized inputs and consume its
//! return values.

#![warn(missing_docs)]

pub mod config;
pub mod database_id;
pub mod db;
mod error;
pub mod models;
pub mod schedule;
pub mod scheduler;
pub mod stores;
pub mod transfer;

pub use config::Limits;
pub use database_id::{DatabaseID, EntryId, GroupId, PlanId, UserId};
pub use db::initialize as initialize_db;
pub use error::Error;
pub use models::{
    EntrySide, Group, LedgerEntry, Membership, NewPaymentPlan, NewTransfer, PaymentPlan, Party,
};
pub use schedule::{ScheduleUnit, SchedulePreview, advance, preview_schedule};
pub use scheduler::PlanScheduler;
pub use transfer::TransferEngine;
