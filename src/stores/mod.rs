//! Contains traits and implementations for objects that store the domain [models](crate::models).

mod group;
mod ledger;
mod plan;

pub mod sqlite;

pub use group::{GroupStore, total_money};
pub use ledger::{LedgerQuery, LedgerStore, SortOrder};
pub use plan::{PaymentPlanStore, PlanQuery};
