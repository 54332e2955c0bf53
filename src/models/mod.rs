//! The domain models for groups, the ledger and payment plans.

mod group;
mod ledger;
mod party;
mod plan;

pub use group::{Group, Membership};
pub use ledger::{LedgerEntry, NewTransfer};
pub use party::{EntrySide, Party};
pub use plan::{NewPaymentPlan, PaymentPlan};
