//! The entries of the append-only transaction log.

use serde::Serialize;

use crate::{
    database_id::{EntryId, GroupId, PlanId, UserId},
    models::party::{EntrySide, Party},
};

/// One immutable record of a completed transfer, carrying both parties'
/// resulting balances.
///
/// Entries are never updated or deleted once appended; the only exception
/// is `payment_plan_id` being cleared when the plan that generated the
/// entry is deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    /// The entry ID. Later entries always have larger IDs, which breaks
    /// ordering ties between entries created within the same second.
    pub id: EntryId,
    /// When the transfer was executed, as Unix seconds.
    pub created: i64,
    /// The group whose ledger this entry belongs to.
    pub group_id: GroupId,
    /// A short label for the transfer.
    pub title: String,
    /// Free-form details of the transfer.
    pub description: String,
    /// The amount moved, in the smallest currency unit. Always positive.
    pub amount: i64,
    /// The side the money left.
    pub sender: EntrySide,
    /// The side the money arrived at.
    pub receiver: EntrySide,
    /// The payment plan that generated this entry; `None` for manual
    /// transfers.
    pub payment_plan_id: Option<PlanId>,
}

impl LedgerEntry {
    /// The change this entry applied to the sender's balance.
    pub fn balance_difference_sender(&self) -> i64 {
        -self.amount
    }

    /// The change this entry applied to the receiver's balance.
    pub fn balance_difference_receiver(&self) -> i64 {
        self.amount
    }

    /// The balance `user` was left with after this entry, if they took
    /// part in it.
    pub fn closing_balance(&self, user: UserId) -> Option<i64> {
        match (&self.sender, &self.receiver) {
            (EntrySide::Member { id, new_balance }, _) if *id == user => Some(*new_balance),
            (_, EntrySide::Member { id, new_balance }) if *id == user => Some(*new_balance),
            _ => None,
        }
    }
}

/// The input to a transfer execution.
#[derive(Debug, Clone)]
pub struct NewTransfer {
    /// The group whose ledger the transfer belongs to.
    pub group_id: GroupId,
    /// The party the money leaves.
    pub sender: Party,
    /// The party the money arrives at.
    pub receiver: Party,
    /// The amount to move, in the smallest currency unit.
    pub amount: i64,
    /// A short label for the transfer.
    pub title: String,
    /// Free-form details of the transfer.
    pub description: String,
    /// The payment plan this transfer executes, if any.
    pub payment_plan_id: Option<PlanId>,
}

#[cfg(test)]
mod ledger_entry_tests {
    use super::LedgerEntry;
    use crate::{
        database_id::{GroupId, UserId},
        models::party::EntrySide,
    };

    fn entry() -> LedgerEntry {
        LedgerEntry {
            id: 7,
            created: 1_700_000_000,
            group_id: GroupId::new(1),
            title: "Lunch money".to_string(),
            description: String::new(),
            amount: 30,
            sender: EntrySide::Member {
                id: UserId::new(5),
                new_balance: 70,
            },
            receiver: EntrySide::Bank,
            payment_plan_id: None,
        }
    }

    #[test]
    fn closing_balance_picks_the_matching_side() {
        let entry = entry();

        assert_eq!(entry.closing_balance(UserId::new(5)), Some(70));
        assert_eq!(entry.closing_balance(UserId::new(6)), None);
    }

    #[test]
    fn balance_differences_are_signed_copies_of_the_amount() {
        let entry = entry();

        assert_eq!(entry.balance_difference_sender(), -30);
        assert_eq!(entry.balance_difference_receiver(), 30);
    }

    #[test]
    fn serializes_for_the_request_layer() {
        let json = serde_json::to_value(entry()).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["amount"], 30);
        assert_eq!(json["sender"]["Member"]["id"], 5);
        assert_eq!(json["sender"]["Member"]["new_balance"], 70);
        assert_eq!(json["receiver"], "Bank");
        assert_eq!(json["payment_plan_id"], serde_json::Value::Null);
    }
}
