//! Parties to a transfer: group members and the group's bank.

use serde::Serialize;

use crate::database_id::UserId;

/// One side of a transfer before it is executed.
///
/// The bank is a non-member pseudo-party with an unbounded balance that
/// only group admins may act as. Making it a variant rather than an
/// `is_bank` flag means an identity can never be set alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Party {
    /// A group member, identified by their user ID.
    Member(UserId),
    /// The group's bank.
    Bank,
}

impl Party {
    /// Whether this party is the bank.
    pub fn is_bank(self) -> bool {
        matches!(self, Party::Bank)
    }

    /// The member's user ID, or `None` for the bank.
    pub fn user_id(self) -> Option<UserId> {
        match self {
            Party::Member(id) => Some(id),
            Party::Bank => None,
        }
    }
}

/// One side of a completed ledger entry.
///
/// A member side carries the balance that member was left with once the
/// entry applied. The bank side carries none: bank balances are unbounded
/// by construction and never resolved or stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntrySide {
    /// The bank took this side of the transfer.
    Bank,
    /// A member took this side of the transfer.
    Member {
        /// The member's user ID.
        id: UserId,
        /// The member's balance after the entry applied.
        new_balance: i64,
    },
}

impl EntrySide {
    /// The party this side records.
    pub fn party(&self) -> Party {
        match self {
            EntrySide::Bank => Party::Bank,
            EntrySide::Member { id, .. } => Party::Member(*id),
        }
    }

    /// Whether this side was taken by the member `user`.
    pub fn is_member(&self, user: UserId) -> bool {
        matches!(self, EntrySide::Member { id, .. } if *id == user)
    }
}
