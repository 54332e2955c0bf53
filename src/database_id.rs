//! Database ID type definitions.

use serde::Serialize;

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseID = i64;

/// The ID of a ledger entry.
///
/// Entry IDs grow with insertion order, which makes them the tie-break for
/// entries created within the same second.
pub type EntryId = DatabaseID;

/// The ID of a payment plan.
pub type PlanId = DatabaseID;

/// The ID of a user.
///
/// Users live in an external system; the ledger core only ever sees their
/// IDs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UserId(DatabaseID);

impl UserId {
    /// Create a user ID from its raw database value.
    pub fn new(id: DatabaseID) -> Self {
        Self(id)
    }

    /// The raw database value of the ID.
    pub fn as_i64(self) -> DatabaseID {
        self.0
    }
}

/// The ID of a group.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupId(DatabaseID);

impl GroupId {
    /// Create a group ID from its raw database value.
    pub fn new(id: DatabaseID) -> Self {
        Self(id)
    }

    /// The raw database value of the ID.
    pub fn as_i64(self) -> DatabaseID {
        self.0
    }
}
