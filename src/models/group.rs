//! Groups and their memberships.

use serde::Serialize;

use crate::database_id::{GroupId, UserId};

/// A circle of users sharing a ledger.
///
/// Deleting a group takes its memberships, ledger entries and payment
/// plans with it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    /// The group ID.
    pub id: GroupId,
    /// The group's display name.
    pub name: String,
    /// Free-form details of the group.
    pub description: String,
}

/// A user's roles within one group.
///
/// The two roles are independent: a user can be a member, an admin, or
/// both. A row with neither role can exist transiently while a removal is
/// in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Membership {
    /// The group the membership belongs to.
    pub group_id: GroupId,
    /// The user holding the membership.
    pub user_id: UserId,
    /// Whether the user holds the member role and takes part in transfers.
    pub is_member: bool,
    /// Whether the user may administrate the group and act as its bank.
    pub is_admin: bool,
}
