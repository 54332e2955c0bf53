//! Defines the group store trait.

use crate::{
    Error,
    database_id::{GroupId, UserId},
    models::Group,
    stores::ledger::LedgerStore,
};

/// Handles groups and the roles users hold within them.
///
/// Full member management (invitations, search, display names) belongs to
/// the request layer; the core keeps only what the ledger and the plan
/// lifecycle depend on.
pub trait GroupStore {
    /// Create a new group.
    fn create(&mut self, name: &str, description: &str) -> Result<Group, Error>;

    /// Retrieve a group by its ID.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if no such group exists.
    fn get(&self, id: GroupId) -> Result<Group, Error>;

    /// Delete a group together with its memberships, ledger entries and
    /// payment plans.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if no such group exists.
    fn delete(&mut self, id: GroupId) -> Result<(), Error>;

    /// Grant `user` the member role, creating the membership if needed.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the group does not exist.
    fn add_member(&mut self, group: GroupId, user: UserId) -> Result<(), Error>;

    /// Revoke the member role from `user`.
    ///
    /// Payment plans in the group in which `user` takes part are deleted
    /// (their entries keep their history, minus the back-reference). The
    /// membership row survives only if `user` is still an admin.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the membership does not exist.
    fn remove_member(&mut self, group: GroupId, user: UserId) -> Result<(), Error>;

    /// Grant `user` the admin role, creating the membership if needed.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the group does not exist.
    fn add_admin(&mut self, group: GroupId, user: UserId) -> Result<(), Error>;

    /// Revoke the admin role from `user`. The membership row survives only
    /// if `user` is still a member.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the membership does not exist.
    fn remove_admin(&mut self, group: GroupId, user: UserId) -> Result<(), Error>;

    /// Whether `user` holds the member role in `group`.
    fn is_member(&self, group: GroupId, user: UserId) -> Result<bool, Error>;

    /// Whether `user` holds the admin role in `group`.
    fn is_admin(&self, group: GroupId, user: UserId) -> Result<bool, Error>;

    /// The IDs of everyone holding the member role in `group`.
    fn members(&self, group: GroupId) -> Result<Vec<UserId>, Error>;
}

/// The sum of every member's balance in `group`.
///
/// Money only enters or leaves a group through its bank, so this total is
/// also the amount the bank is on the hook for.
pub fn total_money<G, L>(groups: &G, ledger: &L, group: GroupId) -> Result<i64, Error>
where
    G: GroupStore,
    L: LedgerStore,
{
    let mut total = 0;

    for user in groups.members(group)? {
        total += ledger.balance_of(group, user)?;
    }

    Ok(total)
}
