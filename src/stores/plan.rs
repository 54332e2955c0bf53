//! Defines the payment plan store trait.

use crate::{
    Error,
    database_id::{GroupId, PlanId, UserId},
    models::{NewPaymentPlan, PaymentPlan},
    stores::ledger::SortOrder,
};

/// Handles the creation, retrieval and lifecycle of payment plans.
pub trait PaymentPlanStore {
    /// Persist a validated payment plan.
    fn create(&mut self, plan: NewPaymentPlan) -> Result<PaymentPlan, Error>;

    /// Retrieve a single plan by group and ID.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if no such plan exists in the group.
    fn get(&self, group: GroupId, id: PlanId) -> Result<PaymentPlan, Error>;

    /// Retrieve plans in the way defined by `query`.
    fn get_query(&self, query: &PlanQuery) -> Result<Vec<PaymentPlan>, Error>;

    /// Count the plans matching `query`, ignoring its pagination fields.
    fn count(&self, query: &PlanQuery) -> Result<u64, Error>;

    /// Persist `plan`'s schedule state after the scheduler advanced it, or
    /// after an authorized caller edited it.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the plan no longer exists.
    fn update(&mut self, plan: &PaymentPlan) -> Result<(), Error>;

    /// Delete a plan.
    ///
    /// Ledger entries the plan generated are kept; only their
    /// back-references to the plan are cleared.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if no such plan exists in the group.
    fn delete(&mut self, group: GroupId, id: PlanId) -> Result<(), Error>;

    /// Every plan with `next_execute <= now`, across all groups.
    ///
    /// No ordering is guaranteed; the scheduler must not assume one.
    fn due_plans(&self, now: i64) -> Result<Vec<PaymentPlan>, Error>;
}

/// Defines which payment plans [PaymentPlanStore::get_query] should fetch.
///
/// Results are ordered by `next_execute`, soonest first when ascending.
#[derive(Debug, Clone, Default)]
pub struct PlanQuery {
    /// The group whose plans to read.
    pub group_id: GroupId,
    /// Only include plans in which this user takes part, on either side.
    pub participant: Option<UserId>,
    /// Only include plans with the bank on either side.
    pub bank_only: bool,
    /// Only include plans whose name contains this text.
    pub name_contains: Option<String>,
    /// Skip the first `offset` matching plans.
    pub offset: u64,
    /// Select up to `limit` plans, or all of them when `None`.
    pub limit: Option<u64>,
    /// The order to sort plans by their next execution time.
    pub order: SortOrder,
}
