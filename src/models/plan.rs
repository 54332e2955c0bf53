//! Recurring transfer definitions.

use serde::Serialize;

use crate::{
    Error,
    config::Limits,
    database_id::{GroupId, PlanId},
    models::party::Party,
    schedule::ScheduleUnit,
};

/// A recurring transfer that the scheduler materializes into ledger
/// entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentPlan {
    /// The plan ID.
    pub id: PlanId,
    /// The group the plan transfers money within.
    pub group_id: GroupId,
    /// A short label for the plan; also used as the title of the entries
    /// it generates.
    pub name: String,
    /// Free-form details of the plan.
    pub description: String,
    /// The amount moved per execution, in the smallest currency unit.
    pub amount: i64,
    /// The party the money leaves on each execution.
    pub sender: Party,
    /// The party the money arrives at on each execution.
    pub receiver: Party,
    /// How many schedule units lie between executions.
    pub schedule: u32,
    /// The calendar unit the plan repeats in.
    pub schedule_unit: ScheduleUnit,
    /// When the plan is next due, as Unix seconds.
    pub next_execute: i64,
    /// How many executions remain; `None` means the plan runs until it is
    /// deleted.
    pub payments_left: Option<u32>,
}

/// A validated payment plan that has not been persisted yet.
///
/// Construct it through [NewPaymentPlan::new], which enforces every
/// invariant the scheduler later relies on.
#[derive(Debug, Clone)]
pub struct NewPaymentPlan {
    pub(crate) group_id: GroupId,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) amount: i64,
    pub(crate) sender: Party,
    pub(crate) receiver: Party,
    pub(crate) schedule: u32,
    pub(crate) schedule_unit: ScheduleUnit,
    pub(crate) next_execute: i64,
    pub(crate) payments_left: Option<u32>,
}

impl NewPaymentPlan {
    /// Validate the definition of a payment plan.
    ///
    /// `first_execute` is when the first transfer should happen and must
    /// not lie before `now`. `payments_left` of `None` repeats without
    /// bound.
    ///
    /// # Errors
    /// - [Error::InvalidAmount] if `amount` is not positive.
    /// - [Error::BothBank] if both parties are the bank.
    /// - [Error::SameParty] if both parties are the same member.
    /// - [Error::InvalidSchedule] if `schedule` is zero.
    /// - [Error::InvalidPaymentCount] if `payments_left` is `Some(0)`.
    /// - [Error::InvalidTitle] / [Error::InvalidDescription] if the
    ///   trimmed texts fall outside `limits`.
    /// - [Error::FirstPaymentInPast] if `first_execute < now`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        group_id: GroupId,
        sender: Party,
        receiver: Party,
        amount: i64,
        name: &str,
        description: &str,
        schedule: u32,
        schedule_unit: ScheduleUnit,
        first_execute: i64,
        payments_left: Option<u32>,
        limits: &Limits,
        now: i64,
    ) -> Result<Self, Error> {
        if amount <= 0 {
            return Err(Error::InvalidAmount(amount));
        }

        if sender.is_bank() && receiver.is_bank() {
            return Err(Error::BothBank);
        }

        if sender == receiver {
            return Err(Error::SameParty);
        }

        if schedule == 0 {
            return Err(Error::InvalidSchedule);
        }

        if payments_left == Some(0) {
            return Err(Error::InvalidPaymentCount);
        }

        let name = name.trim();
        limits.check_name(name)?;

        let description = description.trim();
        limits.check_description(description)?;

        if first_execute < now {
            return Err(Error::FirstPaymentInPast);
        }

        Ok(Self {
            group_id,
            name: name.to_owned(),
            description: description.to_owned(),
            amount,
            sender,
            receiver,
            schedule,
            schedule_unit,
            next_execute: first_execute,
            payments_left,
        })
    }
}

#[cfg(test)]
mod new_payment_plan_tests {
    use super::NewPaymentPlan;
    use crate::{
        Error,
        config::Limits,
        database_id::{GroupId, UserId},
        models::party::Party,
        schedule::ScheduleUnit,
    };

    const NOW: i64 = 1_700_000_000;

    fn plan(
        sender: Party,
        receiver: Party,
        amount: i64,
        first_execute: i64,
        payments_left: Option<u32>,
    ) -> Result<NewPaymentPlan, Error> {
        NewPaymentPlan::new(
            GroupId::new(1),
            sender,
            receiver,
            amount,
            "Allowance",
            "Weekly pocket money",
            1,
            ScheduleUnit::Week,
            first_execute,
            payments_left,
            &Limits::default(),
            NOW,
        )
    }

    #[test]
    fn valid_plan_is_accepted() {
        let result = plan(Party::Bank, Party::Member(UserId::new(2)), 500, NOW, None);

        assert!(result.is_ok());
    }

    #[test]
    fn first_execution_in_the_past_is_rejected() {
        let result = plan(
            Party::Bank,
            Party::Member(UserId::new(2)),
            500,
            NOW - 1,
            None,
        );

        assert_eq!(result.unwrap_err(), Error::FirstPaymentInPast);
    }

    #[test]
    fn bank_to_bank_is_rejected() {
        let result = plan(Party::Bank, Party::Bank, 500, NOW, None);

        assert_eq!(result.unwrap_err(), Error::BothBank);
    }

    #[test]
    fn member_to_themselves_is_rejected() {
        let member = Party::Member(UserId::new(2));

        let result = plan(member, member, 500, NOW, None);

        assert_eq!(result.unwrap_err(), Error::SameParty);
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let result = plan(Party::Bank, Party::Member(UserId::new(2)), 0, NOW, None);

        assert_eq!(result.unwrap_err(), Error::InvalidAmount(0));
    }

    #[test]
    fn zero_remaining_payments_is_rejected() {
        let result = plan(Party::Bank, Party::Member(UserId::new(2)), 500, NOW, Some(0));

        assert_eq!(result.unwrap_err(), Error::InvalidPaymentCount);
    }

    #[test]
    fn zero_schedule_interval_is_rejected() {
        let result = NewPaymentPlan::new(
            GroupId::new(1),
            Party::Bank,
            Party::Member(UserId::new(2)),
            500,
            "Allowance",
            "",
            0,
            ScheduleUnit::Week,
            NOW,
            None,
            &Limits::default(),
            NOW,
        );

        assert_eq!(result.unwrap_err(), Error::InvalidSchedule);
    }

    #[test]
    fn name_is_trimmed_before_validation() {
        let result = NewPaymentPlan::new(
            GroupId::new(1),
            Party::Bank,
            Party::Member(UserId::new(2)),
            500,
            "  Allowance  ",
            "",
            1,
            ScheduleUnit::Week,
            NOW,
            None,
            &Limits::default(),
            NOW,
        )
        .unwrap();

        assert_eq!(result.name, "Allowance");
    }
}
