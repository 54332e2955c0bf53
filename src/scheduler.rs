//! Periodically turns due payment plans into ledger entries.

use std::time::Duration;

use time::OffsetDateTime;

use crate::{
    Error,
    models::{NewTransfer, PaymentPlan},
    schedule::advance,
    stores::{LedgerStore, PaymentPlanStore},
    transfer::TransferEngine,
};

/// Executes due payment plans on a fixed tick.
///
/// The tick interval is independent of any plan's schedule granularity.
/// Days are the finest unit a plan can repeat in, so ticks may be far
/// coarser than a second without a plan ever being skipped, only
/// executed a little late.
pub struct PlanScheduler<L, P> {
    engine: TransferEngine<L>,
    plans: P,
}

impl<L: LedgerStore, P: PaymentPlanStore> PlanScheduler<L, P> {
    /// Create a scheduler executing the plans in `plans` through `engine`.
    pub fn new(engine: TransferEngine<L>, plans: P) -> Self {
        Self { engine, plans }
    }

    /// Run one tick: execute every plan due at `now`.
    ///
    /// Plans are processed independently. A plan whose transfer or
    /// persistence fails is logged and left untouched so the next tick
    /// retries it; it never aborts the rest of the tick.
    ///
    /// # Errors
    /// Returns an error only when the due-plan scan itself fails.
    pub fn run_due_plans(&mut self, now: i64) -> Result<(), Error> {
        let due = self.plans.due_plans(now)?;

        tracing::debug!(count = due.len(), "scanned for due payment plans");

        for plan in due {
            let plan_id = plan.id;

            match self.execute_plan(plan, now) {
                Ok(()) => {}
                Err(Error::InsufficientFunds) => {
                    tracing::warn!(
                        plan = plan_id,
                        "payment plan sender cannot cover the amount; will retry next tick"
                    );
                }
                Err(error) => {
                    tracing::error!(
                        plan = plan_id,
                        %error,
                        "payment plan execution failed; will retry next tick"
                    );
                }
            }
        }

        Ok(())
    }

    /// Execute one due plan, then advance or retire it.
    ///
    /// `next_execute` only moves once the transfer has committed, so a
    /// plan that fails here stays due and is picked up again.
    fn execute_plan(&mut self, mut plan: PaymentPlan, now: i64) -> Result<(), Error> {
        let entry = self.engine.execute(NewTransfer {
            group_id: plan.group_id,
            sender: plan.sender,
            receiver: plan.receiver,
            amount: plan.amount,
            title: plan.name.clone(),
            description: plan.description.clone(),
            payment_plan_id: Some(plan.id),
        })?;

        tracing::info!(plan = plan.id, entry = entry.id, "payment plan executed");

        plan.payments_left = plan.payments_left.map(|left| left.saturating_sub(1));

        if plan.payments_left == Some(0) {
            return self.plans.delete(plan.group_id, plan.id);
        }

        // One transfer per tick however many periods have elapsed; missed
        // periods are skipped, not back-filled.
        let mut next_execute = advance(plan.next_execute, plan.schedule, plan.schedule_unit)?;
        while next_execute <= now {
            next_execute = advance(next_execute, plan.schedule, plan.schedule_unit)?;
        }

        plan.next_execute = next_execute;

        self.plans.update(&plan)
    }

    /// Drive [PlanScheduler::run_due_plans] forever on `tick_interval`.
    ///
    /// A tick body runs synchronously, so dropping the returned future
    /// (e.g. from a `tokio::select!` on a shutdown signal) cancels
    /// between ticks and never half-advances a plan.
    pub async fn run(mut self, tick_interval: Duration) {
        let mut interval = tokio::time::interval(tick_interval);

        loop {
            interval.tick().await;

            let now = OffsetDateTime::now_utc().unix_timestamp();

            if let Err(error) = self.run_due_plans(now) {
                tracing::error!(%error, "due payment plan scan failed");
            }
        }
    }
}
