//! Validates and executes single transfers against the ledger.

use crate::{
    Error,
    config::Limits,
    models::{LedgerEntry, NewTransfer},
    stores::LedgerStore,
};

/// Validates and executes transfers, producing one ledger entry each.
///
/// The engine performs the pure input checks itself and delegates the
/// balance check to [LedgerStore::append], which runs it atomically with
/// the append; two concurrent transfers debiting the same account can
/// therefore never both observe the pre-debit balance.
#[derive(Debug, Clone)]
pub struct TransferEngine<L> {
    ledger: L,
    limits: Limits,
}

impl<L: LedgerStore> TransferEngine<L> {
    /// Create an engine over `ledger`, validating input against `limits`.
    pub fn new(ledger: L, limits: Limits) -> Self {
        Self { ledger, limits }
    }

    /// Execute `transfer`, appending exactly one entry to the group's
    /// ledger.
    ///
    /// The engine has no side effects beyond the append; notifying the
    /// parties is the caller's responsibility.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::InvalidAmount] if the amount is zero or negative,
    /// - [Error::BothBank] if both parties are the bank,
    /// - [Error::SameParty] if both parties are the same member,
    /// - [Error::InvalidTitle] or [Error::InvalidDescription] if the
    ///   trimmed texts fall outside the configured limits,
    /// - [Error::InsufficientFunds] if the sender cannot cover the amount,
    /// - or [Error::SqlError] if the durable write fails.
    pub fn execute(&mut self, transfer: NewTransfer) -> Result<LedgerEntry, Error> {
        if transfer.amount <= 0 {
            return Err(Error::InvalidAmount(transfer.amount));
        }

        if transfer.sender.is_bank() && transfer.receiver.is_bank() {
            return Err(Error::BothBank);
        }

        if transfer.sender == transfer.receiver {
            return Err(Error::SameParty);
        }

        let title = transfer.title.trim().to_owned();
        self.limits.check_name(&title)?;

        let description = transfer.description.trim().to_owned();
        self.limits.check_description(&description)?;

        let transfer = NewTransfer {
            title,
            description,
            ..transfer
        };

        let entry = self.ledger.append(&transfer)?;

        tracing::info!(
            entry = entry.id,
            group = entry.group_id.as_i64(),
            amount = entry.amount,
            "transfer executed"
        );

        Ok(entry)
    }

    /// Shared access to the ledger the engine appends to.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}
