//! Defines the crate level error type.

use crate::database_id::EntryId;

/// The errors that may occur in the ledger core.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A transfer or payment plan was given a zero or negative amount.
    ///
    /// Amounts are counted in the smallest currency unit and must be
    /// positive; the direction of a transfer is carried by its parties,
    /// never by the sign of the amount.
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    /// The sender and receiver of a transfer are the same identity.
    #[error("sender and receiver are the same party")]
    SameParty,

    /// Both sides of a transfer reference the bank.
    #[error("cannot send money from the bank to the bank")]
    BothBank,

    /// A transfer title or plan name was outside the configured length
    /// bounds after trimming.
    #[error("title must be between {min} and {max} characters")]
    InvalidTitle {
        /// The smallest accepted length, in characters.
        min: usize,
        /// The largest accepted length, in characters.
        max: usize,
    },

    /// A description exceeded the configured maximum length.
    #[error("description must be at most {max} characters")]
    InvalidDescription {
        /// The largest accepted length, in characters.
        max: usize,
    },

    /// The sender's balance cannot cover the transfer amount.
    ///
    /// This is a business-rule rejection, not a system fault: interactive
    /// callers surface it to the user, the plan scheduler logs it and
    /// retries on the next tick.
    #[error("the sender does not have enough money")]
    InsufficientFunds,

    /// A payment plan was given a schedule interval of zero.
    #[error("schedule interval must be at least 1")]
    InvalidSchedule,

    /// A schedule unit string was not one of `day`, `week`, `month` or
    /// `year`.
    #[error("{0:?} is not a valid schedule unit")]
    InvalidScheduleUnit(String),

    /// A bounded payment plan was created with zero remaining payments.
    #[error("payment count must be at least 1 when bounded")]
    InvalidPaymentCount,

    /// A payment plan's first execution was scheduled in the past.
    ///
    /// Payment plans describe future transfers; backdating one would ask
    /// the scheduler to fabricate history.
    #[error("the first execution time has already passed")]
    FirstPaymentInPast,

    /// A timestamp fell outside the range the calendar arithmetic
    /// supports.
    #[error("timestamp {0} is out of the supported range")]
    TimestampOutOfRange(i64),

    /// The ledger returned an entry for a user on neither side of it.
    ///
    /// This indicates a corrupted participant index, not caller error.
    #[error("ledger entry {0} does not involve the queried user")]
    EntryParticipantMismatch(EntryId),

    /// The requested group, entry, membership or plan does not exist.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
