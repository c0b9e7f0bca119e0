//! Unified error types for the ledger engine.
//!
//! Every failure carries enough context (wallet, amount, state) for the caller
//! to log and alert without re-reading the store.

use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;

/// All errors surfaced by the ledger engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A debit asked for more than the wallet holds.
    #[error("Insufficient funds in wallet {wallet_id}: balance {current}, required {required}")]
    InsufficientFunds {
        /// Wallet that would have gone negative
        wallet_id: i64,
        /// Balance re-read under lock
        current: Decimal,
        /// Amount requested
        required: Decimal,
    },

    /// A lifecycle transition was attempted from a state that does not allow it.
    #[error("Cannot {action} {entity} {id} while it is {state}")]
    InvalidState {
        /// Kind of record (e.g. "withdrawal request")
        entity: &'static str,
        /// Record identifier
        id: i64,
        /// State found in the store
        state: String,
        /// Transition that was refused
        action: &'static str,
    },

    /// No exchange rate is stored for the requested currency pair.
    #[error("No exchange rate available from {from} to {to}")]
    ConversionUnavailable {
        /// Source currency
        from: String,
        /// Target currency
        to: String,
    },

    /// The payout gateway could not be reached or timed out.
    #[error("Payout gateway unavailable: {message}")]
    GatewayUnavailable {
        /// Transport-level detail
        message: String,
    },

    /// The payout gateway answered but refused the payout.
    #[error("Payout gateway rejected the request (status {status}): {message}")]
    GatewayRejected {
        /// HTTP status or 0 when the refusal came in the response body
        status: u16,
        /// Gateway-supplied reason
        message: String,
    },

    /// No commission rate is configured for a pack level.
    #[error("No commission rate configured for pack {pack_id} level {level}")]
    RateNotConfigured {
        /// Pack whose rate table was consulted
        pack_id: i64,
        /// Referral level (1..4)
        level: i32,
    },

    /// Lock contention or serialization failure in the store; retry the outer operation.
    #[error("Concurrency conflict: {message}")]
    ConcurrencyConflict {
        /// Driver message
        message: String,
    },

    /// Amount is zero, negative, or otherwise unusable.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// Rejected amount
        amount: Decimal,
    },

    /// A referenced record does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of record
        entity: &'static str,
        /// Lookup key
        key: String,
    },

    /// The caller is not allowed to act on this record.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Why the caller was refused
        message: String,
    },

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Any other store failure.
    #[error("Database error: {0}")]
    Database(DbErr),

    /// Metadata or payment details could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();
        if lowered.contains("database is locked")
            || lowered.contains("could not serialize")
            || lowered.contains("deadlock")
            || lowered.contains("lock timeout")
            || lowered.contains("lock wait timeout")
        {
            Self::ConcurrencyConflict { message }
        } else {
            Self::Database(err)
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
