/// Commission distribution over the referral chain
pub mod commission;

/// Domain events and the notification sink
pub mod events;

/// Payout gateway adapter
pub mod gateway;

/// Pack purchase, renewal and expiry
pub mod purchase;

/// Commission rate and exchange rate tables
pub mod rates;

/// Referral graph lookups
pub mod referral;

/// Ledger snapshot and reconciliation
pub mod report;

/// Wallet posting service
pub mod wallet;

/// Withdrawal request lifecycle
pub mod withdrawal;
