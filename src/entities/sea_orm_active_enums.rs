//! String-backed enums shared by several entities.
//!
//! Values are stored as text so that the audit trail stays readable in the
//! raw tables. Amount, status and type are always one of these typed values;
//! free-form audit data goes in the JSON `metadata` columns instead.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Availability of a pack in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PackStatus {
    /// Purchasable
    #[sea_orm(string_value = "active")]
    Active,
    /// Hidden from sale
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

/// Lifecycle of one subscription instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum UserPackStatus {
    /// Subscription is running
    #[sea_orm(string_value = "active")]
    Active,
    /// Subscription ran past its expiry date
    #[sea_orm(string_value = "expired")]
    Expired,
    /// Subscription was suspended
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

/// Settlement of an external payment (pack purchase or withdrawal payout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PaymentStatus {
    /// Waiting for confirmation
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Money has moved
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Payment was refused or errored
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Settlement of a commission intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum CommissionStatus {
    /// Computed but not yet posted
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Posted to the sponsor's wallet
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Not paid; see `error_message`
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Whether a ledger entry adds to or removes from a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum EntryDirection {
    /// Balance increases
    #[sea_orm(string_value = "credit")]
    Credit,
    /// Balance decreases
    #[sea_orm(string_value = "debit")]
    Debit,
}

/// Business reason of a user wallet movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum TransactionType {
    /// Pack paid from the wallet
    #[sea_orm(string_value = "purchase")]
    Purchase,
    /// Referral payout
    #[sea_orm(string_value = "commission")]
    Commission,
    /// Outgoing user-to-user transfer
    #[sea_orm(string_value = "transfer")]
    Transfer,
    /// Incoming user-to-user transfer
    #[sea_orm(string_value = "reception")]
    Reception,
    /// Funds frozen for a withdrawal request
    #[sea_orm(string_value = "withdrawal")]
    Withdrawal,
    /// Frozen funds returned after a rejected or cancelled withdrawal
    #[sea_orm(string_value = "remboursement")]
    Refund,
    /// Cash-equivalent lottery prize
    #[sea_orm(string_value = "prize")]
    Prize,
    /// Balance spent inside the platform (jetons, tickets)
    #[sea_orm(string_value = "consumption")]
    Consumption,
}

/// Status of a user wallet movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum TransactionStatus {
    /// Awaiting an external callback
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Final
    #[sea_orm(string_value = "completed")]
    Completed,
    /// External leg failed
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Withdrawal freeze refunded by an administrator
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Withdrawal freeze refunded at the user's request
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Business reason of a platform ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum SystemTransactionType {
    /// Pack sale or in-platform consumption received by the platform
    #[sea_orm(string_value = "sale")]
    Sale,
    /// Withdrawal or transfer fee retained by the platform
    #[sea_orm(string_value = "fee")]
    Fee,
    /// Commission paid out to a sponsor
    #[sea_orm(string_value = "commission")]
    Commission,
    /// Lottery prize paid to a user wallet
    #[sea_orm(string_value = "prize")]
    Prize,
    /// Withdrawal paid out through the gateway (informational)
    #[sea_orm(string_value = "payout")]
    Payout,
}

impl SystemTransactionType {
    /// Direction this movement applies to the platform balance.
    ///
    /// Payouts leave user funds, not platform funds, so they are recorded
    /// without moving the platform balance.
    #[must_use]
    pub const fn direction(self) -> Option<EntryDirection> {
        match self {
            Self::Sale | Self::Fee => Some(EntryDirection::Credit),
            Self::Commission | Self::Prize => Some(EntryDirection::Debit),
            Self::Payout => None,
        }
    }
}

/// Administrative state of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum WithdrawalStatus {
    /// Funds frozen, awaiting an administrator
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Payout dispatched
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Refused and refunded by an administrator
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Withdrawn and refunded by the owner
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}
