//! Withdrawal request entity - funds frozen at request time, then approved,
//! rejected or cancelled.
//!
//! `payment_details` holds the serialized [`crate::core::withdrawal::PaymentDetails`]
//! document (currency, fee, payout instrument, conversion) so the audit trail
//! keeps whatever the gateway needed at the time.

use super::sea_orm_active_enums::{PaymentStatus, WithdrawalStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Withdrawal request database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "withdrawal_requests")]
pub struct Model {
    /// Unique identifier for the request
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Requesting user
    pub user_id: i64,
    /// Ledger entry that froze the funds
    pub wallet_transaction_id: Option<i64>,
    /// Amount frozen at request time, fee included
    pub amount: Decimal,
    /// Serialized payment details
    pub payment_details: Json,
    /// Administrative state
    pub status: WithdrawalStatus,
    /// Payout settlement; `None` until a payout is dispatched. `pending`
    /// while the request itself is still `pending` marks a dispatch in flight
    pub payment_status: Option<PaymentStatus>,
    /// Payouts dispatched so far; numbers the gateway reference
    pub payout_attempts: i32,
    /// Gateway session of the last dispatched payout
    #[sea_orm(unique)]
    pub gateway_session_id: Option<String>,
    /// Gateway transaction reference reported by the callback
    pub gateway_transaction_id: Option<String>,
    /// Administrator's note on approval or rejection
    pub admin_note: Option<String>,
    /// Administrator who approved or rejected
    pub processed_by: Option<i64>,
    /// When it was approved, rejected or cancelled
    pub processed_at: Option<DateTimeUtc>,
    /// When frozen funds were returned
    pub refund_at: Option<DateTimeUtc>,
    /// When the request was opened
    pub created_at: DateTimeUtc,
    /// Last state change
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between WithdrawalRequest and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each request belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
