//! Commission entity - an immutable-once-settled referral payout intent.
//!
//! One row per `(event_ref, level)`. `status` moves from pending to completed
//! or failed exactly once; `error_message` explains failures to operators.
use super::sea_orm_active_enums::CommissionStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Commission database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commissions")]
pub struct Model {
    /// Unique identifier for the commission
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Purchase or renewal event this commission belongs to
    pub event_ref: String,
    /// Beneficiary (the sponsor at this level)
    pub user_id: i64,
    /// Buyer whose purchase generated the commission
    pub source_user_id: i64,
    /// Pack that was bought
    pub pack_id: i64,
    /// Buyer's subscription that triggered the distribution
    pub user_pack_id: i64,
    /// Referral depth, 1..=4
    pub level: i32,
    /// Computed payout
    pub amount: Decimal,
    /// Settlement outcome
    pub status: CommissionStatus,
    /// Why the commission was not paid
    pub error_message: Option<String>,
    /// Ledger entry crediting the beneficiary, when paid
    pub wallet_transaction_id: Option<i64>,
    /// When the commission was computed
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Commission and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each commission is paid to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    Beneficiary,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Beneficiary.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
