//! Wallet entity - per-user balance.
//!
//! `balance` never goes below zero at a committed state and only changes
//! together with an appended `wallet_transactions` row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Wallet database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    /// Unique identifier for the wallet
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user (exactly one wallet per user)
    #[sea_orm(unique)]
    pub user_id: i64,
    /// Spendable balance
    pub balance: Decimal,
    /// Lifetime credits, refunds excluded
    pub total_earned: Decimal,
    /// Lifetime withdrawals, net of refunds
    pub total_withdrawn: Decimal,
    /// When the wallet was opened
    pub created_at: DateTimeUtc,
    /// Last balance change
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Wallet and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each wallet belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// One wallet has many transactions
    #[sea_orm(has_many = "super::wallet_transaction::Entity")]
    Transactions,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::wallet_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
