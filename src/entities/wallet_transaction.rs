//! Wallet transaction entity - append-only record of a user balance change.
//!
//! Only `status` (and `updated_at`) may change after insertion, and only in
//! response to an external payment outcome.
use super::sea_orm_active_enums::{EntryDirection, TransactionStatus, TransactionType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Wallet transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Wallet whose balance moved
    pub wallet_id: i64,
    /// Amount moved, always positive; see `direction`
    pub amount: Decimal,
    /// Credit or debit
    pub direction: EntryDirection,
    /// Business reason
    pub transaction_type: TransactionType,
    /// Settlement status
    pub status: TransactionStatus,
    /// Wallet balance right after this entry
    pub balance_after: Decimal,
    /// Free-form audit payload
    pub metadata: Json,
    /// When the entry was written
    pub created_at: DateTimeUtc,
    /// Last status change
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between WalletTransaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one wallet
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::WalletId",
        to = "super::wallet::Column::Id"
    )]
    Wallet,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
