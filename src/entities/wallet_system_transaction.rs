//! Platform ledger entries mirroring every externally-facing money movement.

use super::sea_orm_active_enums::{EntryDirection, SystemTransactionType, TransactionStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Platform ledger entry database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_system_transactions")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Always positive
    pub amount: Decimal,
    /// `None` for informational entries that do not move the platform balance
    pub direction: Option<EntryDirection>,
    /// Kind of platform movement
    pub transaction_type: SystemTransactionType,
    /// Entry status
    pub status: TransactionStatus,
    /// Platform balance right after this entry
    pub balance_after: Decimal,
    /// Audit payload (buyer, withdrawal, commission references)
    pub metadata: Json,
    /// When the entry was posted
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
