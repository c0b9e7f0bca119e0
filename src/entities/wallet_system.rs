//! Platform wallet entity.
//!
//! Exactly one row exists, keyed by a unique `singleton_key` and created on
//! first demand so that every service instance agrees on the same row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Key of the one platform wallet row.
pub const SINGLETON_KEY: &str = "platform";

/// Platform wallet database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_system")]
pub struct Model {
    /// Unique identifier for the platform wallet
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Always [`SINGLETON_KEY`]
    #[sea_orm(unique)]
    pub singleton_key: String,
    /// Platform balance; may go negative as a mirror ledger
    pub balance: Decimal,
    /// Lifetime inflow (sales, fees)
    pub total_in: Decimal,
    /// Lifetime outflow (commissions, prizes)
    pub total_out: Decimal,
    /// When the platform wallet was created
    pub created_at: DateTimeUtc,
    /// Last posting
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
