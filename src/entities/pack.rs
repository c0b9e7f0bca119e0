//! Pack entity - a purchasable subscription product.
//!
//! `abonnement` is the billing cadence label as entered by administrators
//! (e.g. "monthly", "annuel"); see [`crate::core::commission::Cadence`] for
//! how it maps to months per billing cycle.

use super::sea_orm_active_enums::PackStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Pack database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packs")]
pub struct Model {
    /// Unique identifier for the pack
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Catalog name
    pub name: String,
    /// Price of one billing cycle in the ledger currency
    pub price: Decimal,
    /// Billing cadence label
    pub abonnement: String,
    /// Whether the pack can be bought
    pub status: PackStatus,
    /// When the pack was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Pack and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One pack has one rate per referral level
    #[sea_orm(has_many = "super::commission_rate::Entity")]
    CommissionRates,
    /// One pack has many subscriptions
    #[sea_orm(has_many = "super::user_pack::Entity")]
    UserPacks,
}

impl Related<super::commission_rate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CommissionRates.def()
    }
}

impl Related<super::user_pack::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserPacks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
