//! User entity - the identity that owns exactly one wallet.
//!
//! Registration and authentication live outside this crate; the ledger only
//! needs the public `account_id` and a payout phone number.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Public account identifier shown to other users
    #[sea_orm(unique)]
    pub account_id: String,
    /// Display name
    pub name: String,
    /// Mobile-money phone number, if registered
    pub phone: Option<String>,
    /// When the user registered
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user owns one wallet
    #[sea_orm(has_one = "super::wallet::Entity")]
    Wallet,
    /// One user has many subscriptions
    #[sea_orm(has_many = "super::user_pack::Entity")]
    UserPacks,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl Related<super::user_pack::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserPacks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
