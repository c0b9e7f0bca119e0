//! Commission rate entity - percentage paid to the sponsor at one referral level.
//!
//! Unique per `(pack_id, level)`; maintained by administrators.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Commission rate database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commission_rates")]
pub struct Model {
    /// Unique identifier for the rate
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Pack the schedule belongs to
    pub pack_id: i64,
    /// Referral depth, 1 = direct sponsor
    pub level: i32,
    /// Percentage of the commissionable base (10 means 10%)
    pub rate: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pack::Entity",
        from = "Column::PackId",
        to = "super::pack::Column::Id"
    )]
    Pack,
}

impl Related<super::pack::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pack.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
