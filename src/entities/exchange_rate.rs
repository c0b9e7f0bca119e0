//! Exchange rate entity - conversion factors between the ledger currency and
//! payout currencies. The most recent row for a pair wins.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Exchange rate database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "exchange_rates")]
pub struct Model {
    /// Unique identifier for the rate
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Source currency code
    pub from_currency: String,
    /// Target currency code
    pub to_currency: String,
    /// Units of `to_currency` per unit of `from_currency`
    pub rate: Decimal,
    /// When the rate was recorded; the latest row wins
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
