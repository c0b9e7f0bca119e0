//! Read-only rate tables: commission rates per pack level and currency
//! exchange rates. Both are maintained by administrators outside this crate.

use crate::{
    entities::{CommissionRate, ExchangeRate, commission_rate, exchange_rate},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, prelude::*};

/// Commission percentage for one pack level, or `None` when the row is missing.
pub async fn rate_for<C>(db: &C, pack_id: i64, level: i32) -> Result<Option<Decimal>>
where
    C: ConnectionTrait,
{
    let row = CommissionRate::find()
        .filter(commission_rate::Column::PackId.eq(pack_id))
        .filter(commission_rate::Column::Level.eq(level))
        .one(db)
        .await?;
    Ok(row.map(|r| r.rate))
}

/// Full rate schedule of a pack, ordered by level.
pub async fn rates_for_pack<C>(db: &C, pack_id: i64) -> Result<Vec<commission_rate::Model>>
where
    C: ConnectionTrait,
{
    CommissionRate::find()
        .filter(commission_rate::Column::PackId.eq(pack_id))
        .order_by_asc(commission_rate::Column::Level)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Latest stored conversion factor from one currency to another.
///
/// Identical currencies convert at 1 without a lookup.
pub async fn exchange_rate_for<C>(db: &C, from: &str, to: &str) -> Result<Option<Decimal>>
where
    C: ConnectionTrait,
{
    if from.eq_ignore_ascii_case(to) {
        return Ok(Some(Decimal::ONE));
    }
    let row = ExchangeRate::find()
        .filter(exchange_rate::Column::FromCurrency.eq(from.to_uppercase()))
        .filter(exchange_rate::Column::ToCurrency.eq(to.to_uppercase()))
        .order_by_desc(exchange_rate::Column::CreatedAt)
        .order_by_desc(exchange_rate::Column::Id)
        .one(db)
        .await?;
    Ok(row.map(|r| r.rate))
}

/// Converts an amount, refusing to guess when no rate is stored.
///
/// Returns the converted amount (rounded to cents) and the rate used.
pub async fn convert<C>(db: &C, amount: Decimal, from: &str, to: &str) -> Result<(Decimal, Decimal)>
where
    C: ConnectionTrait,
{
    let rate = exchange_rate_for(db, from, to)
        .await?
        .ok_or_else(|| Error::ConversionUnavailable {
            from: from.to_uppercase(),
            to: to.to_uppercase(),
        })?;
    Ok(((amount * rate).round_dp(2), rate))
}
