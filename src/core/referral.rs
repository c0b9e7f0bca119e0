//! Referral graph accessor.
//!
//! The referral "graph" is never materialised: each hop is one lookup of a
//! subscriber's own `UserPack` for the same pack, reading its `sponsor_id`.
//! Callers bound the number of hops.

use crate::{
    entities::{
        UserPack,
        sea_orm_active_enums::{PaymentStatus, UserPackStatus},
        user_pack,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, prelude::*};
use uuid::Uuid;

const REFERRAL_CODE_LEN: usize = 10;

/// Finds the subscription a sponsor holds on a pack, preferring a
/// completed-payment one and then the most recent.
///
/// This is the row the commission engine checks for activity and follows to
/// the next sponsor.
pub async fn find_sponsor_pack<C>(
    db: &C,
    user_id: i64,
    pack_id: i64,
) -> Result<Option<user_pack::Model>>
where
    C: ConnectionTrait,
{
    let completed = UserPack::find()
        .filter(user_pack::Column::UserId.eq(user_id))
        .filter(user_pack::Column::PackId.eq(pack_id))
        .filter(user_pack::Column::PaymentStatus.eq(PaymentStatus::Completed))
        .order_by_desc(user_pack::Column::Id)
        .one(db)
        .await?;
    if completed.is_some() {
        return Ok(completed);
    }
    UserPack::find()
        .filter(user_pack::Column::UserId.eq(user_id))
        .filter(user_pack::Column::PackId.eq(pack_id))
        .order_by_desc(user_pack::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Resolves a referral code to the subscription that owns it.
pub async fn find_by_referral_code<C>(db: &C, code: &str) -> Result<Option<user_pack::Model>>
where
    C: ConnectionTrait,
{
    UserPack::find()
        .filter(user_pack::Column::ReferralCode.eq(code.trim().to_uppercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the active subscription of a user on a pack, if any.
pub async fn find_active_user_pack<C>(
    db: &C,
    user_id: i64,
    pack_id: i64,
) -> Result<Option<user_pack::Model>>
where
    C: ConnectionTrait,
{
    UserPack::find()
        .filter(user_pack::Column::UserId.eq(user_id))
        .filter(user_pack::Column::PackId.eq(pack_id))
        .filter(user_pack::Column::Status.eq(UserPackStatus::Active))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads a subscription by id.
pub async fn get_user_pack<C>(db: &C, user_pack_id: i64) -> Result<user_pack::Model>
where
    C: ConnectionTrait,
{
    UserPack::find_by_id(user_pack_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user pack", user_pack_id))
}

/// Generates a referral code that is not yet taken.
///
/// Uniqueness is ultimately enforced by the unique column; the lookup only
/// avoids a failed insert in the common case.
pub async fn generate_referral_code<C>(db: &C) -> Result<String>
where
    C: ConnectionTrait,
{
    loop {
        let code: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(REFERRAL_CODE_LEN)
            .collect::<String>()
            .to_uppercase();
        if find_by_referral_code(db, &code).await?.is_none() {
            return Ok(code);
        }
    }
}
