//! User pack entity - one user's subscription instance to a pack.
//!
//! Carries the referral linkage: `sponsor_id` is the user credited for this
//! purchase and `referral_code` is the code this subscriber hands out to
//! recruit others. A `(user_id, pack_id)` pair has at most one active row.

use super::sea_orm_active_enums::{PaymentStatus, UserPackStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User pack database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_packs")]
pub struct Model {
    /// Unique identifier for the subscription
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Subscriber
    pub user_id: i64,
    /// Subscribed pack
    pub pack_id: i64,
    /// Subscription lifecycle
    pub status: UserPackStatus,
    /// Settlement of the purchase payment
    pub payment_status: PaymentStatus,
    /// When the subscription was first bought
    pub purchase_date: DateTimeUtc,
    /// End of the paid period; ignored for admin packs
    pub expiry_date: Option<DateTimeUtc>,
    /// User who referred this purchase (relation only, not ownership)
    pub sponsor_id: Option<i64>,
    /// Code this subscriber shares to sponsor others
    #[sea_orm(unique)]
    pub referral_code: String,
    /// Administrative subscription that never expires
    pub is_admin_pack: bool,
    /// Number of renewals applied to this subscription
    pub renewal_count: i32,
}

impl Model {
    /// Whether this subscription currently entitles its owner to commissions.
    #[must_use]
    pub fn is_active_at(&self, now: DateTimeUtc) -> bool {
        if self.status != UserPackStatus::Active {
            return false;
        }
        if self.is_admin_pack {
            return true;
        }
        self.expiry_date.is_none_or(|expiry| expiry > now)
    }
}

/// Defines relationships between UserPack and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each subscription belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// Each subscription is for one pack
    #[sea_orm(
        belongs_to = "super::pack::Entity",
        from = "Column::PackId",
        to = "super::pack::Column::Id"
    )]
    Pack,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::pack::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pack.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
