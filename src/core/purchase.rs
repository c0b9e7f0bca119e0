//! Purchase and renewal of packs.
//!
//! This is where money enters the platform: the sale is mirrored on the
//! platform ledger in the same transaction that commits the subscription,
//! then commissions are distributed on the committed row. A failed
//! distribution never undoes the purchase.

use crate::{
    core::{
        commission::{self, DistributionReport, PurchaseEvent},
        events::NotificationSink,
        referral,
        wallet::{self, Metadata, Posting, SystemPosting},
    },
    entities::{
        Pack, User, UserPack,
        sea_orm_active_enums::{
            PackStatus, PaymentStatus, SystemTransactionType, TransactionType, UserPackStatus,
        },
        user_pack,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use sea_orm::{QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{error, info, instrument};

/// How the buyer paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Funding {
    /// Debited from the buyer's wallet
    Wallet,
    /// Collected by an external payment provider
    External {
        /// Provider's payment reference
        reference: String,
    },
}

/// A confirmed pack purchase.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    /// User buying the pack
    pub buyer_id: i64,
    /// Pack being bought
    pub pack_id: i64,
    /// Subscription length; must be at least one month
    pub duration_months: u32,
    /// Code of the sponsoring subscription, if the buyer was referred
    pub referral_code: Option<String>,
    /// How the sale was paid
    pub funding: Funding,
}

/// Committed subscription plus what its distribution did.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    /// Subscription as committed
    pub user_pack: user_pack::Model,
    /// Amount charged
    pub amount: Decimal,
    /// `None` when distribution failed; the purchase itself stands
    pub distribution: Option<DistributionReport>,
}

fn add_months(from: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    from.checked_add_months(Months::new(months))
        .ok_or_else(|| Error::Config {
            message: format!("expiry date overflow adding {months} months to {from}"),
        })
}

/// Charges the sale inside `txn`: wallet debit when wallet-funded, and always
/// the platform mirror.
async fn charge<C>(
    txn: &C,
    buyer_id: i64,
    amount: Decimal,
    funding: &Funding,
    metadata: Metadata,
) -> Result<()>
where
    C: TransactionTrait + ConnectionTrait,
{
    let mut system_metadata = metadata.clone();
    match funding {
        Funding::Wallet => {
            let buyer_wallet = wallet::get_wallet_for_user(txn, buyer_id).await?;
            let entry = wallet::debit(
                txn,
                buyer_wallet.id,
                Posting::new(amount, TransactionType::Purchase).with_metadata(metadata),
            )
            .await?;
            system_metadata = system_metadata.with("wallet_transaction_id", entry.id);
        }
        Funding::External { reference } => {
            system_metadata = system_metadata.with("payment_reference", reference);
        }
    }
    wallet::post_system(
        txn,
        SystemPosting::new(amount, SystemTransactionType::Sale)
            .with_metadata(system_metadata.with("buyer_id", buyer_id)),
    )
    .await?;
    Ok(())
}

async fn distribute_after_commit(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    event: &PurchaseEvent,
) -> Option<DistributionReport> {
    match commission::distribute(db, sink, event).await {
        Ok(report) => Some(report),
        Err(e) => {
            error!(
                "Commission distribution for {} failed: {}",
                event.reference, e
            );
            None
        }
    }
}

/// Records a confirmed purchase, charges it, and distributes commissions.
#[instrument(skip(db, sink, purchase), fields(buyer = purchase.buyer_id, pack = purchase.pack_id))]
pub async fn complete_purchase(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    purchase: NewPurchase,
) -> Result<PurchaseOutcome> {
    if purchase.duration_months == 0 {
        return Err(Error::InvalidAmount {
            amount: Decimal::ZERO,
        });
    }

    let txn = db.begin().await?;
    // Serializes purchases by the same buyer.
    User::find_by_id(purchase.buyer_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", purchase.buyer_id))?;
    let pack = Pack::find_by_id(purchase.pack_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("pack", purchase.pack_id))?;
    if pack.status != PackStatus::Active {
        return Err(Error::Forbidden {
            message: format!("pack {} is not for sale", pack.id),
        });
    }
    if let Some(existing) =
        referral::find_active_user_pack(&txn, purchase.buyer_id, pack.id).await?
    {
        return Err(Error::InvalidState {
            entity: "user pack",
            id: existing.id,
            state: "active".to_string(),
            action: "buy again",
        });
    }

    let sponsor_id = match purchase.referral_code.as_deref() {
        Some(code) => {
            let sponsor_pack = referral::find_by_referral_code(&txn, code)
                .await?
                .ok_or_else(|| Error::not_found("referral code", code))?;
            if sponsor_pack.user_id == purchase.buyer_id {
                return Err(Error::Forbidden {
                    message: "a buyer cannot use their own referral code".to_string(),
                });
            }
            Some(sponsor_pack.user_id)
        }
        None => None,
    };

    let periods =
        commission::billing_periods(purchase.duration_months, commission::months_per_cycle(&pack.abonnement));
    let amount = pack.price * Decimal::from(periods);
    let now = Utc::now();

    let subscription = user_pack::ActiveModel {
        user_id: Set(purchase.buyer_id),
        pack_id: Set(pack.id),
        status: Set(UserPackStatus::Active),
        payment_status: Set(PaymentStatus::Completed),
        purchase_date: Set(now),
        expiry_date: Set(Some(add_months(now, purchase.duration_months)?)),
        sponsor_id: Set(sponsor_id),
        referral_code: Set(referral::generate_referral_code(&txn).await?),
        is_admin_pack: Set(false),
        renewal_count: Set(0),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    charge(
        &txn,
        purchase.buyer_id,
        amount,
        &purchase.funding,
        Metadata::new()
            .with("user_pack_id", subscription.id)
            .with("pack_id", pack.id)
            .with("duration_months", purchase.duration_months),
    )
    .await?;
    txn.commit().await?;
    info!(
        "User {} bought pack {} for {} months ({})",
        purchase.buyer_id, pack.id, purchase.duration_months, amount
    );

    let event = PurchaseEvent {
        user_pack: subscription.clone(),
        duration_months: purchase.duration_months,
        reference: format!("purchase:{}", subscription.id),
    };
    let distribution = distribute_after_commit(db, sink, &event).await;

    Ok(PurchaseOutcome {
        user_pack: subscription,
        amount,
        distribution,
    })
}

/// Extends a subscription, charges the renewal, and distributes commissions.
///
/// The new period starts at the later of now and the current expiry date.
#[instrument(skip(db, sink, funding))]
pub async fn renew_pack(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    user_pack_id: i64,
    duration_months: u32,
    funding: Funding,
) -> Result<PurchaseOutcome> {
    if duration_months == 0 {
        return Err(Error::InvalidAmount {
            amount: Decimal::ZERO,
        });
    }

    let txn = db.begin().await?;
    let current = UserPack::find_by_id(user_pack_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user pack", user_pack_id))?;
    if current.status == UserPackStatus::Inactive {
        return Err(Error::InvalidState {
            entity: "user pack",
            id: current.id,
            state: "inactive".to_string(),
            action: "renew",
        });
    }
    let pack = Pack::find_by_id(current.pack_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("pack", current.pack_id))?;

    let periods =
        commission::billing_periods(duration_months, commission::months_per_cycle(&pack.abonnement));
    let amount = pack.price * Decimal::from(periods);
    let now = Utc::now();
    let start = current.expiry_date.filter(|expiry| *expiry > now).unwrap_or(now);
    let renewal_number = current.renewal_count + 1;
    let buyer_id = current.user_id;

    let mut renewed: user_pack::ActiveModel = current.into();
    renewed.status = Set(UserPackStatus::Active);
    renewed.payment_status = Set(PaymentStatus::Completed);
    renewed.expiry_date = Set(Some(add_months(start, duration_months)?));
    renewed.renewal_count = Set(renewal_number);
    let renewed = renewed.update(&txn).await?;

    charge(
        &txn,
        buyer_id,
        amount,
        &funding,
        Metadata::new()
            .with("user_pack_id", renewed.id)
            .with("pack_id", pack.id)
            .with("duration_months", duration_months)
            .with("renewal", renewal_number),
    )
    .await?;
    txn.commit().await?;
    info!(
        "User {} renewed pack {} for {} months ({})",
        buyer_id, pack.id, duration_months, amount
    );

    let event = PurchaseEvent {
        user_pack: renewed.clone(),
        duration_months,
        reference: format!("renewal:{}:{}", renewed.id, renewal_number),
    };
    let distribution = distribute_after_commit(db, sink, &event).await;

    Ok(PurchaseOutcome {
        user_pack: renewed,
        amount,
        distribution,
    })
}

/// Marks lapsed subscriptions as expired. Admin packs never expire.
///
/// Returns the number of subscriptions updated.
pub async fn expire_packs(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64> {
    let result = UserPack::update_many()
        .col_expr(
            user_pack::Column::Status,
            Expr::value(UserPackStatus::Expired),
        )
        .filter(user_pack::Column::Status.eq(UserPackStatus::Active))
        .filter(user_pack::Column::IsAdminPack.eq(false))
        .filter(user_pack::Column::ExpiryDate.lt(now))
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        info!("Expired {} subscriptions", result.rows_affected);
    }
    Ok(result.rows_affected)
}
