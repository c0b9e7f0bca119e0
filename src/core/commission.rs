//! Commission distribution engine.
//!
//! On every completed purchase or renewal the engine walks up the buyer's
//! referral chain, one sponsor per level, and records one `Commission` per
//! level that has a rate:
//!
//! - the commissionable base is `pack.price * ceil(duration / months_per_cycle)`;
//! - a sponsor whose own subscription to the pack is active is paid at once
//!   (commission row, wallet credit and platform mirror in one transaction);
//! - a sponsor whose subscription is not active gets a `failed` row and is not
//!   paid, now or later;
//! - a posting failure only fails that level, the walk goes on.
//!
//! The walk stops after [`MAX_LEVEL`] levels, when the chain ends, or when a
//! sponsor shows up twice.

use std::collections::HashSet;

use crate::{
    core::{
        events::{DomainEvent, NotificationSink},
        rates, referral,
        wallet::{self, Metadata, Posting, SystemPosting},
    },
    entities::{
        Commission, Pack, commission,
        sea_orm_active_enums::{
            CommissionStatus, PaymentStatus, SystemTransactionType, TransactionType,
        },
        user_pack,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument, warn};

/// Deepest referral level that earns a commission.
pub const MAX_LEVEL: i32 = 4;

/// Billing cadence of a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Every month
    Monthly,
    /// Every 3 months
    Quarterly,
    /// Every 6 months
    Biannual,
    /// Every 12 months
    Annual,
    /// Every 36 months
    Triennial,
    /// Every 60 months
    Quinquennial,
}

impl Cadence {
    /// Parses an administrator-entered cadence label (English or French).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "monthly" | "mensuel" => Some(Self::Monthly),
            "quarterly" | "trimestriel" => Some(Self::Quarterly),
            "biannual" | "semiannual" | "semestriel" => Some(Self::Biannual),
            "annual" | "yearly" | "annuel" => Some(Self::Annual),
            "triennial" | "triennal" => Some(Self::Triennial),
            "quinquennial" | "quinquennal" => Some(Self::Quinquennial),
            _ => None,
        }
    }

    /// Months covered by one billing cycle.
    #[must_use]
    pub const fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Biannual => 6,
            Self::Annual => 12,
            Self::Triennial => 36,
            Self::Quinquennial => 60,
        }
    }
}

/// Months per billing cycle for a cadence label; unknown labels bill monthly.
#[must_use]
pub fn months_per_cycle(abonnement: &str) -> u32 {
    Cadence::from_label(abonnement).map_or(1, Cadence::months)
}

/// Number of billing cycles a duration spans, rounded up.
#[must_use]
pub const fn billing_periods(duration_months: u32, step: u32) -> u32 {
    duration_months.div_ceil(step)
}

/// A completed purchase or renewal to distribute commissions for.
#[derive(Debug, Clone)]
pub struct PurchaseEvent {
    /// Buyer's subscription, already committed
    pub user_pack: user_pack::Model,
    /// Paid duration
    pub duration_months: u32,
    /// Identifies the event; commissions are never created twice for one reference
    pub reference: String,
}

/// What happened at one level of the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelOutcome {
    /// Sponsor was paid
    Paid(commission::Model),
    /// Commission recorded as failed
    Failed(commission::Model),
    /// No rate (or a zero rate) at this level; nothing recorded
    Skipped {
        /// Level skipped
        level: i32,
        /// Sponsor at that level
        sponsor_id: i64,
    },
}

/// Result of one distribution.
#[derive(Debug, Clone, Default)]
pub struct DistributionReport {
    /// Commissionable base
    pub pack_price: Decimal,
    /// One entry per visited level, in ascending level order
    pub levels: Vec<LevelOutcome>,
    /// The event had already been distributed; nothing was done
    pub already_distributed: bool,
}

impl DistributionReport {
    /// Sum of commissions actually credited.
    #[must_use]
    pub fn total_paid(&self) -> Decimal {
        self.levels
            .iter()
            .filter_map(|outcome| match outcome {
                LevelOutcome::Paid(c) => Some(c.amount),
                _ => None,
            })
            .sum()
    }
}

/// Distributes referral commissions for one purchase or renewal.
///
/// Must be called once per event, after the buyer's `UserPack` has been
/// committed. A repeated call with the same reference is a no-op.
#[instrument(skip(db, sink, event), fields(user_pack_id = event.user_pack.id, reference = %event.reference))]
pub async fn distribute(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    event: &PurchaseEvent,
) -> Result<DistributionReport> {
    let purchase = &event.user_pack;
    if event.duration_months == 0 {
        return Err(Error::InvalidAmount {
            amount: Decimal::ZERO,
        });
    }

    let already = Commission::find()
        .filter(commission::Column::EventRef.eq(event.reference.as_str()))
        .count(db)
        .await?;
    if already > 0 {
        info!("Commissions for {} already distributed", event.reference);
        return Ok(DistributionReport {
            already_distributed: true,
            ..Default::default()
        });
    }

    let pack = Pack::find_by_id(purchase.pack_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("pack", purchase.pack_id))?;
    let periods = billing_periods(event.duration_months, months_per_cycle(&pack.abonnement));
    let pack_price = pack.price * Decimal::from(periods);

    let mut report = DistributionReport {
        pack_price,
        ..Default::default()
    };
    let mut visited = HashSet::from([purchase.user_id]);
    let mut sponsor = purchase.sponsor_id;
    let now = Utc::now();

    for level in 1..=MAX_LEVEL {
        let Some(sponsor_id) = sponsor else { break };
        if !visited.insert(sponsor_id) {
            warn!("Referral cycle at user {} (level {}); stopping", sponsor_id, level);
            break;
        }
        let sponsor_pack = referral::find_sponsor_pack(db, sponsor_id, pack.id).await?;

        match rates::rate_for(db, pack.id, level).await? {
            Some(rate) if rate > Decimal::ZERO => {
                let amount = (pack_price * rate / Decimal::ONE_HUNDRED).round_dp(2);
                let draft = CommissionDraft {
                    event,
                    sponsor_id,
                    level,
                    amount,
                };
                let outcome = match &sponsor_pack {
                    Some(own) if own.is_active_at(now) => settle(db, &draft).await?,
                    Some(_) => {
                        let reason = format!(
                            "Sponsor {sponsor_id} has no active subscription to pack {}",
                            pack.id
                        );
                        record_failed(db, &draft, reason).await?
                    }
                    None => {
                        let reason =
                            format!("Sponsor {sponsor_id} is not subscribed to pack {}", pack.id);
                        record_failed(db, &draft, reason).await?
                    }
                };
                if let LevelOutcome::Paid(paid) = &outcome {
                    sink.emit(DomainEvent::CommissionReceived {
                        commission_id: paid.id,
                        user_id: paid.user_id,
                        source_user_id: paid.source_user_id,
                        pack_id: paid.pack_id,
                        level: paid.level,
                        amount: paid.amount,
                    });
                }
                report.levels.push(outcome);
            }
            _ => {
                debug!(
                    "{}; skipping accrual",
                    Error::RateNotConfigured {
                        pack_id: pack.id,
                        level
                    }
                );
                report.levels.push(LevelOutcome::Skipped { level, sponsor_id });
            }
        }

        sponsor = sponsor_pack
            .filter(|own| own.payment_status == PaymentStatus::Completed)
            .and_then(|own| own.sponsor_id);
    }

    info!(
        "Distributed {} of commissions over {} levels for {}",
        report.total_paid(),
        report.levels.len(),
        event.reference
    );
    Ok(report)
}

struct CommissionDraft<'a> {
    event: &'a PurchaseEvent,
    sponsor_id: i64,
    level: i32,
    amount: Decimal,
}

impl CommissionDraft<'_> {
    fn active_model(&self, status: CommissionStatus) -> commission::ActiveModel {
        let purchase = &self.event.user_pack;
        commission::ActiveModel {
            event_ref: Set(self.event.reference.clone()),
            user_id: Set(self.sponsor_id),
            source_user_id: Set(purchase.user_id),
            pack_id: Set(purchase.pack_id),
            user_pack_id: Set(purchase.id),
            level: Set(self.level),
            amount: Set(self.amount),
            status: Set(status),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
    }

    fn metadata(&self, commission_id: i64) -> Metadata {
        let purchase = &self.event.user_pack;
        Metadata::new()
            .with("commission_id", commission_id)
            .with("level", self.level)
            .with("source_user_id", purchase.user_id)
            .with("pack_id", purchase.pack_id)
            .with("event", &self.event.reference)
    }
}

/// Pays one level: commission row, wallet credit and platform mirror commit
/// together. A failure here is recorded on a `failed` row instead.
async fn settle(db: &DatabaseConnection, draft: &CommissionDraft<'_>) -> Result<LevelOutcome> {
    match try_settle(db, draft).await {
        Ok(paid) => {
            info!(
                "Level {} commission of {} paid to user {}",
                draft.level, draft.amount, draft.sponsor_id
            );
            Ok(LevelOutcome::Paid(paid))
        }
        Err(e) => {
            warn!(
                "Level {} commission for user {} could not be posted: {}",
                draft.level, draft.sponsor_id, e
            );
            record_failed(db, draft, format!("Posting failed: {e}")).await
        }
    }
}

async fn try_settle(db: &DatabaseConnection, draft: &CommissionDraft<'_>) -> Result<commission::Model> {
    let txn = db.begin().await?;
    let pending = draft
        .active_model(CommissionStatus::Pending)
        .insert(&txn)
        .await?;

    let sponsor_wallet = wallet::get_wallet_for_user(&txn, draft.sponsor_id).await?;
    let entry = wallet::credit(
        &txn,
        sponsor_wallet.id,
        Posting::new(draft.amount, TransactionType::Commission)
            .with_metadata(draft.metadata(pending.id)),
    )
    .await?;
    wallet::post_system(
        &txn,
        SystemPosting::new(draft.amount, SystemTransactionType::Commission).with_metadata(
            draft
                .metadata(pending.id)
                .with("wallet_transaction_id", entry.id)
                .with("user_id", draft.sponsor_id),
        ),
    )
    .await?;

    let mut completed: commission::ActiveModel = pending.into();
    completed.status = Set(CommissionStatus::Completed);
    completed.wallet_transaction_id = Set(Some(entry.id));
    let completed = completed.update(&txn).await?;

    txn.commit().await?;
    Ok(completed)
}

async fn record_failed(
    db: &DatabaseConnection,
    draft: &CommissionDraft<'_>,
    reason: String,
) -> Result<LevelOutcome> {
    warn!(
        "Level {} commission of {} for user {} failed: {}",
        draft.level, draft.amount, draft.sponsor_id, reason
    );
    let mut failed = draft.active_model(CommissionStatus::Failed);
    failed.error_message = Set(Some(reason));
    Ok(LevelOutcome::Failed(failed.insert(db).await?))
}

/// Lists commissions earned by a user, newest first.
pub async fn get_commissions_for_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<commission::Model>> {
    Commission::find()
        .filter(commission::Column::UserId.eq(user_id))
        .order_by_desc(commission::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists the commissions generated by one purchase event, by level.
pub async fn get_commissions_for_event(
    db: &DatabaseConnection,
    reference: &str,
) -> Result<Vec<commission::Model>> {
    Commission::find()
        .filter(commission::Column::EventRef.eq(reference))
        .order_by_asc(commission::Column::Level)
        .all(db)
        .await
        .map_err(Into::into)
}
