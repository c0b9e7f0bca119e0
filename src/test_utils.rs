//! Shared test utilities for the ledger engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use std::str::FromStr;
use std::sync::Mutex;

use crate::{
    core::{
        events::{DomainEvent, NotificationSink},
        gateway::{self, PayoutGateway, PayoutRequest, PayoutResponse, PayoutStatus},
        referral,
        wallet::{self, Posting},
    },
    entities::{
        Wallet, commission_rate, exchange_rate, pack,
        sea_orm_active_enums::{PackStatus, PaymentStatus, TransactionType, UserPackStatus},
        user, user_pack, wallet as wallet_entity,
    },
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database in a temporary directory.
///
/// Unlike the in-memory store it serves several pooled connections, so
/// concurrent transactions really contend. The directory is removed when the
/// returned guard is dropped.
pub async fn setup_file_test_db() -> Result<(DatabaseConnection, tempfile::TempDir)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("ledger.db").display());
    let db = sea_orm::Database::connect(url).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, dir))
}

/// Routes `tracing` output to the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Parses a decimal literal. Panics on malformed input, tests only.
#[allow(clippy::unwrap_used)]
pub fn money(amount: &str) -> Decimal {
    Decimal::from_str(amount).unwrap()
}

/// Registers a user without a wallet.
pub async fn create_user(db: &DatabaseConnection, account_id: &str) -> Result<user::Model> {
    user::ActiveModel {
        account_id: Set(account_id.to_string()),
        name: Set(format!("User {account_id}")),
        phone: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Registers a user and opens their empty wallet.
pub async fn create_user_with_wallet(
    db: &DatabaseConnection,
    account_id: &str,
) -> Result<(user::Model, wallet_entity::Model)> {
    let user = create_user(db, account_id).await?;
    let wallet = wallet::create_wallet(db, user.id).await?;
    Ok((user, wallet))
}

/// Puts money on a wallet as a plain reception.
pub async fn fund_wallet(db: &DatabaseConnection, wallet_id: i64, amount: Decimal) -> Result<()> {
    wallet::credit(db, wallet_id, Posting::new(amount, TransactionType::Reception)).await?;
    Ok(())
}

/// Re-reads a wallet row.
pub async fn reload_wallet(db: &DatabaseConnection, wallet_id: i64) -> Result<wallet_entity::Model> {
    Wallet::find_by_id(wallet_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("wallet", wallet_id))
}

/// Current balance of a user's wallet.
pub async fn user_balance(db: &DatabaseConnection, user_id: i64) -> Result<Decimal> {
    Ok(wallet::get_wallet_for_user(db, user_id).await?.balance)
}

/// Creates an active pack with a commission schedule.
///
/// # Arguments
/// * `price` - Price per billing cycle
/// * `cadence` - Billing cadence label (e.g. "monthly")
/// * `rates` - `(level, percent)` pairs
pub async fn create_test_pack(
    db: &DatabaseConnection,
    price: &str,
    cadence: &str,
    rates: &[(i32, &str)],
) -> Result<pack::Model> {
    let pack = pack::ActiveModel {
        name: Set(format!("Pack {price} {cadence}")),
        price: Set(money(price)),
        abonnement: Set(cadence.to_string()),
        status: Set(PackStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    for (level, rate) in rates {
        commission_rate::ActiveModel {
            pack_id: Set(pack.id),
            level: Set(*level),
            rate: Set(money(rate)),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(pack)
}

/// Takes a pack off sale.
pub async fn deactivate_pack(db: &DatabaseConnection, pack: &pack::Model) -> Result<()> {
    let mut active: pack::ActiveModel = pack.clone().into();
    active.status = Set(PackStatus::Inactive);
    active.update(db).await?;
    Ok(())
}

/// Subscribes a user with the given statuses and no expiry.
pub async fn subscribe_with_status(
    db: &DatabaseConnection,
    user_id: i64,
    pack_id: i64,
    sponsor_id: Option<i64>,
    status: UserPackStatus,
    payment_status: PaymentStatus,
) -> Result<user_pack::Model> {
    user_pack::ActiveModel {
        user_id: Set(user_id),
        pack_id: Set(pack_id),
        status: Set(status),
        payment_status: Set(payment_status),
        purchase_date: Set(Utc::now()),
        expiry_date: Set(None),
        sponsor_id: Set(sponsor_id),
        referral_code: Set(referral::generate_referral_code(db).await?),
        is_admin_pack: Set(false),
        renewal_count: Set(0),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Subscribes a user with an active, paid subscription.
pub async fn subscribe(
    db: &DatabaseConnection,
    user_id: i64,
    pack_id: i64,
    sponsor_id: Option<i64>,
) -> Result<user_pack::Model> {
    subscribe_with_status(
        db,
        user_id,
        pack_id,
        sponsor_id,
        UserPackStatus::Active,
        PaymentStatus::Completed,
    )
    .await
}

/// Builds a referral chain of `len` subscribers to one pack.
///
/// `chain[0]` has no sponsor and every later entry is sponsored by the one
/// before it, so the last entry is the natural buyer.
pub async fn build_chain(
    db: &DatabaseConnection,
    pack_id: i64,
    len: usize,
) -> Result<Vec<(user::Model, user_pack::Model)>> {
    let mut chain: Vec<(user::Model, user_pack::Model)> = Vec::with_capacity(len);
    for i in 0..len {
        let (user, _) = create_user_with_wallet(db, &format!("CHAIN-{i}")).await?;
        let sponsor_id = chain.last().map(|(sponsor, _)| sponsor.id);
        let subscription = subscribe(db, user.id, pack_id, sponsor_id).await?;
        chain.push((user, subscription));
    }
    Ok(chain)
}

/// Overrides a subscription's status.
pub async fn set_user_pack_status(
    db: &DatabaseConnection,
    subscription: &user_pack::Model,
    status: UserPackStatus,
) -> Result<user_pack::Model> {
    let mut active: user_pack::ActiveModel = subscription.clone().into();
    active.status = Set(status);
    active.update(db).await.map_err(Into::into)
}

/// Overrides a subscription's expiry date and admin flag.
pub async fn set_expiry(
    db: &DatabaseConnection,
    subscription: &user_pack::Model,
    expiry: Option<DateTime<Utc>>,
    is_admin_pack: bool,
) -> Result<user_pack::Model> {
    let mut active: user_pack::ActiveModel = subscription.clone().into();
    active.expiry_date = Set(expiry);
    active.is_admin_pack = Set(is_admin_pack);
    active.update(db).await.map_err(Into::into)
}

/// Stores an exchange rate row.
pub async fn insert_exchange_rate(
    db: &DatabaseConnection,
    from: &str,
    to: &str,
    rate: &str,
) -> Result<exchange_rate::Model> {
    exchange_rate::ActiveModel {
        from_currency: Set(from.to_string()),
        to_currency: Set(to.to_string()),
        rate: Set(money(rate)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Notification sink that keeps every event for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingSink {
    /// Events emitted so far, in order.
    #[allow(clippy::unwrap_used)]
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    #[allow(clippy::unwrap_used)]
    fn emit(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Scripted payout gateway.
///
/// Answers every call with the same status, or fails as unreachable when
/// built with [`MockGateway::unavailable`]. Records every request.
#[derive(Debug, Default)]
pub struct MockGateway {
    answer: Option<PayoutStatus>,
    calls: Mutex<Vec<PayoutRequest>>,
}

impl MockGateway {
    /// Gateway that acknowledges every payout with `status`.
    pub fn answering(status: PayoutStatus) -> Self {
        Self {
            answer: Some(status),
            calls: Mutex::default(),
        }
    }

    /// Gateway that cannot be reached.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Requests received so far, in order.
    #[allow(clippy::unwrap_used)]
    pub fn calls(&self) -> Vec<PayoutRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PayoutGateway for MockGateway {
    #[allow(clippy::unwrap_used)]
    async fn payout(&self, request: &PayoutRequest) -> Result<PayoutResponse> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            calls.len()
        };
        let Some(status) = self.answer else {
            return Err(Error::GatewayUnavailable {
                message: "connection refused".to_string(),
            });
        };
        gateway::ensure_not_failed(PayoutResponse {
            session_id: format!("S-{}-{call_number}", request.reference),
            status,
            message: None,
        })
    }
}
