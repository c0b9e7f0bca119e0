//! Wallet posting service - the only code allowed to move a balance.
//!
//! Every primitive runs as one unit of work: lock the wallet row, re-read the
//! balance, refuse overdrafts, update the aggregates, append the ledger entry,
//! commit. When called with an open `DatabaseTransaction` the unit of work
//! becomes a savepoint of the caller's transaction, so a caller can bundle a
//! posting with its own state change (a commission status, a withdrawal
//! status) and have both commit or neither.
//!
//! The service does not deduplicate. Callers post at most once per logical
//! event.

use crate::{
    core::events::{DomainEvent, NotificationSink},
    entities::{
        User, Wallet, WalletSystem, WalletTransaction,
        sea_orm_active_enums::{
            EntryDirection, SystemTransactionType, TransactionStatus, TransactionType,
        },
        wallet, wallet_system, wallet_system_transaction, wallet_transaction,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    DbErr, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::OnConflict,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

/// Free-form audit payload attached to ledger entries.
///
/// Amount, type and status are typed columns; everything else an auditor may
/// want (level, buyer, withdrawal id, gateway reference) goes here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one key. Values that cannot be represented as JSON are stored as null.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        self.0
            .insert(key.to_string(), serde_json::to_value(value).unwrap_or_default());
        self
    }

    /// Reads one key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Converts into the JSON document stored in the `metadata` column.
    #[must_use]
    pub fn into_json(self) -> Value {
        Value::Object(self.0)
    }
}

/// One user wallet movement to apply.
#[derive(Debug, Clone)]
pub struct Posting {
    /// Strictly positive amount
    pub amount: Decimal,
    /// Business reason
    pub transaction_type: TransactionType,
    /// Initial status of the ledger entry
    pub status: TransactionStatus,
    /// Audit payload
    pub metadata: Metadata,
}

impl Posting {
    /// A completed posting with empty metadata.
    #[must_use]
    pub fn new(amount: Decimal, transaction_type: TransactionType) -> Self {
        Self {
            amount,
            transaction_type,
            status: TransactionStatus::Completed,
            metadata: Metadata::new(),
        }
    }

    /// Overrides the initial status.
    #[must_use]
    pub const fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    /// Attaches an audit payload.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One platform ledger movement to apply.
#[derive(Debug, Clone)]
pub struct SystemPosting {
    /// Strictly positive amount
    pub amount: Decimal,
    /// Kind of platform movement; decides the direction
    pub transaction_type: SystemTransactionType,
    /// Entry status
    pub status: TransactionStatus,
    /// Audit payload stored with the entry
    pub metadata: Metadata,
}

impl SystemPosting {
    /// A completed platform posting with empty metadata.
    #[must_use]
    pub fn new(amount: Decimal, transaction_type: SystemTransactionType) -> Self {
        Self {
            amount,
            transaction_type,
            status: TransactionStatus::Completed,
            metadata: Metadata::new(),
        }
    }

    /// Attaches an audit payload.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

/// Opens a wallet for a newly registered user. Returns the existing wallet if
/// the user already has one.
pub async fn create_wallet<C>(db: &C, user_id: i64) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    if let Some(existing) = Wallet::find()
        .filter(wallet::Column::UserId.eq(user_id))
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let now = Utc::now();
    let wallet = wallet::ActiveModel {
        user_id: Set(user_id),
        balance: Set(Decimal::ZERO),
        total_earned: Set(Decimal::ZERO),
        total_withdrawn: Set(Decimal::ZERO),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!("Opened wallet {} for user {}", wallet.id, user_id);
    Ok(wallet)
}

/// Finds the wallet owned by a user.
pub async fn get_wallet_for_user<C>(db: &C, user_id: i64) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    Wallet::find()
        .filter(wallet::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("wallet for user", user_id))
}

async fn lock_wallet<C>(db: &C, wallet_id: i64) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    Wallet::find_by_id(wallet_id)
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("wallet", wallet_id))
}

/// Credits a wallet and appends the ledger entry, atomically.
#[instrument(skip(db, posting), fields(amount = %posting.amount, kind = ?posting.transaction_type))]
pub async fn credit<C>(db: &C, wallet_id: i64, posting: Posting) -> Result<wallet_transaction::Model>
where
    C: TransactionTrait,
{
    apply(db, wallet_id, EntryDirection::Credit, posting).await
}

/// Debits a wallet and appends the ledger entry, atomically.
///
/// Fails with [`Error::InsufficientFunds`] when the balance re-read under lock
/// is smaller than the amount; nothing is written in that case.
#[instrument(skip(db, posting), fields(amount = %posting.amount, kind = ?posting.transaction_type))]
pub async fn debit<C>(db: &C, wallet_id: i64, posting: Posting) -> Result<wallet_transaction::Model>
where
    C: TransactionTrait,
{
    apply(db, wallet_id, EntryDirection::Debit, posting).await
}

async fn apply<C>(
    db: &C,
    wallet_id: i64,
    direction: EntryDirection,
    posting: Posting,
) -> Result<wallet_transaction::Model>
where
    C: TransactionTrait,
{
    ensure_positive(posting.amount)?;

    let txn = db.begin().await?;
    let current = lock_wallet(&txn, wallet_id).await?;

    let mut total_earned = current.total_earned;
    let mut total_withdrawn = current.total_withdrawn;
    let new_balance = match direction {
        EntryDirection::Credit => {
            if posting.transaction_type == TransactionType::Refund {
                total_withdrawn = (total_withdrawn - posting.amount).max(Decimal::ZERO);
            } else {
                total_earned += posting.amount;
            }
            current.balance + posting.amount
        }
        EntryDirection::Debit => {
            if current.balance < posting.amount {
                return Err(Error::InsufficientFunds {
                    wallet_id,
                    current: current.balance,
                    required: posting.amount,
                });
            }
            if posting.transaction_type == TransactionType::Withdrawal {
                total_withdrawn += posting.amount;
            }
            current.balance - posting.amount
        }
    };

    let now = Utc::now();
    let mut wallet_update: wallet::ActiveModel = current.into();
    wallet_update.balance = Set(new_balance);
    wallet_update.total_earned = Set(total_earned);
    wallet_update.total_withdrawn = Set(total_withdrawn);
    wallet_update.updated_at = Set(now);
    wallet_update.update(&txn).await?;

    let entry = wallet_transaction::ActiveModel {
        wallet_id: Set(wallet_id),
        amount: Set(posting.amount),
        direction: Set(direction),
        transaction_type: Set(posting.transaction_type),
        status: Set(posting.status),
        balance_after: Set(new_balance),
        metadata: Set(posting.metadata.into_json()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(
        "Posted {:?} {:?} of {} on wallet {} (balance now {})",
        direction, entry.transaction_type, entry.amount, wallet_id, new_balance
    );
    Ok(entry)
}

/// Loads the platform wallet under lock, creating it on first demand.
///
/// The unique `singleton_key` makes concurrent first calls converge on one row.
pub async fn get_or_create_system_wallet<C>(db: &C) -> Result<wallet_system::Model>
where
    C: ConnectionTrait,
{
    let find = || {
        WalletSystem::find()
            .filter(wallet_system::Column::SingletonKey.eq(wallet_system::SINGLETON_KEY))
            .lock_exclusive()
    };
    if let Some(existing) = find().one(db).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let row = wallet_system::ActiveModel {
        singleton_key: Set(wallet_system::SINGLETON_KEY.to_string()),
        balance: Set(Decimal::ZERO),
        total_in: Set(Decimal::ZERO),
        total_out: Set(Decimal::ZERO),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    match WalletSystem::insert(row)
        .on_conflict(
            OnConflict::column(wallet_system::Column::SingletonKey)
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await
    {
        Ok(_) => debug!("Created platform wallet"),
        Err(DbErr::RecordNotInserted) => debug!("Platform wallet created concurrently"),
        Err(e) => return Err(e.into()),
    }

    find()
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("platform wallet", wallet_system::SINGLETON_KEY))
}

/// Posts a movement to the platform ledger, atomically.
///
/// Payout entries are informational and leave the platform balance untouched.
#[instrument(skip(db, posting), fields(amount = %posting.amount, kind = ?posting.transaction_type))]
pub async fn post_system<C>(db: &C, posting: SystemPosting) -> Result<wallet_system_transaction::Model>
where
    C: TransactionTrait,
{
    ensure_positive(posting.amount)?;

    let txn = db.begin().await?;
    let current = get_or_create_system_wallet(&txn).await?;

    let direction = posting.transaction_type.direction();
    let (balance, total_in, total_out) = match direction {
        Some(EntryDirection::Credit) => (
            current.balance + posting.amount,
            current.total_in + posting.amount,
            current.total_out,
        ),
        Some(EntryDirection::Debit) => (
            current.balance - posting.amount,
            current.total_in,
            current.total_out + posting.amount,
        ),
        None => (current.balance, current.total_in, current.total_out),
    };

    let now = Utc::now();
    let mut system_update: wallet_system::ActiveModel = current.into();
    system_update.balance = Set(balance);
    system_update.total_in = Set(total_in);
    system_update.total_out = Set(total_out);
    system_update.updated_at = Set(now);
    system_update.update(&txn).await?;

    let entry = wallet_system_transaction::ActiveModel {
        amount: Set(posting.amount),
        direction: Set(direction),
        transaction_type: Set(posting.transaction_type),
        status: Set(posting.status),
        balance_after: Set(balance),
        metadata: Set(posting.metadata.into_json()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(
        "Posted platform {:?} of {} (platform balance now {})",
        entry.transaction_type, entry.amount, balance
    );
    Ok(entry)
}

/// Changes the status of a ledger entry after an external payment outcome.
/// This is the only mutation a `WalletTransaction` ever receives.
pub async fn set_transaction_status<C>(
    db: &C,
    transaction_id: i64,
    status: TransactionStatus,
) -> Result<wallet_transaction::Model>
where
    C: ConnectionTrait,
{
    let entry = WalletTransaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("wallet transaction", transaction_id))?;
    let mut active: wallet_transaction::ActiveModel = entry.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Lists a wallet's ledger entries, newest first.
pub async fn get_transactions_for_wallet<C>(
    db: &C,
    wallet_id: i64,
) -> Result<Vec<wallet_transaction::Model>>
where
    C: ConnectionTrait,
{
    WalletTransaction::find()
        .filter(wallet_transaction::Column::WalletId.eq(wallet_id))
        .order_by_desc(wallet_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Result of a user-to-user transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    /// Sender's ledger entry (amount + fee)
    pub debit: wallet_transaction::Model,
    /// Receiver's ledger entry
    pub credit: wallet_transaction::Model,
    /// Fee retained by the platform
    pub fee: Decimal,
}

/// Moves funds between two users. The sender pays `amount` plus a percentage
/// fee that goes to the platform ledger.
pub async fn transfer(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    from_user_id: i64,
    to_user_id: i64,
    amount: Decimal,
    fee_percent: Decimal,
) -> Result<TransferReceipt> {
    ensure_positive(amount)?;
    if from_user_id == to_user_id {
        return Err(Error::Forbidden {
            message: "cannot transfer funds to your own wallet".to_string(),
        });
    }
    let fee = (amount * fee_percent / Decimal::ONE_HUNDRED).round_dp(2);

    let txn = db.begin().await?;
    let sender = get_wallet_for_user(&txn, from_user_id).await?;
    let receiver = get_wallet_for_user(&txn, to_user_id).await?;

    // Lock both rows in id order so opposite transfers cannot deadlock.
    let (first, second) = if sender.id < receiver.id {
        (sender.id, receiver.id)
    } else {
        (receiver.id, sender.id)
    };
    lock_wallet(&txn, first).await?;
    lock_wallet(&txn, second).await?;

    let debit_entry = debit(
        &txn,
        sender.id,
        Posting::new(amount + fee, TransactionType::Transfer).with_metadata(
            Metadata::new()
                .with("to_user_id", to_user_id)
                .with("amount", amount)
                .with("fee", fee),
        ),
    )
    .await?;
    let credit_entry = credit(
        &txn,
        receiver.id,
        Posting::new(amount, TransactionType::Reception)
            .with_metadata(Metadata::new().with("from_user_id", from_user_id)),
    )
    .await?;
    if fee > Decimal::ZERO {
        post_system(
            &txn,
            SystemPosting::new(fee, SystemTransactionType::Fee).with_metadata(
                Metadata::new()
                    .with("reason", "transfer")
                    .with("wallet_transaction_id", debit_entry.id),
            ),
        )
        .await?;
    }
    txn.commit().await?;

    sink.emit(DomainEvent::FundsTransferred {
        from_user_id,
        to_user_id,
        amount,
        fee,
    });
    Ok(TransferReceipt {
        debit: debit_entry,
        credit: credit_entry,
        fee,
    })
}

/// Credits a cash-equivalent lottery prize, funded by the platform.
pub async fn award_prize(
    db: &DatabaseConnection,
    user_id: i64,
    amount: Decimal,
    metadata: Metadata,
) -> Result<wallet_transaction::Model> {
    ensure_positive(amount)?;
    let txn = db.begin().await?;
    let wallet = get_wallet_for_user(&txn, user_id).await?;
    let entry = credit(
        &txn,
        wallet.id,
        Posting::new(amount, TransactionType::Prize).with_metadata(metadata.clone()),
    )
    .await?;
    post_system(
        &txn,
        SystemPosting::new(amount, SystemTransactionType::Prize)
            .with_metadata(metadata.with("wallet_transaction_id", entry.id)),
    )
    .await?;
    txn.commit().await?;
    Ok(entry)
}

/// Spends wallet balance inside the platform (jetons, tickets). The platform
/// books it as a sale.
pub async fn consume_balance(
    db: &DatabaseConnection,
    user_id: i64,
    amount: Decimal,
    metadata: Metadata,
) -> Result<wallet_transaction::Model> {
    ensure_positive(amount)?;
    let txn = db.begin().await?;
    let wallet = get_wallet_for_user(&txn, user_id).await?;
    let entry = debit(
        &txn,
        wallet.id,
        Posting::new(amount, TransactionType::Consumption).with_metadata(metadata.clone()),
    )
    .await?;
    post_system(
        &txn,
        SystemPosting::new(amount, SystemTransactionType::Sale)
            .with_metadata(metadata.with("wallet_transaction_id", entry.id)),
    )
    .await?;
    txn.commit().await?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_credit_updates_balance_and_appends_entry() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, wallet) = create_user_with_wallet(&db, "ACC-1").await?;

        let entry = credit(
            &db,
            wallet.id,
            Posting::new(money("25.50"), TransactionType::Commission)
                .with_metadata(Metadata::new().with("level", 1)),
        )
        .await?;

        assert_eq!(entry.direction, EntryDirection::Credit);
        assert_eq!(entry.balance_after, money("25.50"));
        assert_eq!(entry.metadata["level"], 1);

        let wallet = reload_wallet(&db, wallet.id).await?;
        assert_eq!(wallet.balance, money("25.50"));
        assert_eq!(wallet.total_earned, money("25.50"));
        assert_eq!(wallet.total_withdrawn, Decimal::ZERO);
        Ok(())
    }

    #[tokio::test]
    async fn test_debit_rejects_overdraft_without_side_effects() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, wallet) = create_user_with_wallet(&db, "ACC-1").await?;
        fund_wallet(&db, wallet.id, money("20")).await?;

        let result = debit(
            &db,
            wallet.id,
            Posting::new(money("30"), TransactionType::Withdrawal),
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::InsufficientFunds { wallet_id, .. }) if wallet_id == wallet.id
        ));

        let wallet = reload_wallet(&db, wallet.id).await?;
        assert_eq!(wallet.balance, money("20"));
        assert_eq!(get_transactions_for_wallet(&db, wallet.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_racing_debits_never_overdraw() -> Result<()> {
        let (db, _dir) = setup_file_test_db().await?;
        let (_, wallet) = create_user_with_wallet(&db, "ACC-1").await?;
        fund_wallet(&db, wallet.id, money("10")).await?;

        let (first, second) = tokio::join!(
            debit(&db, wallet.id, Posting::new(money("8"), TransactionType::Purchase)),
            debit(&db, wallet.id, Posting::new(money("8"), TransactionType::Purchase)),
        );
        let mut debited: usize = 0;
        for result in [first, second] {
            match result {
                Ok(_) => debited += 1,
                Err(Error::InsufficientFunds { .. } | Error::ConcurrencyConflict { .. }) => {}
                Err(e) => panic!("unexpected debit error: {e}"),
            }
        }
        assert!(debited <= 1);

        let wallet = reload_wallet(&db, wallet.id).await?;
        assert_eq!(wallet.balance, money("10") - money("8") * Decimal::from(debited));
        assert!(wallet.balance >= Decimal::ZERO);
        assert_eq!(get_transactions_for_wallet(&db, wallet.id).await?.len(), 1 + debited);
        Ok(())
    }

    #[tokio::test]
    async fn test_posting_against_held_write_lock_is_a_conflict() -> Result<()> {
        let (db, _dir) = setup_file_test_db().await?;
        let (_, wallet) = create_user_with_wallet(&db, "ACC-1").await?;
        fund_wallet(&db, wallet.id, money("10")).await?;

        let holder = db.begin().await?;
        credit(&holder, wallet.id, Posting::new(money("1"), TransactionType::Commission)).await?;
        let blocked = debit(&db, wallet.id, Posting::new(money("4"), TransactionType::Purchase)).await;
        holder.rollback().await?;

        assert!(matches!(blocked, Err(Error::ConcurrencyConflict { .. })));
        let wallet = reload_wallet(&db, wallet.id).await?;
        assert_eq!(wallet.balance, money("10"));
        assert_eq!(get_transactions_for_wallet(&db, wallet.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_positive_amounts_are_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, wallet) = create_user_with_wallet(&db, "ACC-1").await?;

        for amount in [Decimal::ZERO, money("-5")] {
            let result = credit(&db, wallet.id, Posting::new(amount, TransactionType::Prize)).await;
            assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_withdrawal_and_refund_track_total_withdrawn() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, wallet) = create_user_with_wallet(&db, "ACC-1").await?;
        fund_wallet(&db, wallet.id, money("50")).await?;

        debit(&db, wallet.id, Posting::new(money("30"), TransactionType::Withdrawal)).await?;
        let frozen = reload_wallet(&db, wallet.id).await?;
        assert_eq!(frozen.balance, money("20"));
        assert_eq!(frozen.total_withdrawn, money("30"));

        credit(&db, wallet.id, Posting::new(money("30"), TransactionType::Refund)).await?;
        let refunded = reload_wallet(&db, wallet.id).await?;
        assert_eq!(refunded.balance, money("50"));
        assert_eq!(refunded.total_withdrawn, Decimal::ZERO);
        assert_eq!(refunded.total_earned, money("50"));
        Ok(())
    }

    #[tokio::test]
    async fn test_posting_inside_rolled_back_transaction_leaves_no_trace() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, wallet) = create_user_with_wallet(&db, "ACC-1").await?;

        let txn = db.begin().await?;
        credit(&txn, wallet.id, Posting::new(money("10"), TransactionType::Commission)).await?;
        txn.rollback().await?;

        let wallet = reload_wallet(&db, wallet.id).await?;
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert!(get_transactions_for_wallet(&db, wallet.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_system_wallet_is_a_singleton() -> Result<()> {
        let db = setup_test_db().await?;
        let first = get_or_create_system_wallet(&db).await?;
        let second = get_or_create_system_wallet(&db).await?;
        assert_eq!(first.id, second.id);
        assert_eq!(WalletSystem::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_post_system_tracks_inflow_and_outflow() -> Result<()> {
        let db = setup_test_db().await?;
        post_system(&db, SystemPosting::new(money("100"), SystemTransactionType::Sale)).await?;
        post_system(&db, SystemPosting::new(money("15"), SystemTransactionType::Commission)).await?;
        let payout =
            post_system(&db, SystemPosting::new(money("40"), SystemTransactionType::Payout)).await?;
        assert!(payout.direction.is_none());

        let system = get_or_create_system_wallet(&db).await?;
        assert_eq!(system.balance, money("85"));
        assert_eq!(system.total_in, money("100"));
        assert_eq!(system.total_out, money("15"));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_wallet_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let (user, wallet) = create_user_with_wallet(&db, "ACC-1").await?;
        let again = create_wallet(&db, user.id).await?;
        assert_eq!(wallet.id, again.id);

        let missing = create_wallet(&db, 9_999).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_moves_funds_and_fee() -> Result<()> {
        let db = setup_test_db().await?;
        let sink = RecordingSink::default();
        let (alice, alice_wallet) = create_user_with_wallet(&db, "ACC-A").await?;
        let (bob, bob_wallet) = create_user_with_wallet(&db, "ACC-B").await?;
        fund_wallet(&db, alice_wallet.id, money("100")).await?;

        let receipt = transfer(&db, &sink, alice.id, bob.id, money("40"), money("2.5")).await?;
        assert_eq!(receipt.fee, money("1"));
        assert_eq!(receipt.debit.amount, money("41"));

        assert_eq!(reload_wallet(&db, alice_wallet.id).await?.balance, money("59"));
        assert_eq!(reload_wallet(&db, bob_wallet.id).await?.balance, money("40"));
        assert_eq!(get_or_create_system_wallet(&db).await?.balance, money("1"));
        assert_eq!(
            sink.events(),
            vec![DomainEvent::FundsTransferred {
                from_user_id: alice.id,
                to_user_id: bob.id,
                amount: money("40"),
                fee: money("1"),
            }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_transfer_rolls_back_and_stays_silent() -> Result<()> {
        let db = setup_test_db().await?;
        let sink = RecordingSink::default();
        let (alice, alice_wallet) = create_user_with_wallet(&db, "ACC-A").await?;
        let (bob, bob_wallet) = create_user_with_wallet(&db, "ACC-B").await?;
        fund_wallet(&db, alice_wallet.id, money("10")).await?;

        let result = transfer(&db, &sink, alice.id, bob.id, money("10"), money("5")).await;
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
        assert_eq!(reload_wallet(&db, alice_wallet.id).await?.balance, money("10"));
        assert_eq!(reload_wallet(&db, bob_wallet.id).await?.balance, Decimal::ZERO);
        assert!(sink.events().is_empty());

        let to_self = transfer(&db, &sink, alice.id, alice.id, money("1"), Decimal::ZERO).await;
        assert!(matches!(to_self, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_prize_and_consumption_mirror_platform_ledger() -> Result<()> {
        let db = setup_test_db().await?;
        let (user, wallet) = create_user_with_wallet(&db, "ACC-1").await?;

        award_prize(&db, user.id, money("30"), Metadata::new().with("ticket", "T-1")).await?;
        consume_balance(&db, user.id, money("12"), Metadata::new().with("jetons", 3)).await?;

        assert_eq!(reload_wallet(&db, wallet.id).await?.balance, money("18"));
        let system = get_or_create_system_wallet(&db).await?;
        assert_eq!(system.total_out, money("30"));
        assert_eq!(system.total_in, money("12"));
        assert_eq!(system.balance, money("-18"));
        Ok(())
    }

    #[tokio::test]
    async fn test_set_transaction_status() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, wallet) = create_user_with_wallet(&db, "ACC-1").await?;
        fund_wallet(&db, wallet.id, money("10")).await?;
        let entry = debit(
            &db,
            wallet.id,
            Posting::new(money("10"), TransactionType::Withdrawal)
                .with_status(TransactionStatus::Pending),
        )
        .await?;

        let updated = set_transaction_status(&db, entry.id, TransactionStatus::Rejected).await?;
        assert_eq!(updated.status, TransactionStatus::Rejected);
        assert_eq!(updated.amount, entry.amount);
        Ok(())
    }
}
