//! Withdrawal lifecycle: freeze, then approve (payout), reject or cancel
//! (refund), with the gateway callback settling approved payouts.
//!
//! Funds leave the wallet when the request is created. From then on the
//! request, not the wallet, holds them: a refund puts them back, a completed
//! payout sends them out of the platform. [`approve`] claims the request under
//! lock before calling the gateway, so nothing can refund it while a payout is
//! in flight; the call itself runs outside any transaction.

use crate::{
    config::settings::WithdrawalSettings,
    core::{
        events::{DomainEvent, NotificationSink},
        gateway::{self, PayoutGateway, PayoutRequest, PayoutStatus},
        rates,
        wallet::{self, Metadata, Posting, SystemPosting},
    },
    entities::{
        WalletTransaction, WithdrawalRequest,
        sea_orm_active_enums::{
            PaymentStatus, SystemTransactionType, TransactionStatus, TransactionType,
            WithdrawalStatus,
        },
        withdrawal_request,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

/// Where the user wants to be paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutTarget {
    /// Mobile-money phone number
    pub phone: String,
    /// Mobile-money operator
    pub carrier: String,
    /// Currency the user wants to receive
    pub currency: String,
}

/// Audit document stored in `withdrawal_requests.payment_details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Where the payout goes
    pub target: PayoutTarget,
    /// Ledger currency the frozen amount is expressed in
    pub ledger_currency: String,
    /// Withdrawal fee rate applied at request time
    pub fee_percent: Decimal,
    /// Fee retained by the platform, in ledger currency
    pub fee: Decimal,
    /// Amount owed to the user, in ledger currency
    pub net_amount: Decimal,
    /// Set at approval when the payout currency differs from the ledger currency
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    /// Amount sent to the gateway, in the payout currency
    #[serde(default)]
    pub payout_amount: Option<Decimal>,
}

impl PaymentDetails {
    fn from_request(request: &withdrawal_request::Model) -> Result<Self> {
        serde_json::from_value(request.payment_details.clone()).map_err(Into::into)
    }
}

fn invalid_state(request: &withdrawal_request::Model, action: &'static str) -> Error {
    let state = match request.payment_status {
        Some(PaymentStatus::Pending) if request.status == WithdrawalStatus::Pending => {
            format!("{} (payout dispatching)", request.status)
        }
        Some(PaymentStatus::Pending) => format!("{} (payout pending)", request.status),
        Some(PaymentStatus::Completed) => format!("{} (payout completed)", request.status),
        Some(PaymentStatus::Failed) => format!("{} (payout failed)", request.status),
        None => request.status.to_string(),
    };
    Error::InvalidState {
        entity: "withdrawal request",
        id: request.id,
        state,
        action,
    }
}

/// A request can be (re-)approved while pending and no payout is in flight.
fn is_approvable(request: &withdrawal_request::Model) -> bool {
    matches!(request.status, WithdrawalStatus::Pending)
        && matches!(request.payment_status, None | Some(PaymentStatus::Failed))
}

/// A payout has been claimed for dispatch and its outcome is not recorded yet.
fn is_dispatching(request: &withdrawal_request::Model) -> bool {
    request.status == WithdrawalStatus::Pending
        && request.payment_status == Some(PaymentStatus::Pending)
}

fn payout_reference(request: &withdrawal_request::Model) -> String {
    format!("withdrawal-{}-{}", request.id, request.payout_attempts)
}

fn processed_event(request: &withdrawal_request::Model) -> DomainEvent {
    DomainEvent::WithdrawalProcessed {
        withdrawal_id: request.id,
        user_id: request.user_id,
        status: request.status,
        amount: request.amount,
    }
}

async fn lock_request<C>(db: &C, request_id: i64) -> Result<withdrawal_request::Model>
where
    C: ConnectionTrait,
{
    WithdrawalRequest::find_by_id(request_id)
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("withdrawal request", request_id))
}

/// Loads a withdrawal request by id.
pub async fn get_withdrawal<C>(db: &C, request_id: i64) -> Result<withdrawal_request::Model>
where
    C: ConnectionTrait,
{
    WithdrawalRequest::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("withdrawal request", request_id))
}

/// Requests awaiting an administrator, oldest first.
pub async fn list_pending(db: &DatabaseConnection) -> Result<Vec<withdrawal_request::Model>> {
    WithdrawalRequest::find()
        .filter(withdrawal_request::Column::Status.eq(WithdrawalStatus::Pending))
        .order_by_asc(withdrawal_request::Column::CreatedAt)
        .order_by_asc(withdrawal_request::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Opens a withdrawal request and freezes the amount.
///
/// The freezing debit and the request row commit together.
#[instrument(skip(db, settings, target))]
pub async fn create_request(
    db: &DatabaseConnection,
    settings: &WithdrawalSettings,
    user_id: i64,
    amount: Decimal,
    target: PayoutTarget,
) -> Result<withdrawal_request::Model> {
    if amount <= Decimal::ZERO || amount < settings.min_amount {
        return Err(Error::InvalidAmount { amount });
    }
    let fee = (amount * settings.fee_percent / Decimal::ONE_HUNDRED).round_dp(2);
    let details = PaymentDetails {
        target: PayoutTarget {
            currency: target.currency.trim().to_uppercase(),
            ..target
        },
        ledger_currency: settings.base_currency.clone(),
        fee_percent: settings.fee_percent,
        fee,
        net_amount: amount - fee,
        exchange_rate: None,
        payout_amount: None,
    };

    let txn = db.begin().await?;
    let user_wallet = wallet::get_wallet_for_user(&txn, user_id).await?;
    let freeze = wallet::debit(
        &txn,
        user_wallet.id,
        Posting::new(amount, TransactionType::Withdrawal)
            .with_status(TransactionStatus::Pending)
            .with_metadata(
                Metadata::new()
                    .with("fee", fee)
                    .with("net_amount", details.net_amount)
                    .with("carrier", &details.target.carrier),
            ),
    )
    .await?;

    let now = Utc::now();
    let request = withdrawal_request::ActiveModel {
        user_id: Set(user_id),
        wallet_transaction_id: Set(Some(freeze.id)),
        amount: Set(amount),
        payment_details: Set(serde_json::to_value(&details)?),
        status: Set(WithdrawalStatus::Pending),
        payment_status: Set(None),
        payout_attempts: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(
        "Withdrawal request {} opened for user {}: {} frozen (fee {})",
        request.id, user_id, amount, fee
    );
    Ok(request)
}

/// Posts the fee and the informational payout on the platform ledger and
/// marks the freezing entry completed.
async fn settle_payout<C>(db: &C, request: &withdrawal_request::Model) -> Result<()>
where
    C: TransactionTrait + ConnectionTrait,
{
    let details = PaymentDetails::from_request(request)?;
    if let Some(entry_id) = request.wallet_transaction_id {
        wallet::set_transaction_status(db, entry_id, TransactionStatus::Completed).await?;
    }
    let metadata = Metadata::new()
        .with("withdrawal_id", request.id)
        .with("user_id", request.user_id);
    if details.fee > Decimal::ZERO {
        wallet::post_system(
            db,
            SystemPosting::new(details.fee, SystemTransactionType::Fee)
                .with_metadata(metadata.clone()),
        )
        .await?;
    }
    if details.net_amount > Decimal::ZERO {
        wallet::post_system(
            db,
            SystemPosting::new(details.net_amount, SystemTransactionType::Payout).with_metadata(
                metadata
                    .with("currency", &details.target.currency)
                    .with("payout_amount", details.payout_amount),
            ),
        )
        .await?;
    }
    Ok(())
}

/// Marks a request as dispatching and numbers the attempt, in its own
/// committed transaction. Returns the claimed row and the payment status to
/// restore if the dispatch fails.
async fn claim_dispatch(
    db: &DatabaseConnection,
    request_id: i64,
) -> Result<(withdrawal_request::Model, Option<PaymentStatus>)> {
    let txn = db.begin().await?;
    let current = lock_request(&txn, request_id).await?;
    if !is_approvable(&current) {
        return Err(invalid_state(&current, "approve"));
    }
    let previous = current.payment_status;
    let attempts = current.payout_attempts + 1;
    let mut claim: withdrawal_request::ActiveModel = current.into();
    claim.payment_status = Set(Some(PaymentStatus::Pending));
    claim.payout_attempts = Set(attempts);
    claim.updated_at = Set(Utc::now());
    let claimed = claim.update(&txn).await?;
    txn.commit().await?;
    Ok((claimed, previous))
}

/// Gives a claimed request back to the approval queue after a failed dispatch.
async fn release_dispatch(
    db: &DatabaseConnection,
    request_id: i64,
    previous: Option<PaymentStatus>,
) -> Result<()> {
    let txn = db.begin().await?;
    let current = lock_request(&txn, request_id).await?;
    if is_dispatching(&current) {
        let mut release: withdrawal_request::ActiveModel = current.into();
        release.payment_status = Set(previous);
        release.updated_at = Set(Utc::now());
        release.update(&txn).await?;
    }
    txn.commit().await?;
    Ok(())
}

/// Approves a pending request and dispatches the payout.
///
/// The request is claimed before the gateway is called: while the payout is
/// in flight, reject, cancel and a second approve are refused. On any gateway
/// failure the claim is released, no funds move, and the call can be retried
/// with a fresh payout reference. A request already approved is refused with
/// [`Error::InvalidState`].
#[instrument(skip(db, gateway, sink, settings))]
pub async fn approve(
    db: &DatabaseConnection,
    gateway: &dyn PayoutGateway,
    sink: &dyn NotificationSink,
    settings: &WithdrawalSettings,
    request_id: i64,
    admin_id: i64,
) -> Result<withdrawal_request::Model> {
    let request = get_withdrawal(db, request_id).await?;
    if !is_approvable(&request) {
        return Err(invalid_state(&request, "approve"));
    }

    let mut details = PaymentDetails::from_request(&request)?;
    let (payout_amount, exchange_rate) = rates::convert(
        db,
        details.net_amount,
        &settings.base_currency,
        &details.target.currency,
    )
    .await?;
    if !details.target.currency.eq_ignore_ascii_case(&settings.base_currency) {
        details.exchange_rate = Some(exchange_rate);
    }
    details.payout_amount = Some(payout_amount);

    let (claimed, previous) = claim_dispatch(db, request_id).await?;
    let payout = PayoutRequest {
        reference: payout_reference(&claimed),
        phone: details.target.phone.clone(),
        amount: payout_amount,
        currency: details.target.currency.clone(),
        carrier: details.target.carrier.clone(),
    };
    let response = match gateway
        .payout(&payout)
        .await
        .and_then(gateway::ensure_not_failed)
    {
        Ok(response) => response,
        Err(e) => {
            warn!("Payout {} for withdrawal {} failed: {}", payout.reference, request_id, e);
            if let Err(release_err) = release_dispatch(db, request_id, previous).await {
                error!(
                    "Withdrawal {} left dispatching after failed payout: {}",
                    request_id, release_err
                );
            }
            return Err(e);
        }
    };

    let txn = db.begin().await?;
    let current = lock_request(&txn, request_id).await?;
    if !is_dispatching(&current) || current.payout_attempts != claimed.payout_attempts {
        error!(
            "Payout {} dispatched (session {}) but withdrawal {} moved on",
            payout.reference, response.session_id, request_id
        );
        return Err(invalid_state(&current, "approve"));
    }
    let completed = response.status == PayoutStatus::Completed;
    let now = Utc::now();
    let mut approved: withdrawal_request::ActiveModel = current.into();
    approved.status = Set(WithdrawalStatus::Approved);
    approved.payment_status = Set(Some(if completed {
        PaymentStatus::Completed
    } else {
        PaymentStatus::Pending
    }));
    approved.gateway_session_id = Set(Some(response.session_id.clone()));
    approved.payment_details = Set(serde_json::to_value(&details)?);
    approved.processed_by = Set(Some(admin_id));
    approved.processed_at = Set(Some(now));
    approved.updated_at = Set(now);
    let approved = approved.update(&txn).await?;
    if completed {
        settle_payout(&txn, &approved).await?;
    }
    txn.commit().await?;

    info!(
        "Withdrawal {} approved by {} (payout {}, session {}, {} {})",
        approved.id,
        admin_id,
        payout.reference,
        response.session_id,
        payout_amount,
        details.target.currency
    );
    sink.emit(processed_event(&approved));
    Ok(approved)
}

/// Finalises a dispatched payout from the gateway's asynchronous callback.
///
/// `Completed` settles the payout. `Failed` puts the request back to pending
/// with its funds still frozen, so an administrator can re-approve or reject.
#[instrument(skip(db, sink))]
pub async fn on_gateway_callback(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    session_id: &str,
    status: PaymentStatus,
    transaction_id: Option<String>,
) -> Result<withdrawal_request::Model> {
    let txn = db.begin().await?;
    let request = WithdrawalRequest::find()
        .filter(withdrawal_request::Column::GatewaySessionId.eq(session_id))
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("payout session", session_id))?;
    if request.status != WithdrawalStatus::Approved
        || request.payment_status != Some(PaymentStatus::Pending)
    {
        return Err(invalid_state(&request, "settle"));
    }
    if status == PaymentStatus::Pending {
        return Ok(request);
    }

    let mut update: withdrawal_request::ActiveModel = request.into();
    update.payment_status = Set(Some(status));
    update.gateway_transaction_id = Set(transaction_id);
    update.updated_at = Set(Utc::now());
    if status == PaymentStatus::Failed {
        update.status = Set(WithdrawalStatus::Pending);
    }
    let updated = update.update(&txn).await?;
    if status == PaymentStatus::Completed {
        settle_payout(&txn, &updated).await?;
    }
    txn.commit().await?;

    match status {
        PaymentStatus::Failed => warn!(
            "Payout for withdrawal {} failed at the gateway; back to pending",
            updated.id
        ),
        _ => info!("Payout for withdrawal {} completed", updated.id),
    }
    sink.emit(processed_event(&updated));
    Ok(updated)
}

/// Returns the frozen amount to the wallet and marks the freezing entry.
async fn refund<C>(db: &C, request: &withdrawal_request::Model, entry_status: TransactionStatus) -> Result<()>
where
    C: TransactionTrait + ConnectionTrait,
{
    let user_wallet = wallet::get_wallet_for_user(db, request.user_id).await?;
    wallet::credit(
        db,
        user_wallet.id,
        Posting::new(request.amount, TransactionType::Refund).with_metadata(
            Metadata::new()
                .with("withdrawal_id", request.id)
                .with("original_transaction_id", request.wallet_transaction_id),
        ),
    )
    .await?;
    if let Some(entry_id) = request.wallet_transaction_id {
        wallet::set_transaction_status(db, entry_id, entry_status).await?;
    }
    Ok(())
}

/// Rejects a pending request and refunds it. Refused while a payout is in flight.
#[instrument(skip(db, sink, note))]
pub async fn reject(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    request_id: i64,
    admin_id: i64,
    note: Option<String>,
) -> Result<withdrawal_request::Model> {
    let txn = db.begin().await?;
    let request = lock_request(&txn, request_id).await?;
    if request.status != WithdrawalStatus::Pending || is_dispatching(&request) {
        return Err(invalid_state(&request, "reject"));
    }
    refund(&txn, &request, TransactionStatus::Rejected).await?;

    let now = Utc::now();
    let mut rejected: withdrawal_request::ActiveModel = request.into();
    rejected.status = Set(WithdrawalStatus::Rejected);
    rejected.admin_note = Set(note);
    rejected.processed_by = Set(Some(admin_id));
    rejected.processed_at = Set(Some(now));
    rejected.refund_at = Set(Some(now));
    rejected.updated_at = Set(now);
    let rejected = rejected.update(&txn).await?;
    txn.commit().await?;

    info!(
        "Withdrawal {} rejected by {}; {} refunded to user {}",
        rejected.id, admin_id, rejected.amount, rejected.user_id
    );
    sink.emit(processed_event(&rejected));
    Ok(rejected)
}

/// Cancels a pending request on behalf of its owner and refunds it.
///
/// Only accepted before a payout is dispatched.
#[instrument(skip(db, sink))]
pub async fn cancel(
    db: &DatabaseConnection,
    sink: &dyn NotificationSink,
    request_id: i64,
    user_id: i64,
) -> Result<withdrawal_request::Model> {
    let txn = db.begin().await?;
    let request = lock_request(&txn, request_id).await?;
    if request.user_id != user_id {
        return Err(Error::Forbidden {
            message: format!("withdrawal request {request_id} belongs to another user"),
        });
    }
    if request.status != WithdrawalStatus::Pending || is_dispatching(&request) {
        return Err(invalid_state(&request, "cancel"));
    }
    refund(&txn, &request, TransactionStatus::Cancelled).await?;

    let now = Utc::now();
    let mut cancelled: withdrawal_request::ActiveModel = request.into();
    cancelled.status = Set(WithdrawalStatus::Cancelled);
    cancelled.processed_at = Set(Some(now));
    cancelled.refund_at = Set(Some(now));
    cancelled.updated_at = Set(now);
    let cancelled = cancelled.update(&txn).await?;
    txn.commit().await?;

    info!(
        "Withdrawal {} cancelled by user {}; {} refunded",
        cancelled.id, user_id, cancelled.amount
    );
    sink.emit(processed_event(&cancelled));
    Ok(cancelled)
}

/// Removes an approved request and its freezing ledger entry.
///
/// Refused for every other state: pending requests still hold funds, and
/// rejected or cancelled ones carry the refund trail.
#[instrument(skip(db))]
pub async fn delete(db: &DatabaseConnection, request_id: i64) -> Result<()> {
    let txn = db.begin().await?;
    let request = lock_request(&txn, request_id).await?;
    if request.status != WithdrawalStatus::Approved {
        return Err(invalid_state(&request, "delete"));
    }
    let entry_id = request.wallet_transaction_id;
    request.delete(&txn).await?;
    if let Some(entry_id) = entry_id {
        WalletTransaction::delete_by_id(entry_id).exec(&txn).await?;
    }
    txn.commit().await?;
    info!("Deleted approved withdrawal {}", request_id);
    Ok(())
}
