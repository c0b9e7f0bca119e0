//! Ledger reconciliation.
//!
//! Cross-checks the cached aggregates (wallet balances, platform totals)
//! against the append-only entries they were built from. All functions are
//! read-only and return structured data; `format_reconciliation_summary`
//! renders it for the logs.

use std::collections::HashMap;

use crate::{
    core::wallet,
    entities::{
        Wallet, WalletSystemTransaction, WalletTransaction, WithdrawalRequest,
        sea_orm_active_enums::{EntryDirection, PaymentStatus, WithdrawalStatus},
        withdrawal_request,
    },
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::{Condition, DatabaseConnection, prelude::*};

/// Where the money currently sits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Number of user wallets
    pub wallet_count: usize,
    /// Sum of all user wallet balances
    pub user_balances: Decimal,
    /// Amount held by withdrawal requests that have not been paid out
    pub frozen_withdrawals: Decimal,
    /// Platform wallet balance
    pub system_balance: Decimal,
    /// Platform inflow since creation
    pub system_total_in: Decimal,
    /// Platform outflow since creation
    pub system_total_out: Decimal,
}

impl LedgerSnapshot {
    /// Everything the platform holds on behalf of itself and its users.
    ///
    /// Only purchases raise it and only completed payouts lower it.
    #[must_use]
    pub fn holdings(&self) -> Decimal {
        self.user_balances + self.frozen_withdrawals + self.system_balance
    }
}

/// A wallet whose cached balance disagrees with its entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletDrift {
    /// Drifted wallet
    pub wallet_id: i64,
    /// Wallet owner
    pub user_id: i64,
    /// Cached balance
    pub balance: Decimal,
    /// Signed sum of the wallet's entries
    pub ledger_balance: Decimal,
}

impl WalletDrift {
    /// Cached minus recomputed.
    #[must_use]
    pub fn drift(&self) -> Decimal {
        self.balance - self.ledger_balance
    }
}

/// Platform totals recomputed from the platform entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemTotals {
    /// Sum of platform credit entries
    pub total_in: Decimal,
    /// Sum of platform debit entries
    pub total_out: Decimal,
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationReport {
    /// Cached aggregates at the time of the pass
    pub snapshot: LedgerSnapshot,
    /// Wallets that do not match their entries
    pub wallet_drifts: Vec<WalletDrift>,
    /// Platform totals recomputed from its entries
    pub system_ledger: SystemTotals,
}

impl ReconciliationReport {
    /// Whether the platform aggregates match its entries.
    #[must_use]
    pub fn system_matches(&self) -> bool {
        self.snapshot.system_total_in == self.system_ledger.total_in
            && self.snapshot.system_total_out == self.system_ledger.total_out
            && self.snapshot.system_balance
                == self.system_ledger.total_in - self.system_ledger.total_out
    }

    /// Whether every aggregate matches its entries.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.wallet_drifts.is_empty() && self.system_matches()
    }
}

/// Whether a request still holds its frozen amount.
fn is_frozen(request: &withdrawal_request::Model) -> bool {
    match request.status {
        WithdrawalStatus::Pending => true,
        WithdrawalStatus::Approved => request.payment_status != Some(PaymentStatus::Completed),
        WithdrawalStatus::Rejected | WithdrawalStatus::Cancelled => false,
    }
}

/// Takes a snapshot of balances, frozen withdrawals and platform totals.
pub async fn ledger_snapshot(db: &DatabaseConnection) -> Result<LedgerSnapshot> {
    let wallets = Wallet::find().all(db).await?;
    let system = wallet::get_or_create_system_wallet(db).await?;

    let open_requests = WithdrawalRequest::find()
        .filter(
            Condition::any()
                .add(withdrawal_request::Column::Status.eq(WithdrawalStatus::Pending))
                .add(withdrawal_request::Column::Status.eq(WithdrawalStatus::Approved)),
        )
        .all(db)
        .await?;

    Ok(LedgerSnapshot {
        wallet_count: wallets.len(),
        user_balances: wallets.iter().map(|w| w.balance).sum(),
        frozen_withdrawals: open_requests
            .iter()
            .filter(|r| is_frozen(r))
            .map(|r| r.amount)
            .sum(),
        system_balance: system.balance,
        system_total_in: system.total_in,
        system_total_out: system.total_out,
    })
}

/// Recomputes every wallet and the platform wallet from their entries.
///
/// # Arguments
/// * `db` - Database connection
///
/// # Returns
/// The snapshot plus every mismatch found
pub async fn reconcile(db: &DatabaseConnection) -> Result<ReconciliationReport> {
    let snapshot = ledger_snapshot(db).await?;

    let mut ledger_balances: HashMap<i64, Decimal> = HashMap::new();
    for entry in WalletTransaction::find().all(db).await? {
        let signed = match entry.direction {
            EntryDirection::Credit => entry.amount,
            EntryDirection::Debit => -entry.amount,
        };
        *ledger_balances.entry(entry.wallet_id).or_default() += signed;
    }

    let wallet_drifts = Wallet::find()
        .all(db)
        .await?
        .into_iter()
        .filter_map(|w| {
            let ledger_balance = ledger_balances.get(&w.id).copied().unwrap_or_default();
            (ledger_balance != w.balance).then_some(WalletDrift {
                wallet_id: w.id,
                user_id: w.user_id,
                balance: w.balance,
                ledger_balance,
            })
        })
        .collect();

    let mut system_ledger = SystemTotals::default();
    for entry in WalletSystemTransaction::find().all(db).await? {
        match entry.direction {
            Some(EntryDirection::Credit) => system_ledger.total_in += entry.amount,
            Some(EntryDirection::Debit) => system_ledger.total_out += entry.amount,
            None => {}
        }
    }

    Ok(ReconciliationReport {
        snapshot,
        wallet_drifts,
        system_ledger,
    })
}

/// Renders a reconciliation report as a few log lines.
#[must_use]
pub fn format_reconciliation_summary(report: &ReconciliationReport) -> String {
    let s = &report.snapshot;
    let mut lines = vec![
        format!(
            "{} wallets holding {} | frozen withdrawals {} | platform {} (in {}, out {})",
            s.wallet_count,
            s.user_balances,
            s.frozen_withdrawals,
            s.system_balance,
            s.system_total_in,
            s.system_total_out
        ),
        format!("Total holdings: {}", s.holdings()),
    ];
    for d in &report.wallet_drifts {
        lines.push(format!(
            "Wallet {} (user {}) drift {}: cached {}, entries {}",
            d.wallet_id,
            d.user_id,
            d.drift(),
            d.balance,
            d.ledger_balance
        ));
    }
    if !report.system_matches() {
        lines.push(format!(
            "Platform drift: cached in/out {}/{}, entries {}/{}",
            s.system_total_in,
            s.system_total_out,
            report.system_ledger.total_in,
            report.system_ledger.total_out
        ));
    }
    lines.push(if report.is_balanced() {
        "Ledger balanced".to_string()
    } else {
        "Ledger NOT balanced".to_string()
    });
    lines.join("\n")
}
