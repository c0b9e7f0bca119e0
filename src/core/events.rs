//! Domain events handed to the notification component.
//!
//! Events are emitted only after the ledger write that caused them has
//! committed. Delivery (push, SMS, e-mail) is someone else's job.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::entities::sea_orm_active_enums::WithdrawalStatus;

/// Something a user should be told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A sponsor was paid a referral commission.
    CommissionReceived {
        /// Commission row
        commission_id: i64,
        /// Sponsor who was paid
        user_id: i64,
        /// Buyer who generated it
        source_user_id: i64,
        /// Pack bought
        pack_id: i64,
        /// Referral depth
        level: i32,
        /// Amount credited
        amount: Decimal,
    },
    /// A withdrawal request changed state.
    WithdrawalProcessed {
        /// Withdrawal request
        withdrawal_id: i64,
        /// Owner of the request
        user_id: i64,
        /// New state
        status: WithdrawalStatus,
        /// Frozen amount
        amount: Decimal,
    },
    /// Funds moved from one user to another.
    FundsTransferred {
        /// Sender
        from_user_id: i64,
        /// Receiver
        to_user_id: i64,
        /// Amount received
        amount: Decimal,
        /// Fee paid by the sender
        fee: Decimal,
    },
}

/// Consumer of domain events.
pub trait NotificationSink: Send + Sync {
    /// Hands one committed event to the notification component.
    fn emit(&self, event: DomainEvent);
}

/// Sink that writes events to the log; used when no notifier is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn emit(&self, event: DomainEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(target: "pack_ledger::events", "{payload}"),
            Err(e) => info!(target: "pack_ledger::events", "{event:?} (unserializable: {e})"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = DomainEvent::FundsTransferred {
            from_user_id: 1,
            to_user_id: 2,
            amount: Decimal::from(40),
            fee: Decimal::ZERO,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "funds_transferred");
        assert_eq!(json["to_user_id"], 2);
        assert_eq!(json["amount"], "40");
    }

    #[test]
    fn test_tracing_sink_logs_without_panicking() {
        crate::test_utils::init_test_tracing();
        TracingSink.emit(DomainEvent::WithdrawalProcessed {
            withdrawal_id: 3,
            user_id: 1,
            status: WithdrawalStatus::Rejected,
            amount: Decimal::from(30),
        });
    }
}
