//! Event sink implementations
//!
//! Publishing never fails from the ledger's point of view. A sink that cannot
//! deliver logs the problem and drops the event.

use super::traits::EventSink;
use crate::types::DomainEvent;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: DomainEvent) {}
}

/// Emits every event as a tracing record
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn publish(&self, event: DomainEvent) {
        match &event {
            DomainEvent::TransferCompleted { transfer } => info!(
                event = event.name(),
                transfer_id = %transfer.id,
                owner = %transfer.owner_id,
                amount = %transfer.amount,
                kind = %transfer.transfer_type,
                "domain event"
            ),
            DomainEvent::PoolGoalReached {
                pool_id,
                goal_amount,
                current_amount,
            } => info!(
                event = event.name(),
                pool_id = %pool_id,
                goal = %goal_amount,
                current = %current_amount,
                "domain event"
            ),
        }
    }
}

/// Forwards events to an unbounded tokio channel
///
/// The receiving half belongs to the notification dispatcher.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn publish(&self, event: DomainEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            warn!(event = name, "event receiver closed, dropping event");
        }
    }
}
