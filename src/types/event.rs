//! Domain events published after a ledger transaction commits

use super::ids::PoolId;
use super::transfer::Transfer;
use rust_decimal::Decimal;

/// Events an external notification dispatcher may subscribe to
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A transfer reached `completed`
    TransferCompleted { transfer: Transfer },

    /// A contribution moved a pool's `current_amount` to or past its goal
    PoolGoalReached {
        pool_id: PoolId,
        goal_amount: Decimal,
        current_amount: Decimal,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::TransferCompleted { .. } => "TransferCompleted",
            DomainEvent::PoolGoalReached { .. } => "PoolGoalReached",
        }
    }
}
