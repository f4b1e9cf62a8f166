use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::UnknownStatus;

// ============================================================================
// Order Status State Machine
// ============================================================================
//
// The lifecycle is a closed, ordered set:
//
//   Placed → Preparing → ReadyForPickup → Completed
//      └→ Rejected (terminal side-branch, reachable only from Placed)
//
// Every other ordered pair, including self-pairs and backward moves, is
// illegal. Completed and Rejected are terminal.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Preparing,
    ReadyForPickup,
    Completed,
    Rejected,
}

impl OrderStatus {
    /// All statuses, in lifecycle order. Used for exhaustive checks.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Placed,
        OrderStatus::Preparing,
        OrderStatus::ReadyForPickup,
        OrderStatus::Completed,
        OrderStatus::Rejected,
    ];

    /// The legal transition table. True iff `(self, requested)` is one of
    /// the edges of the lifecycle graph above.
    pub fn can_transition(self, requested: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, requested),
            (Placed, Preparing)
                | (Placed, Rejected)
                | (Preparing, ReadyForPickup)
                | (ReadyForPickup, Completed)
        )
    }

    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Rejected)
    }

    /// Wire name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::ReadyForPickup => "READY_FOR_PICKUP",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    /// Unknown values are rejected at the boundary instead of propagating a
    /// raw string into the state machine.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLACED" => Ok(OrderStatus::Placed),
            "PREPARING" => Ok(OrderStatus::Preparing),
            "READY_FOR_PICKUP" => Ok(OrderStatus::ReadyForPickup),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "REJECTED" => Ok(OrderStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
