use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus, TransitionActor};

// ============================================================================
// Wire Protocol Models
// ============================================================================
//
// Types exchanged between the order service, the status channel, and the
// client sessions. Broadcast events carry the full updated Order record,
// not a diff, so any subscriber can overwrite its local copy wholesale.
//
// ============================================================================

/// A committed status change, broadcast on the owning vendor's topic and on
/// the order's own topic.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StatusEvent {
    pub event_id: Uuid,
    pub order: Order,
    pub actor: TransitionActor,
    pub emitted_at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(order: Order, actor: TransitionActor) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            order,
            actor,
            emitted_at: Utc::now(),
        }
    }
}

/// Synchronous request/response transition submission. Used only for the
/// accept/reject decision out of `Placed`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TransitionRequest {
    pub order_id: Uuid,
    pub new_status: OrderStatus,
    pub vendor_id: Uuid,
}

/// Fire-and-forget transition submission published to the command
/// destination. No direct response; confirmation arrives via the broadcast
/// event.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TransitionCommand {
    pub order_id: Uuid,
    pub new_status: OrderStatus,
    pub vendor_id: Uuid,
    pub actor: TransitionActor,
}

/// Dispatcher acknowledgement. `Confirmed` carries the authoritative updated
/// record from the request/response path; `Accepted` means the command was
/// handed to the transport and the broadcast event will confirm it.
#[derive(Clone, Debug)]
pub enum Ack {
    Confirmed(Order),
    Accepted,
}

/// A dismissible, user-visible notice raised when a transition fails and the
/// local state has been rolled back.
#[derive(Clone, Debug)]
pub struct Notification {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(order_id: Option<Uuid>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }
}
