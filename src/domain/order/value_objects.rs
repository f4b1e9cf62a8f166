use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================

/// A single line of an order. Name and price are a point-in-time snapshot
/// taken at order creation and are never recomputed from live product data.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LineItem {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub diet_flags: Vec<DietFlag>,
}

impl LineItem {
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * i64::from(self.quantity)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DietFlag {
    Vegetarian,
    Vegan,
    Halal,
    GlutenFree,
    ContainsNuts,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    pub email: String,
}

/// Customer-facing public order identifier. Opaque token used in URLs and
/// QR codes by actors without internal-id access. A distinct type from the
/// internal `Uuid` so order-scoped topics and pickup lookups cannot be keyed
/// by an internal id by accident.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PickupCode(String);

impl PickupCode {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PickupCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who requested a transition. Carried on events for audit and tracing;
/// authorization is an external collaborator's concern.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "kind", content = "id")]
pub enum TransitionActor {
    Vendor(Uuid),
    Customer,
    PickupScan,
}

impl fmt::Display for TransitionActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionActor::Vendor(id) => write!(f, "vendor:{}", id),
            TransitionActor::Customer => f.write_str("customer"),
            TransitionActor::PickupScan => f.write_str("pickup-scan"),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
