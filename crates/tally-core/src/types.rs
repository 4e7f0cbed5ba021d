//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Location     │   │  StockMovement  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  name           │   │  kind           │       │
//! │  │  cost_cents     │   │  is_active      │   │  quantity (±)   │       │
//! │  │  reorder_level  │   └─────────────────┘   │  reference_id   │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! │                                                                         │
//! │  StockPosition and DailySalesSummary are DERIVED from the ledger and   │
//! │  the transaction log; they are materializations, never hand-edited.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Entities have:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: (sku, transaction_number) - human-readable

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Movement Kind
// =============================================================================

/// The kind of a stock movement, which fixes its expected quantity sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Goods received from a supplier (inflow).
    Purchase,
    /// Goods sold to a customer (outflow).
    Sale,
    /// Manual correction; the only kind allowed either sign.
    Adjustment,
    /// Customer return restocked (inflow).
    Return,
    /// Spoilage, breakage, expiry write-off (outflow).
    Waste,
    /// Debit half of a two-location transfer (outflow).
    TransferOut,
    /// Credit half of a two-location transfer (inflow).
    TransferIn,
}

/// Expected quantity direction for a movement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Quantity must be positive.
    Inflow,
    /// Quantity must be negative.
    Outflow,
    /// Quantity may carry either sign (adjustments).
    Either,
}

impl MovementKind {
    /// Returns the direction this kind's quantity must respect.
    pub const fn direction(&self) -> Direction {
        match self {
            MovementKind::Purchase | MovementKind::Return | MovementKind::TransferIn => {
                Direction::Inflow
            }
            MovementKind::Sale | MovementKind::Waste | MovementKind::TransferOut => {
                Direction::Outflow
            }
            MovementKind::Adjustment => Direction::Either,
        }
    }

    /// The snake_case name stored in the database and shown in errors.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Purchase => "purchase",
            MovementKind::Sale => "sale",
            MovementKind::Adjustment => "adjustment",
            MovementKind::Return => "return",
            MovementKind::Waste => "waste",
            MovementKind::TransferOut => "transfer_out",
            MovementKind::TransferIn => "transfer_in",
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
///
/// Referenced by ledger entries by id only. There is deliberately NO
/// `current_stock` field here: on-hand quantity per location is derived
/// from the movement ledger (see [`StockPosition`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Acquisition cost in cents; the cost basis carried on movements.
    pub cost_cents: i64,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Reorder when total on-hand falls to or below this level.
    pub reorder_level: i64,

    /// Minimum stock to hold.
    pub min_stock: i64,

    /// Maximum stock to hold.
    pub max_stock: i64,

    /// Expiry date for perishables.
    pub expiry_date: Option<NaiveDate>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the cost basis as Money.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Returns the selling price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// A product about to be created; the catalog assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub cost_cents: i64,
    pub price_cents: i64,
    pub reorder_level: i64,
    pub min_stock: i64,
    pub max_stock: i64,
    pub expiry_date: Option<NaiveDate>,
}

// =============================================================================
// Location
// =============================================================================

/// A stock-holding location (store, warehouse, dark store).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Location {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A location about to be created; the catalog assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
}

// =============================================================================
// Stock Movement (ledger entry)
// =============================================================================

/// An immutable entry in the stock-movement ledger.
///
/// Never updated or deleted after commit; corrections are made via new
/// `adjustment` entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub location_id: String,
    pub kind: MovementKind,
    /// Signed quantity delta; sign must match `kind.direction()`.
    pub quantity: i64,
    /// Cost basis per unit at the time of the movement.
    pub unit_cost_cents: i64,
    /// Always `unit_cost_cents * |quantity|`.
    pub total_cost_cents: i64,
    /// Links a transfer pair, a purchase order, or a sales transaction.
    pub reference_id: Option<String>,
    /// Actor who caused the movement.
    pub recorded_by: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Returns the unit cost as Money.
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// Returns the total cost as Money.
    #[inline]
    pub fn total_cost(&self) -> Money {
        Money::from_cents(self.total_cost_cents)
    }
}

/// A movement about to be appended; the store assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovement {
    pub product_id: String,
    pub location_id: String,
    pub kind: MovementKind,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub total_cost_cents: i64,
    pub reference_id: Option<String>,
    pub recorded_by: String,
    pub notes: Option<String>,
}

impl NewMovement {
    /// Builds a movement with the total cost derived from unit cost and
    /// quantity, which is the only total the ledger accepts.
    pub fn new(
        product_id: impl Into<String>,
        location_id: impl Into<String>,
        kind: MovementKind,
        quantity: i64,
        unit_cost_cents: i64,
        recorded_by: impl Into<String>,
    ) -> Self {
        NewMovement {
            product_id: product_id.into(),
            location_id: location_id.into(),
            kind,
            quantity,
            unit_cost_cents,
            total_cost_cents: unit_cost_cents * quantity.abs(),
            reference_id: None,
            recorded_by: recorded_by.into(),
            notes: None,
        }
    }

    /// Attaches a reference id (transfer pair, purchase order, transaction).
    pub fn with_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    /// Attaches free-form notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

// =============================================================================
// Stock Position (derived)
// =============================================================================

/// Cached on-hand quantity for a (product, location) pair.
///
/// A performance cache over the ledger, updated in the same transaction as
/// every append. The ledger sum is the ground truth; this row must always be
/// re-derivable by replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockPosition {
    pub product_id: String,
    pub location_id: String,
    pub on_hand: i64,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Transfers
// =============================================================================

/// A request to move quantity of a product between two locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub product_id: String,
    pub from_location_id: String,
    pub to_location_id: String,
    pub quantity: i64,
    pub actor_id: String,
}

/// The committed result of a successful transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Shared by the transfer_out and transfer_in ledger entries.
    pub reference_id: String,
    pub product_id: String,
    pub from_location_id: String,
    pub to_location_id: String,
    pub quantity: i64,
    /// Cost basis carried from the source, so value is conserved.
    pub unit_cost_cents: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sales Transactions
// =============================================================================

/// A completed point-of-sale transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesTransaction {
    pub id: String,
    /// Business identifier, e.g. `TXN-20260823-000001`.
    pub transaction_number: String,
    pub location_id: String,
    pub cashier_id: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    /// Free-form tender name ("cash", "card", ...); absent buckets under
    /// "unknown" in summaries.
    pub payment_method: Option<String>,
    pub is_return: bool,
    pub original_transaction_id: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

/// A line item in a sales transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: String,
    pub transaction_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub line_total_cents: i64,
}

/// A transaction about to be recorded; ids and the transaction number are
/// assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub location_id: String,
    pub cashier_id: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_method: Option<String>,
    pub lines: Vec<NewSaleLine>,
}

/// A line item of a [`NewTransaction`].
#[derive(Debug, Clone)]
pub struct NewSaleLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub line_total_cents: i64,
}

// =============================================================================
// Daily Sales Summary (derived)
// =============================================================================

/// Per-date (optionally per-location) sales rollup.
///
/// Regeneration is idempotent: recomputing for the same date over unchanged
/// data yields identical output. The payment breakdown is a BTreeMap so its
/// serialized form is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySalesSummary {
    pub date: NaiveDate,
    /// None means the summary spans all locations.
    pub location_id: Option<String>,
    pub total_transactions: i64,
    pub total_revenue_cents: i64,
    pub total_items_sold: i64,
    /// Revenue / transactions in cents, truncated; 0 when no transactions.
    pub average_transaction_cents: i64,
    /// Product with the highest summed quantity; ties broken by lowest id.
    pub top_product_id: Option<String>,
    /// Revenue in cents grouped by payment method; missing methods bucket
    /// under "unknown".
    pub payment_breakdown: BTreeMap<String, i64>,
}

// =============================================================================
// Reconciliation
// =============================================================================

/// One (product, location) pair whose cache diverges from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionMismatch {
    pub product_id: String,
    pub location_id: String,
    /// Ground truth: the full ledger replay sum.
    pub ledger_quantity: i64,
    /// What the position cache currently says.
    pub cached_quantity: i64,
}

/// Result of replaying the ledger against the position cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub matches: bool,
    pub pairs_checked: usize,
    pub mismatches: Vec<PositionMismatch>,
}

impl ReconciliationReport {
    /// Builds a report from the collected mismatches.
    pub fn new(pairs_checked: usize, mismatches: Vec<PositionMismatch>) -> Self {
        ReconciliationReport {
            matches: mismatches.is_empty(),
            pairs_checked,
            mismatches,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_kind_directions() {
        assert_eq!(MovementKind::Purchase.direction(), Direction::Inflow);
        assert_eq!(MovementKind::Return.direction(), Direction::Inflow);
        assert_eq!(MovementKind::TransferIn.direction(), Direction::Inflow);
        assert_eq!(MovementKind::Sale.direction(), Direction::Outflow);
        assert_eq!(MovementKind::Waste.direction(), Direction::Outflow);
        assert_eq!(MovementKind::TransferOut.direction(), Direction::Outflow);
        assert_eq!(MovementKind::Adjustment.direction(), Direction::Either);
    }

    #[test]
    fn test_movement_kind_display() {
        assert_eq!(MovementKind::TransferOut.to_string(), "transfer_out");
        assert_eq!(MovementKind::Sale.to_string(), "sale");
    }

    #[test]
    fn test_new_movement_total_cost() {
        let m = NewMovement::new("p-1", "loc-a", MovementKind::Sale, -4, 250, "cashier-1");
        assert_eq!(m.total_cost_cents, 1000);

        let m = NewMovement::new("p-1", "loc-a", MovementKind::Purchase, 4, 250, "clerk-1");
        assert_eq!(m.total_cost_cents, 1000);
    }

    #[test]
    fn test_reconciliation_report_flags() {
        let clean = ReconciliationReport::new(3, vec![]);
        assert!(clean.matches);

        let dirty = ReconciliationReport::new(3, vec![PositionMismatch {
            product_id: "p-1".to_string(),
            location_id: "loc-a".to_string(),
            ledger_quantity: 5,
            cached_quantity: 7,
        }]);
        assert!(!dirty.matches);
        assert_eq!(dirty.mismatches.len(), 1);
    }
}
