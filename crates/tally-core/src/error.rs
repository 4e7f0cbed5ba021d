//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Ledger and business-rule violations            │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │      └── DbError::Domain wraps CoreError through the repository        │
//! │          boundary                                                       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → Caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, available vs requested, etc.)
//! 3. Errors are enum variants, never String
//! 4. Integrity faults are reported, never silently corrected

use thiserror::Error;

use crate::types::MovementKind;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent ledger invariant violations or business rule
/// failures. They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A movement's quantity sign contradicts its kind.
    ///
    /// ## When This Occurs
    /// - A `sale` entry with positive quantity (sales are outflows)
    /// - A `purchase` entry with negative quantity (purchases are inflows)
    /// - Any movement with zero quantity
    #[error("Invalid {kind} movement: quantity {quantity} has the wrong sign")]
    InvalidMovement {
        kind: MovementKind,
        quantity: i64,
    },

    /// Not enough on-hand stock to complete the operation.
    ///
    /// ## When This Occurs
    /// - A transfer requests more than the source location holds
    /// - A sale or other outflow would drive a position negative
    ///
    /// Reported with actionable detail so the caller can decide whether to
    /// retry, alert a human, or abort.
    #[error(
        "Insufficient stock for product {product_id} at {location_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        location_id: String,
        available: i64,
        requested: i64,
    },

    /// The operation's arguments are malformed (rejected before any write).
    ///
    /// ## When This Occurs
    /// - Transfer quantity ≤ 0
    /// - Transfer source and destination are the same location
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The position cache diverges from a full ledger replay.
    ///
    /// This is a data-integrity fault, not a transient state. It must be
    /// surfaced to the caller, never corrected by clamping.
    #[error(
        "Reconciliation mismatch for product {product_id} at {location_id}: \
         ledger says {ledger_quantity}, cache says {cached_quantity}"
    )]
    ReconciliationMismatch {
        product_id: String,
        location_id: String,
        ledger_quantity: i64,
        cached_quantity: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A movement's total cost contradicts unit cost × |quantity|.
    #[error(
        "total cost {total_cost_cents} does not equal \
         unit cost {unit_cost_cents} x |{quantity}|"
    )]
    InconsistentTotalCost {
        unit_cost_cents: i64,
        quantity: i64,
        total_cost_cents: i64,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
