//! # Movement Invariants
//!
//! Pure validation rules for stock-movement ledger entries.
//!
//! ## The Sign Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Movement Kind → Quantity Sign                           │
//! │                                                                         │
//! │  INFLOWS  (quantity > 0)      OUTFLOWS (quantity < 0)                  │
//! │  ─────────────────────        ─────────────────────                    │
//! │  purchase                     sale                                      │
//! │  return                       waste                                     │
//! │  transfer_in                  transfer_out                              │
//! │                                                                         │
//! │  EITHER SIGN (quantity ≠ 0)                                             │
//! │  ─────────────────────                                                  │
//! │  adjustment  (positive = found stock, negative = correction)            │
//! │                                                                         │
//! │  Zero quantity is always rejected: a no-op entry carries no            │
//! │  information.                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! These checks run before any write; the ledger store calls
//! [`validate_movement`] at the top of every append.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Direction, NewMovement, TransferRequest};
use crate::validation::validate_id;

/// Validates a movement draft against the ledger invariants.
///
/// ## Checks
/// 1. Product, location, and actor ids are present and well-formed
/// 2. Quantity is non-zero and its sign matches the kind's direction
/// 3. Unit cost is non-negative
/// 4. Total cost equals `unit_cost * |quantity|` exactly (integer cents,
///    so no epsilon is needed)
///
/// ## Errors
/// * `CoreError::InvalidMovement` - sign/kind mismatch or zero quantity
/// * `CoreError::Validation` - missing ids or inconsistent cost fields
pub fn validate_movement(movement: &NewMovement) -> CoreResult<()> {
    validate_id("product_id", &movement.product_id)?;
    validate_id("location_id", &movement.location_id)?;
    validate_id("recorded_by", &movement.recorded_by)?;

    let sign_ok = match movement.kind.direction() {
        Direction::Inflow => movement.quantity > 0,
        Direction::Outflow => movement.quantity < 0,
        Direction::Either => movement.quantity != 0,
    };
    if !sign_ok {
        return Err(CoreError::InvalidMovement {
            kind: movement.kind,
            quantity: movement.quantity,
        });
    }

    if movement.unit_cost_cents < 0 {
        return Err(ValidationError::MustBePositive {
            field: "unit_cost_cents".to_string(),
        }
        .into());
    }

    let expected_total = movement.unit_cost_cents * movement.quantity.abs();
    if movement.total_cost_cents != expected_total {
        return Err(ValidationError::InconsistentTotalCost {
            unit_cost_cents: movement.unit_cost_cents,
            quantity: movement.quantity,
            total_cost_cents: movement.total_cost_cents,
        }
        .into());
    }

    Ok(())
}

/// Validates transfer arguments before any storage is touched.
///
/// ## Errors
/// * `CoreError::InvalidArgument` - quantity ≤ 0, or source equals
///   destination (no self-transfer)
/// * `CoreError::Validation` - missing ids
pub fn validate_transfer_request(request: &TransferRequest) -> CoreResult<()> {
    validate_id("product_id", &request.product_id)?;
    validate_id("from_location_id", &request.from_location_id)?;
    validate_id("to_location_id", &request.to_location_id)?;
    validate_id("actor_id", &request.actor_id)?;

    if request.quantity <= 0 {
        return Err(CoreError::InvalidArgument {
            reason: format!("transfer quantity must be positive, got {}", request.quantity),
        });
    }

    if request.from_location_id == request.to_location_id {
        return Err(CoreError::InvalidArgument {
            reason: "source and destination location are the same".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MovementKind;

    fn movement(kind: MovementKind, quantity: i64) -> NewMovement {
        NewMovement::new("p-1", "loc-a", kind, quantity, 250, "actor-1")
    }

    #[test]
    fn test_inflow_requires_positive_quantity() {
        assert!(validate_movement(&movement(MovementKind::Purchase, 5)).is_ok());
        assert!(validate_movement(&movement(MovementKind::Return, 2)).is_ok());
        assert!(validate_movement(&movement(MovementKind::TransferIn, 1)).is_ok());

        let err = validate_movement(&movement(MovementKind::Purchase, -5)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidMovement { .. }));
    }

    #[test]
    fn test_outflow_requires_negative_quantity() {
        assert!(validate_movement(&movement(MovementKind::Sale, -3)).is_ok());
        assert!(validate_movement(&movement(MovementKind::Waste, -1)).is_ok());
        assert!(validate_movement(&movement(MovementKind::TransferOut, -4)).is_ok());

        // A sale must be an outflow: positive quantity is rejected.
        let err = validate_movement(&movement(MovementKind::Sale, 3)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidMovement {
                kind: MovementKind::Sale,
                quantity: 3
            }
        ));
    }

    #[test]
    fn test_adjustment_allows_either_sign_but_not_zero() {
        assert!(validate_movement(&movement(MovementKind::Adjustment, 7)).is_ok());
        assert!(validate_movement(&movement(MovementKind::Adjustment, -7)).is_ok());

        let err = validate_movement(&movement(MovementKind::Adjustment, 0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidMovement { quantity: 0, .. }));
    }

    #[test]
    fn test_total_cost_must_match() {
        let mut m = movement(MovementKind::Purchase, 4);
        assert_eq!(m.total_cost_cents, 1000);
        m.total_cost_cents = 999;

        let err = validate_movement(&m).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InconsistentTotalCost { .. })
        ));
    }

    #[test]
    fn test_negative_unit_cost_rejected() {
        let mut m = movement(MovementKind::Purchase, 4);
        m.unit_cost_cents = -1;
        m.total_cost_cents = -4;
        assert!(validate_movement(&m).is_err());
    }

    #[test]
    fn test_missing_ids_rejected() {
        let mut m = movement(MovementKind::Purchase, 4);
        m.product_id = String::new();
        let err = validate_movement(&m).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    fn transfer(quantity: i64, from: &str, to: &str) -> TransferRequest {
        TransferRequest {
            product_id: "p-1".to_string(),
            from_location_id: from.to_string(),
            to_location_id: to.to_string(),
            quantity,
            actor_id: "manager-1".to_string(),
        }
    }

    #[test]
    fn test_transfer_quantity_must_be_positive() {
        assert!(validate_transfer_request(&transfer(4, "loc-a", "loc-b")).is_ok());

        for bad in [0, -1, -100] {
            let err = validate_transfer_request(&transfer(bad, "loc-a", "loc-b")).unwrap_err();
            assert!(matches!(err, CoreError::InvalidArgument { .. }));
        }
    }

    #[test]
    fn test_self_transfer_rejected() {
        let err = validate_transfer_request(&transfer(4, "loc-a", "loc-a")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }
}
