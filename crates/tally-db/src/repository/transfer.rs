//! # Transfer Coordinator
//!
//! Two-location stock transfers as paired ledger entries.
//!
//! ## Anatomy of a Transfer
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  transfer(p-1, loc-a ──► loc-b, qty 4)                                  │
//! │                                                                         │
//! │  ONE SQLite transaction:                                                │
//! │    guard-decrement positions[p-1, loc-a]   (fails ► InsufficientStock)  │
//! │    upsert-increment positions[p-1, loc-b]                               │
//! │    INSERT movement  transfer_out  qty -4  reference R                   │
//! │    INSERT movement  transfer_in   qty +4  reference R                   │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Both halves share reference R and the source's cost basis, so both    │
//! │  quantity and value are conserved: the pair sums to zero.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no partial state: a failed transfer writes nothing at all.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, instrument};
use uuid::Uuid;

use tally_core::{
    validate_transfer_request, MovementKind, NewMovement, StockMovement, TransferRecord,
    TransferRequest,
};

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{apply_position_delta, insert_movement_row};

/// Repository coordinating two-location transfers.
#[derive(Debug, Clone)]
pub struct TransferRepository {
    pool: SqlitePool,
}

impl TransferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransferRepository { pool }
    }

    /// Executes a transfer atomically.
    ///
    /// The cost basis on both ledger halves is the product's current
    /// `cost_cents`, read inside the same transaction.
    ///
    /// ## Errors
    /// - `DbError::Domain(CoreError::InvalidArgument)` - non-positive
    ///   quantity or identical source and destination
    /// - `DbError::Domain(CoreError::InsufficientStock)` - source doesn't
    ///   hold the quantity; nothing is written
    /// - `DbError::NotFound` - unknown product
    #[instrument(skip(self, request), fields(
        product_id = %request.product_id,
        from = %request.from_location_id,
        to = %request.to_location_id,
        quantity = request.quantity,
    ))]
    pub async fn transfer(&self, request: &TransferRequest) -> DbResult<TransferRecord> {
        validate_transfer_request(request)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let unit_cost_cents: i64 =
            sqlx::query_scalar("SELECT cost_cents FROM products WHERE id = ?1")
                .bind(&request.product_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &request.product_id))?;

        // Debit source (guarded), credit destination.
        apply_position_delta(
            &mut *tx,
            &request.product_id,
            &request.from_location_id,
            -request.quantity,
            now,
        )
        .await?;
        apply_position_delta(
            &mut *tx,
            &request.product_id,
            &request.to_location_id,
            request.quantity,
            now,
        )
        .await?;

        let reference_id = Uuid::new_v4().to_string();

        let out = NewMovement::new(
            &request.product_id,
            &request.from_location_id,
            MovementKind::TransferOut,
            -request.quantity,
            unit_cost_cents,
            &request.actor_id,
        )
        .with_reference(&reference_id);
        insert_movement_row(&mut *tx, &out, now).await?;

        let incoming = NewMovement::new(
            &request.product_id,
            &request.to_location_id,
            MovementKind::TransferIn,
            request.quantity,
            unit_cost_cents,
            &request.actor_id,
        )
        .with_reference(&reference_id);
        insert_movement_row(&mut *tx, &incoming, now).await?;

        tx.commit().await?;

        info!(reference_id = %reference_id, "Transfer committed");

        Ok(TransferRecord {
            reference_id,
            product_id: request.product_id.clone(),
            from_location_id: request.from_location_id.clone(),
            to_location_id: request.to_location_id.clone(),
            quantity: request.quantity,
            unit_cost_cents,
            created_at: now,
        })
    }

    /// Fetches the pair of ledger entries behind a committed transfer,
    /// debit half first.
    pub async fn entries(&self, reference_id: &str) -> DbResult<Vec<StockMovement>> {
        let entries = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE reference_id = ?1
              AND kind IN ('transfer_out', 'transfer_in')
            ORDER BY quantity ASC
            "#,
        )
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
