//! # Ledger Store
//!
//! Append-only repository for the stock-movement ledger.
//!
//! ## Append Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      append(&NewMovement)                               │
//! │                                                                         │
//! │  validate_movement (tally-core)  ── sign, cost, id rules                │
//! │       │                                                                 │
//! │       ▼ BEGIN                                                           │
//! │  outflow: guarded UPDATE positions  WHERE on_hand + δ >= 0             │
//! │           0 rows touched ──► ROLLBACK, Err(InsufficientStock)          │
//! │  inflow:  INSERT .. ON CONFLICT DO UPDATE on_hand = on_hand + δ        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT stock_movements (id, ts assigned here)                         │
//! │       ▼ COMMIT                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guard clause on the position row is what makes concurrent overdraw
//! impossible: two simultaneous outflows against the same position serialize
//! on the row write, and the loser's guard re-evaluates against the winner's
//! committed balance.
//!
//! The transfer and sale paths write the same two tables inside their own
//! transactions through [`apply_position_delta`] and [`insert_movement_row`].
//!
//! Ledger rows are never updated or deleted. Corrections are new
//! `adjustment` entries.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use tally_core::{validate_movement, CoreError, MovementKind, NewMovement, StockMovement};

use crate::error::DbResult;

// =============================================================================
// Filter
// =============================================================================

/// Filter for ledger history queries. All fields optional; unset fields
/// do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub product_id: Option<String>,
    pub location_id: Option<String>,
    pub kind: Option<MovementKind>,
    /// Inclusive lower bound on `created_at`.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl MovementFilter {
    pub fn for_product(product_id: impl Into<String>) -> Self {
        MovementFilter {
            product_id: Some(product_id.into()),
            ..Default::default()
        }
    }

    pub fn at_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    pub fn of_kind(mut self, kind: MovementKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the append-only stock-movement ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Appends a movement to the ledger and updates the position cache,
    /// atomically.
    ///
    /// ## Errors
    /// - `DbError::Domain(CoreError::InvalidMovement)` - sign doesn't match kind
    /// - `DbError::Domain(CoreError::InsufficientStock)` - outflow would take
    ///   the position below zero; nothing is written
    /// - `DbError::ForeignKeyViolation` - unknown product or location
    #[instrument(skip(self, movement), fields(
        product_id = %movement.product_id,
        location_id = %movement.location_id,
        kind = %movement.kind,
        quantity = movement.quantity,
    ))]
    pub async fn append(&self, movement: &NewMovement) -> DbResult<StockMovement> {
        validate_movement(movement)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        apply_position_delta(
            &mut *tx,
            &movement.product_id,
            &movement.location_id,
            movement.quantity,
            now,
        )
        .await?;

        let id = insert_movement_row(&mut *tx, movement, now).await?;

        tx.commit().await?;

        debug!(movement_id = %id, "Ledger append committed");

        Ok(StockMovement {
            id,
            product_id: movement.product_id.clone(),
            location_id: movement.location_id.clone(),
            kind: movement.kind,
            quantity: movement.quantity,
            unit_cost_cents: movement.unit_cost_cents,
            total_cost_cents: movement.total_cost_cents,
            reference_id: movement.reference_id.clone(),
            recorded_by: movement.recorded_by.clone(),
            notes: movement.notes.clone(),
            created_at: now,
        })
    }

    /// Gets a single ledger entry by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<StockMovement>> {
        let movement =
            sqlx::query_as::<_, StockMovement>("SELECT * FROM stock_movements WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(movement)
    }

    /// Queries ledger history, oldest first. Ordering is total: ties on
    /// `created_at` break on `id`, so pagination never skips or repeats.
    pub async fn movements(&self, filter: &MovementFilter) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE (?1 IS NULL OR product_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
              AND (?3 IS NULL OR kind = ?3)
              AND (?4 IS NULL OR created_at >= ?4)
              AND (?5 IS NULL OR created_at < ?5)
            ORDER BY created_at ASC, id ASC
            LIMIT ?6 OFFSET ?7
            "#,
        )
        .bind(&filter.product_id)
        .bind(&filter.location_id)
        .bind(filter.kind)
        .bind(filter.since)
        .bind(filter.until)
        .bind(filter.limit.unwrap_or(-1)) // SQLite: LIMIT -1 = unbounded
        .bind(filter.offset.unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Returns every movement sharing a reference (a transfer pair, or all
    /// lines of a sales transaction), oldest first.
    pub async fn movements_for_reference(
        &self,
        reference_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE reference_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Ground-truth on-hand: the full replay sum for one (product, location).
    pub async fn sum_quantity(&self, product_id: &str, location_id: &str) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0) FROM stock_movements
            WHERE product_id = ?1 AND location_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum)
    }

    /// Total number of ledger entries. Used by tests to assert all-or-nothing
    /// writes.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Shared write helpers
// =============================================================================
// The transfer and sale repositories write the same (positions, movements)
// pair inside their own multi-row transactions. These helpers run against
// the caller's open transaction; on error the caller propagates with `?`
// and the dropped transaction rolls everything back.

/// Applies a signed on-hand delta to the position cache.
///
/// Negative deltas are guarded: the row only changes if the balance stays
/// non-negative, otherwise `CoreError::InsufficientStock` comes back with
/// the available quantity read under the same transaction.
pub(crate) async fn apply_position_delta(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    if delta < 0 {
        let touched = sqlx::query(
            r#"
            UPDATE stock_positions
            SET on_hand = on_hand + ?1, updated_at = ?2
            WHERE product_id = ?3 AND location_id = ?4
              AND on_hand + ?1 >= 0
            "#,
        )
        .bind(delta)
        .bind(now)
        .bind(product_id)
        .bind(location_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if touched == 0 {
            // Guard failed or no position row exists (available = 0).
            let available: i64 = sqlx::query_scalar(
                r#"
                SELECT COALESCE(
                    (SELECT on_hand FROM stock_positions
                     WHERE product_id = ?1 AND location_id = ?2),
                    0)
                "#,
            )
            .bind(product_id)
            .bind(location_id)
            .fetch_one(&mut *conn)
            .await?;

            warn!(
                product_id,
                location_id,
                available,
                requested = -delta,
                "Rejected overdrawing write"
            );

            return Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                location_id: location_id.to_string(),
                available,
                requested: -delta,
            }
            .into());
        }
    } else {
        sqlx::query(
            r#"
            INSERT INTO stock_positions (product_id, location_id, on_hand, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(product_id, location_id)
            DO UPDATE SET on_hand = on_hand + excluded.on_hand,
                          updated_at = excluded.updated_at
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .bind(delta)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Inserts one ledger row with a fresh UUID and the caller's timestamp.
/// Returns the assigned id.
pub(crate) async fn insert_movement_row(
    conn: &mut SqliteConnection,
    movement: &NewMovement,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO stock_movements
            (id, product_id, location_id, kind, quantity, unit_cost_cents,
             total_cost_cents, reference_id, recorded_by, notes, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&id)
    .bind(&movement.product_id)
    .bind(&movement.location_id)
    .bind(movement.kind)
    .bind(movement.quantity)
    .bind(movement.unit_cost_cents)
    .bind(movement.total_cost_cents)
    .bind(&movement.reference_id)
    .bind(&movement.recorded_by)
    .bind(&movement.notes)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

// =============================================================================
// Unit Tests
// =============================================================================
