//! # Stock Projector
//!
//! Reads over the derived position cache, plus reconciliation and rebuild.
//!
//! The cache itself is only ever WRITTEN by the ledger append path (and the
//! transfer/sale paths that share it), inside the same transaction as the
//! ledger row. This repository reads it, audits it against the ledger, and
//! can rebuild it from replay.
//!
//! ## Reconciliation
//! ```text
//! ledger:  SELECT product, location, SUM(quantity) GROUP BY ...  (truth)
//! cache:   SELECT product, location, on_hand                      (claim)
//!          │
//!          ▼ full outer merge in Rust (BTreeMap, both directions)
//! report:  pairs where truth ≠ claim, including pairs missing on
//!          either side (missing side counts as 0)
//! ```
//! Mismatches are REPORTED, never silently patched; `rebuild()` is the
//! explicit repair. Likewise a negative cached value is corruption (the
//! guarded writes cannot produce one): `on_hand` refuses to serve it and
//! surfaces `ReconciliationMismatch` instead of clamping.

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use tally_core::{CoreError, PositionMismatch, ReconciliationReport, StockPosition};

use crate::error::DbResult;

/// Repository for derived stock positions.
#[derive(Debug, Clone)]
pub struct PositionRepository {
    pool: SqlitePool,
}

impl PositionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PositionRepository { pool }
    }

    /// On-hand quantity for one (product, location). A missing cache row
    /// means no movements have touched the pair: zero.
    ///
    /// ## Errors
    /// `DbError::Domain(CoreError::ReconciliationMismatch)` if the cached
    /// value is negative. That state cannot arise through the guarded write
    /// paths, so it is reported as corruption alongside the true ledger sum,
    /// never clamped to zero.
    pub async fn on_hand(&self, product_id: &str, location_id: &str) -> DbResult<i64> {
        let cached: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(
                (SELECT on_hand FROM stock_positions
                 WHERE product_id = ?1 AND location_id = ?2),
                0)
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_one(&self.pool)
        .await?;

        if cached < 0 {
            let ledger_quantity: i64 = sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(quantity), 0) FROM stock_movements
                WHERE product_id = ?1 AND location_id = ?2
                "#,
            )
            .bind(product_id)
            .bind(location_id)
            .fetch_one(&self.pool)
            .await?;

            warn!(
                product_id,
                location_id, cached, ledger_quantity, "Negative cached position"
            );

            return Err(CoreError::ReconciliationMismatch {
                product_id: product_id.to_string(),
                location_id: location_id.to_string(),
                ledger_quantity,
                cached_quantity: cached,
            }
            .into());
        }

        Ok(cached)
    }

    /// Total on-hand for a product summed across every location.
    pub async fn total_on_hand(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(on_hand), 0) FROM stock_positions
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Every position of a product, ordered by location id.
    pub async fn positions_for_product(&self, product_id: &str) -> DbResult<Vec<StockPosition>> {
        let positions = sqlx::query_as::<_, StockPosition>(
            r#"
            SELECT * FROM stock_positions
            WHERE product_id = ?1
            ORDER BY location_id ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(positions)
    }

    /// Every position at a location, ordered by product id.
    pub async fn positions_at_location(&self, location_id: &str) -> DbResult<Vec<StockPosition>> {
        let positions = sqlx::query_as::<_, StockPosition>(
            r#"
            SELECT * FROM stock_positions
            WHERE location_id = ?1
            ORDER BY product_id ASC
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(positions)
    }

    /// Replays the ledger and compares the sums against the cache,
    /// optionally scoped to one product and/or one location.
    ///
    /// Pairs present on only one side are compared against 0, so a cache row
    /// with no ledger backing (or vice versa) is a mismatch too.
    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        product_id: Option<&str>,
        location_id: Option<&str>,
    ) -> DbResult<ReconciliationReport> {
        let ledger_rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT product_id, location_id, COALESCE(SUM(quantity), 0)
            FROM stock_movements
            WHERE (?1 IS NULL OR product_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
            GROUP BY product_id, location_id
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        let cache_rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT product_id, location_id, on_hand FROM stock_positions
            WHERE (?1 IS NULL OR product_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        // Full outer merge: (ledger sum, cached value) per pair.
        let mut pairs: BTreeMap<(String, String), (i64, i64)> = BTreeMap::new();
        for (product, location, truth) in ledger_rows {
            pairs.entry((product, location)).or_insert((0, 0)).0 = truth;
        }
        for (product, location, claimed) in cache_rows {
            pairs.entry((product, location)).or_insert((0, 0)).1 = claimed;
        }

        let pairs_checked = pairs.len();
        let mismatches: Vec<PositionMismatch> = pairs
            .into_iter()
            .filter(|(_, (truth, claimed))| truth != claimed)
            .map(|((product_id, location_id), (truth, claimed))| PositionMismatch {
                product_id,
                location_id,
                ledger_quantity: truth,
                cached_quantity: claimed,
            })
            .collect();

        if mismatches.is_empty() {
            info!(pairs_checked, "Reconciliation clean");
        } else {
            warn!(
                pairs_checked,
                mismatch_count = mismatches.len(),
                "Reconciliation found cache drift"
            );
        }

        Ok(ReconciliationReport::new(pairs_checked, mismatches))
    }

    /// Drops the (optionally scoped) cache rows and rewrites them from
    /// ledger replay, in one transaction. The explicit repair for a dirty
    /// reconciliation.
    #[instrument(skip(self))]
    pub async fn rebuild(
        &self,
        product_id: Option<&str>,
        location_id: Option<&str>,
    ) -> DbResult<usize> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        sqlx::query(
            r#"
            DELETE FROM stock_positions
            WHERE (?1 IS NULL OR product_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .execute(&mut *tx)
        .await?;

        let rebuilt = sqlx::query(
            r#"
            INSERT INTO stock_positions (product_id, location_id, on_hand, updated_at)
            SELECT product_id, location_id, COALESCE(SUM(quantity), 0), ?3
            FROM stock_movements
            WHERE (?1 IS NULL OR product_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
            GROUP BY product_id, location_id
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        info!(rebuilt, "Position cache rebuilt from ledger replay");
        Ok(rebuilt as usize)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
