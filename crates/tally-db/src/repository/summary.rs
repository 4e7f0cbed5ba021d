//! # Daily Summary Aggregator
//!
//! Idempotent per-day sales rollups.
//!
//! ## Generation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  generate(date, location?)                                              │
//! │                                                                         │
//! │  snapshot read: the day's transactions + lines (one query pass)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tally_core::summarize  ── pure, deterministic rollup math              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  upsert daily_sales_summaries  (UPDATE, INSERT if 0 rows)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The upsert is keyed on `(date, location_id)` with `location_id IS ?`
//! because the all-locations row stores NULL and SQLite UNIQUE indexes
//! treat NULLs as distinct. Regenerating over unchanged data rewrites the
//! row with byte-identical content (BTreeMap breakdown, stable JSON).

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use tally_core::{summarize, DailySalesSummary};

use crate::error::{DbError, DbResult};
use crate::repository::sale::SaleRepository;

/// Repository for derived daily sales summaries.
#[derive(Debug, Clone)]
pub struct SummaryRepository {
    pool: SqlitePool,
}

/// Row shape of `daily_sales_summaries`; the breakdown is a JSON column.
#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    date: NaiveDate,
    location_id: Option<String>,
    total_transactions: i64,
    total_revenue_cents: i64,
    total_items_sold: i64,
    average_transaction_cents: i64,
    top_product_id: Option<String>,
    payment_breakdown: String,
}

impl SummaryRow {
    fn into_summary(self) -> DbResult<DailySalesSummary> {
        let payment_breakdown = serde_json::from_str(&self.payment_breakdown)
            .map_err(|e| DbError::Internal(format!("corrupt payment breakdown: {e}")))?;

        Ok(DailySalesSummary {
            date: self.date,
            location_id: self.location_id,
            total_transactions: self.total_transactions,
            total_revenue_cents: self.total_revenue_cents,
            total_items_sold: self.total_items_sold,
            average_transaction_cents: self.average_transaction_cents,
            top_product_id: self.top_product_id,
            payment_breakdown,
        })
    }
}

impl SummaryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SummaryRepository { pool }
    }

    /// Computes the rollup for one UTC civil date (optionally one location)
    /// and stores it, overwriting any previous row for the same key.
    ///
    /// Idempotent: regenerating over unchanged data yields an identical
    /// summary. Returns transactions (is_return = 1) are excluded.
    #[instrument(skip(self), fields(%date, location_id))]
    pub async fn generate(
        &self,
        date: NaiveDate,
        location_id: Option<&str>,
    ) -> DbResult<DailySalesSummary> {
        let transactions = SaleRepository::new(self.pool.clone())
            .transactions_for_day(date, location_id)
            .await?;

        let summary = summarize(date, location_id, &transactions);
        self.store(&summary).await?;

        info!(
            total_transactions = summary.total_transactions,
            total_revenue_cents = summary.total_revenue_cents,
            "Daily summary generated"
        );

        Ok(summary)
    }

    /// Fetches a stored summary, if one has been generated.
    pub async fn get(
        &self,
        date: NaiveDate,
        location_id: Option<&str>,
    ) -> DbResult<Option<DailySalesSummary>> {
        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT * FROM daily_sales_summaries
            WHERE date = ?1 AND location_id IS ?2
            "#,
        )
        .bind(date)
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SummaryRow::into_summary).transpose()
    }

    /// All stored summaries for a date, all-locations row first, then by
    /// location id.
    pub async fn for_date(&self, date: NaiveDate) -> DbResult<Vec<DailySalesSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT * FROM daily_sales_summaries
            WHERE date = ?1
            ORDER BY location_id IS NOT NULL, location_id ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SummaryRow::into_summary).collect()
    }

    async fn store(&self, summary: &DailySalesSummary) -> DbResult<()> {
        let breakdown = serde_json::to_string(&summary.payment_breakdown)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE daily_sales_summaries
            SET total_transactions = ?3, total_revenue_cents = ?4,
                total_items_sold = ?5, average_transaction_cents = ?6,
                top_product_id = ?7, payment_breakdown = ?8
            WHERE date = ?1 AND location_id IS ?2
            "#,
        )
        .bind(summary.date)
        .bind(&summary.location_id)
        .bind(summary.total_transactions)
        .bind(summary.total_revenue_cents)
        .bind(summary.total_items_sold)
        .bind(summary.average_transaction_cents)
        .bind(&summary.top_product_id)
        .bind(&breakdown)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            sqlx::query(
                r#"
                INSERT INTO daily_sales_summaries
                    (date, location_id, total_transactions, total_revenue_cents,
                     total_items_sold, average_transaction_cents, top_product_id,
                     payment_breakdown)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(summary.date)
            .bind(&summary.location_id)
            .bind(summary.total_transactions)
            .bind(summary.total_revenue_cents)
            .bind(summary.total_items_sold)
            .bind(summary.average_transaction_cents)
            .bind(&summary.top_product_id)
            .bind(&breakdown)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::testutil::{seed_location, seed_product, stock, test_db};
    use chrono::Utc;
    use tally_core::{NewSaleLine, NewTransaction};

    fn line(product_id: &str, quantity: i64, unit_price_cents: i64) -> NewSaleLine {
        NewSaleLine {
            product_id: product_id.to_string(),
            quantity,
            unit_price_cents,
            discount_cents: 0,
            line_total_cents: unit_price_cents * quantity,
        }
    }

    fn sale(lines: Vec<NewSaleLine>, payment: &str) -> NewTransaction {
        let subtotal: i64 = lines.iter().map(|l| l.line_total_cents).sum();
        NewTransaction {
            location_id: "loc-a".to_string(),
            cashier_id: "cashier-1".to_string(),
            subtotal_cents: subtotal,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: subtotal,
            payment_method: Some(payment.to_string()),
            lines,
        }
    }

    async fn ready_db() -> crate::pool::Database {
        let db = test_db().await;
        seed_location(&db, "loc-a", "Main Store").await;
        seed_product(&db, "p-1", "SKU-1", 250).await;
        seed_product(&db, "p-2", "SKU-2", 100).await;
        stock(&db, "p-1", "loc-a", 50).await;
        stock(&db, "p-2", "loc-a", 50).await;
        db
    }

    #[tokio::test]
    async fn test_breakdown_and_average() {
        let db = ready_db().await;
        let today = Utc::now().date_naive();

        // $50 cash + $70 card.
        db.sales()
            .record_transaction(&sale(vec![line("p-1", 2, 2500)], "cash"))
            .await
            .unwrap();
        db.sales()
            .record_transaction(&sale(vec![line("p-2", 7, 1000)], "card"))
            .await
            .unwrap();

        let summary = db.summaries().generate(today, None).await.unwrap();
        assert_eq!(summary.total_transactions, 2);
        assert_eq!(summary.total_revenue_cents, 12_000);
        assert_eq!(summary.total_items_sold, 9);
        assert_eq!(summary.average_transaction_cents, 6_000);
        assert_eq!(summary.payment_breakdown.get("cash"), Some(&5_000));
        assert_eq!(summary.payment_breakdown.get("card"), Some(&7_000));
        assert_eq!(summary.top_product_id.as_deref(), Some("p-2"));
    }

    #[tokio::test]
    async fn test_generation_is_idempotent() {
        let db = ready_db().await;
        let today = Utc::now().date_naive();

        db.sales()
            .record_transaction(&sale(vec![line("p-1", 1, 2500)], "cash"))
            .await
            .unwrap();

        let first = db.summaries().generate(today, None).await.unwrap();
        let second = db.summaries().generate(today, None).await.unwrap();
        assert_eq!(first, second);

        // Still exactly one stored row for the key.
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM daily_sales_summaries WHERE date = ?1 AND location_id IS NULL",
        )
        .bind(today)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(count, 1);

        let stored = db.summaries().get(today, None).await.unwrap().unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn test_regeneration_reflects_new_sales() {
        let db = ready_db().await;
        let today = Utc::now().date_naive();

        db.sales()
            .record_transaction(&sale(vec![line("p-1", 1, 2500)], "cash"))
            .await
            .unwrap();
        let before = db.summaries().generate(today, None).await.unwrap();
        assert_eq!(before.total_transactions, 1);

        db.sales()
            .record_transaction(&sale(vec![line("p-1", 1, 2500)], "cash"))
            .await
            .unwrap();
        let after = db.summaries().generate(today, None).await.unwrap();
        assert_eq!(after.total_transactions, 2);
        assert_eq!(after.payment_breakdown.get("cash"), Some(&5_000));
    }

    #[tokio::test]
    async fn test_returns_excluded() {
        let db = ready_db().await;
        let today = Utc::now().date_naive();

        let txn = db
            .sales()
            .record_transaction(&sale(vec![line("p-1", 2, 2500)], "cash"))
            .await
            .unwrap();
        db.sales()
            .record_return(&txn.id, &[line("p-1", 1, 2500)], "cashier-2")
            .await
            .unwrap();

        let summary = db.summaries().generate(today, None).await.unwrap();
        assert_eq!(summary.total_transactions, 1);
        assert_eq!(summary.total_revenue_cents, 5_000);
    }

    #[tokio::test]
    async fn test_empty_day_stores_zero_row() {
        let db = ready_db().await;
        let today = Utc::now().date_naive();

        let summary = db.summaries().generate(today, None).await.unwrap();
        assert_eq!(summary.total_transactions, 0);
        assert_eq!(summary.total_revenue_cents, 0);
        assert_eq!(summary.average_transaction_cents, 0);
        assert!(summary.top_product_id.is_none());
        assert!(summary.payment_breakdown.is_empty());

        assert!(db.summaries().get(today, None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_per_location_and_all_location_rows_coexist() {
        let db = ready_db().await;
        seed_location(&db, "loc-b", "Warehouse").await;
        let today = Utc::now().date_naive();

        db.sales()
            .record_transaction(&sale(vec![line("p-1", 1, 2500)], "cash"))
            .await
            .unwrap();

        db.summaries().generate(today, None).await.unwrap();
        db.summaries().generate(today, Some("loc-a")).await.unwrap();
        db.summaries().generate(today, Some("loc-b")).await.unwrap();

        let all = db.summaries().for_date(today).await.unwrap();
        assert_eq!(all.len(), 3);
        // All-locations row sorts first.
        assert!(all[0].location_id.is_none());
        assert_eq!(all[1].location_id.as_deref(), Some("loc-a"));
        assert_eq!(all[2].location_id.as_deref(), Some("loc-b"));
        assert_eq!(all[2].total_transactions, 0);
    }
}
