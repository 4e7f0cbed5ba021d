//! # Sales Transactions
//!
//! Recording sales and returns, and the snapshot read the daily aggregator
//! works from.
//!
//! ## Sale Completion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_transaction(NewTransaction)                                     │
//! │                                                                         │
//! │  ONE SQLite transaction:                                                │
//! │    assign TXN-YYYYMMDD-NNNNNN (per-day sequence)                        │
//! │    INSERT sales_transactions                                            │
//! │    per line:                                                            │
//! │      INSERT sale_lines                                                  │
//! │      guard-decrement positions[product, location]                       │
//! │      INSERT movement  sale  qty -n  reference = transaction id          │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any line short on stock fails the WHOLE sale: no transaction row,     │
//! │  no lines, no movements.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Returns mirror this with a RET- number, negated amounts, and `return`
//! inflow movements. Return transactions carry `is_return = 1` and are
//! excluded from daily summaries.

use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;
use tracing::{info, instrument};
use uuid::Uuid;

use tally_core::{
    CoreError, MovementKind, NewMovement, NewSaleLine, NewTransaction, SaleLine, SalesTransaction,
};

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{apply_position_delta, insert_movement_row};

/// Repository for sales transactions and their ledger side effects.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a completed sale: the transaction row, its lines, and one
    /// `sale` ledger movement per line, all atomically.
    ///
    /// ## Errors
    /// - `DbError::Domain(CoreError::InvalidArgument)` - no lines, or a line
    ///   with non-positive quantity
    /// - `DbError::Domain(CoreError::InsufficientStock)` - any line exceeds
    ///   on-hand stock; the whole sale is rolled back
    /// - `DbError::NotFound` - a line references an unknown product
    #[instrument(skip(self, new), fields(
        location_id = %new.location_id,
        cashier_id = %new.cashier_id,
        lines = new.lines.len(),
    ))]
    pub async fn record_transaction(&self, new: &NewTransaction) -> DbResult<SalesTransaction> {
        validate_lines(&new.lines)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let transaction_number = next_number(&mut *tx, "TXN", now.date_naive()).await?;
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO sales_transactions
                (id, transaction_number, location_id, cashier_id, subtotal_cents,
                 tax_cents, discount_cents, total_cents, payment_method, is_return,
                 original_transaction_id, transaction_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, NULL, ?10)
            "#,
        )
        .bind(&id)
        .bind(&transaction_number)
        .bind(&new.location_id)
        .bind(&new.cashier_id)
        .bind(new.subtotal_cents)
        .bind(new.tax_cents)
        .bind(new.discount_cents)
        .bind(new.total_cents)
        .bind(&new.payment_method)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &new.lines {
            insert_line(&mut *tx, &id, line).await?;

            let cost_cents = product_cost(&mut *tx, &line.product_id).await?;

            apply_position_delta(
                &mut *tx,
                &line.product_id,
                &new.location_id,
                -line.quantity,
                now,
            )
            .await?;

            let movement = NewMovement::new(
                &line.product_id,
                &new.location_id,
                MovementKind::Sale,
                -line.quantity,
                cost_cents,
                &new.cashier_id,
            )
            .with_reference(&id);
            insert_movement_row(&mut *tx, &movement, now).await?;
        }

        tx.commit().await?;

        info!(transaction_number = %transaction_number, "Sale recorded");

        Ok(SalesTransaction {
            id,
            transaction_number,
            location_id: new.location_id.clone(),
            cashier_id: new.cashier_id.clone(),
            subtotal_cents: new.subtotal_cents,
            tax_cents: new.tax_cents,
            discount_cents: new.discount_cents,
            total_cents: new.total_cents,
            payment_method: new.payment_method.clone(),
            is_return: false,
            original_transaction_id: None,
            transaction_date: now,
        })
    }

    /// Records a return against a previous sale: a RET- transaction with
    /// negated amounts, and `return` inflow movements restocking each line.
    ///
    /// Quantities in `lines` are positive (units coming back).
    #[instrument(skip(self, lines), fields(original = %original_transaction_id))]
    pub async fn record_return(
        &self,
        original_transaction_id: &str,
        lines: &[NewSaleLine],
        cashier_id: &str,
    ) -> DbResult<SalesTransaction> {
        validate_lines(lines)?;

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let original = sqlx::query_as::<_, SalesTransaction>(
            "SELECT * FROM sales_transactions WHERE id = ?1",
        )
        .bind(original_transaction_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Transaction", original_transaction_id))?;

        if original.is_return {
            return Err(CoreError::InvalidArgument {
                reason: "cannot record a return against a return".to_string(),
            }
            .into());
        }

        let refund_cents: i64 = lines.iter().map(|l| l.line_total_cents).sum();
        let transaction_number = next_number(&mut *tx, "RET", now.date_naive()).await?;
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO sales_transactions
                (id, transaction_number, location_id, cashier_id, subtotal_cents,
                 tax_cents, discount_cents, total_cents, payment_method, is_return,
                 original_transaction_id, transaction_date)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?5, ?6, 1, ?7, ?8)
            "#,
        )
        .bind(&id)
        .bind(&transaction_number)
        .bind(&original.location_id)
        .bind(cashier_id)
        .bind(-refund_cents)
        .bind(&original.payment_method)
        .bind(original_transaction_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in lines {
            // Lines mirror the refund: negative quantity and amount.
            let negated = NewSaleLine {
                product_id: line.product_id.clone(),
                quantity: -line.quantity,
                unit_price_cents: line.unit_price_cents,
                discount_cents: line.discount_cents,
                line_total_cents: -line.line_total_cents,
            };
            insert_line(&mut *tx, &id, &negated).await?;

            let cost_cents = product_cost(&mut *tx, &line.product_id).await?;

            apply_position_delta(
                &mut *tx,
                &line.product_id,
                &original.location_id,
                line.quantity,
                now,
            )
            .await?;

            let movement = NewMovement::new(
                &line.product_id,
                &original.location_id,
                MovementKind::Return,
                line.quantity,
                cost_cents,
                cashier_id,
            )
            .with_reference(&id);
            insert_movement_row(&mut *tx, &movement, now).await?;
        }

        tx.commit().await?;

        info!(transaction_number = %transaction_number, "Return recorded");

        Ok(SalesTransaction {
            id,
            transaction_number,
            location_id: original.location_id,
            cashier_id: cashier_id.to_string(),
            subtotal_cents: -refund_cents,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: -refund_cents,
            payment_method: original.payment_method,
            is_return: true,
            original_transaction_id: Some(original_transaction_id.to_string()),
            transaction_date: now,
        })
    }

    /// Gets one transaction with its lines.
    pub async fn get(&self, id: &str) -> DbResult<Option<(SalesTransaction, Vec<SaleLine>)>> {
        let transaction = sqlx::query_as::<_, SalesTransaction>(
            "SELECT * FROM sales_transactions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match transaction {
            Some(transaction) => {
                let lines = self.lines_for(&transaction.id).await?;
                Ok(Some((transaction, lines)))
            }
            None => Ok(None),
        }
    }

    /// All transactions (with lines) whose `transaction_date` falls on the
    /// given UTC civil date, optionally restricted to one location. This is
    /// the aggregator's snapshot read: everything comes from one read
    /// transaction so a concurrently recorded sale cannot appear half-read.
    ///
    /// Day boundaries are `[00:00, next day 00:00)` UTC.
    pub async fn transactions_for_day(
        &self,
        date: NaiveDate,
        location_id: Option<&str>,
    ) -> DbResult<Vec<(SalesTransaction, Vec<SaleLine>)>> {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = (date + chrono::Days::new(1)).and_time(NaiveTime::MIN).and_utc();

        let mut tx = self.pool.begin().await?;

        let transactions = sqlx::query_as::<_, SalesTransaction>(
            r#"
            SELECT * FROM sales_transactions
            WHERE transaction_date >= ?1 AND transaction_date < ?2
              AND (?3 IS NULL OR location_id = ?3)
            ORDER BY transaction_date ASC, id ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(location_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut out = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            let lines = sqlx::query_as::<_, SaleLine>(
                "SELECT * FROM sale_lines WHERE transaction_id = ?1 ORDER BY id ASC",
            )
            .bind(&transaction.id)
            .fetch_all(&mut *tx)
            .await?;
            out.push((transaction, lines));
        }

        tx.commit().await?;
        Ok(out)
    }

    async fn lines_for(&self, transaction_id: &str) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(
            "SELECT * FROM sale_lines WHERE transaction_id = ?1 ORDER BY id ASC",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_lines(lines: &[NewSaleLine]) -> DbResult<()> {
    if lines.is_empty() {
        return Err(CoreError::InvalidArgument {
            reason: "transaction must have at least one line".to_string(),
        }
        .into());
    }
    for line in lines {
        if line.quantity <= 0 {
            return Err(CoreError::InvalidArgument {
                reason: format!(
                    "line quantity must be positive, got {} for product {}",
                    line.quantity, line.product_id
                ),
            }
            .into());
        }
    }
    Ok(())
}

/// Next per-day sequence number, e.g. `TXN-20260823-000042`. Counted inside
/// the caller's transaction so concurrent writers serialize on it.
async fn next_number(
    conn: &mut sqlx::SqliteConnection,
    prefix: &str,
    date: NaiveDate,
) -> DbResult<String> {
    let day = date.format("%Y%m%d").to_string();
    let like = format!("{prefix}-{day}-%");

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sales_transactions WHERE transaction_number LIKE ?1")
            .bind(&like)
            .fetch_one(&mut *conn)
            .await?;

    Ok(format!("{}-{}-{:06}", prefix, day, count + 1))
}

async fn product_cost(conn: &mut sqlx::SqliteConnection, product_id: &str) -> DbResult<i64> {
    sqlx::query_scalar("SELECT cost_cents FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))
}

async fn insert_line(
    conn: &mut sqlx::SqliteConnection,
    transaction_id: &str,
    line: &NewSaleLine,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_lines
            (id, transaction_id, product_id, quantity, unit_price_cents,
             discount_cents, line_total_cents)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(transaction_id)
    .bind(&line.product_id)
    .bind(line.quantity)
    .bind(line.unit_price_cents)
    .bind(line.discount_cents)
    .bind(line.line_total_cents)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_location, seed_product, stock, test_db};

    fn line(product_id: &str, quantity: i64, unit_price_cents: i64) -> NewSaleLine {
        NewSaleLine {
            product_id: product_id.to_string(),
            quantity,
            unit_price_cents,
            discount_cents: 0,
            line_total_cents: unit_price_cents * quantity,
        }
    }

    fn new_transaction(lines: Vec<NewSaleLine>, payment: Option<&str>) -> NewTransaction {
        let subtotal: i64 = lines.iter().map(|l| l.line_total_cents).sum();
        NewTransaction {
            location_id: "loc-a".to_string(),
            cashier_id: "cashier-1".to_string(),
            subtotal_cents: subtotal,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: subtotal,
            payment_method: payment.map(str::to_string),
            lines,
        }
    }

    async fn ready_db() -> crate::pool::Database {
        let db = test_db().await;
        seed_location(&db, "loc-a", "Main Store").await;
        seed_product(&db, "p-1", "SKU-1", 250).await;
        seed_product(&db, "p-2", "SKU-2", 100).await;
        stock(&db, "p-1", "loc-a", 20).await;
        stock(&db, "p-2", "loc-a", 20).await;
        db
    }

    #[tokio::test]
    async fn test_sale_writes_lines_and_ledger() {
        let db = ready_db().await;

        let txn = db
            .sales()
            .record_transaction(&new_transaction(
                vec![line("p-1", 2, 500), line("p-2", 1, 300)],
                Some("cash"),
            ))
            .await
            .unwrap();

        assert!(txn.transaction_number.starts_with("TXN-"));
        assert!(txn.transaction_number.ends_with("-000001"));
        assert_eq!(txn.total_cents, 1300);

        let (_, lines) = db.sales().get(&txn.id).await.unwrap().unwrap();
        assert_eq!(lines.len(), 2);

        // Stock drained and ledger entries reference the transaction.
        assert_eq!(db.positions().on_hand("p-1", "loc-a").await.unwrap(), 18);
        assert_eq!(db.positions().on_hand("p-2", "loc-a").await.unwrap(), 19);
        let movements = db.ledger().movements_for_reference(&txn.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().all(|m| m.kind == MovementKind::Sale));
    }

    #[tokio::test]
    async fn test_transaction_numbers_sequence_per_day() {
        let db = ready_db().await;

        let t1 = db
            .sales()
            .record_transaction(&new_transaction(vec![line("p-1", 1, 500)], Some("cash")))
            .await
            .unwrap();
        let t2 = db
            .sales()
            .record_transaction(&new_transaction(vec![line("p-1", 1, 500)], Some("card")))
            .await
            .unwrap();

        assert!(t1.transaction_number.ends_with("-000001"));
        assert!(t2.transaction_number.ends_with("-000002"));
    }

    #[tokio::test]
    async fn test_short_stock_rolls_back_whole_sale() {
        let db = ready_db().await;

        // First line fits, second overdraws: everything must roll back.
        let err = db
            .sales()
            .record_transaction(&new_transaction(
                vec![line("p-1", 2, 500), line("p-2", 50, 300)],
                Some("cash"),
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));

        assert_eq!(db.positions().on_hand("p-1", "loc-a").await.unwrap(), 20);
        assert_eq!(db.positions().on_hand("p-2", "loc-a").await.unwrap(), 20);
        let day = db
            .sales()
            .transactions_for_day(Utc::now().date_naive(), None)
            .await
            .unwrap();
        assert!(day.is_empty());
    }

    #[tokio::test]
    async fn test_empty_transaction_rejected() {
        let db = ready_db().await;
        let err = db
            .sales()
            .record_transaction(&new_transaction(vec![], Some("cash")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_return_restocks_and_negates_amounts() {
        let db = ready_db().await;

        let sale = db
            .sales()
            .record_transaction(&new_transaction(vec![line("p-1", 3, 500)], Some("card")))
            .await
            .unwrap();
        assert_eq!(db.positions().on_hand("p-1", "loc-a").await.unwrap(), 17);

        let ret = db
            .sales()
            .record_return(&sale.id, &[line("p-1", 2, 500)], "cashier-2")
            .await
            .unwrap();

        assert!(ret.transaction_number.starts_with("RET-"));
        assert!(ret.is_return);
        assert_eq!(ret.total_cents, -1000);
        assert_eq!(ret.payment_method.as_deref(), Some("card"));
        assert_eq!(ret.original_transaction_id.as_deref(), Some(sale.id.as_str()));

        // Units back on the shelf via `return` inflows.
        assert_eq!(db.positions().on_hand("p-1", "loc-a").await.unwrap(), 19);
        let movements = db.ledger().movements_for_reference(&ret.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::Return);
        assert_eq!(movements[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_return_of_return_rejected() {
        let db = ready_db().await;

        let sale = db
            .sales()
            .record_transaction(&new_transaction(vec![line("p-1", 1, 500)], None))
            .await
            .unwrap();
        let ret = db
            .sales()
            .record_return(&sale.id, &[line("p-1", 1, 500)], "cashier-2")
            .await
            .unwrap();

        let err = db
            .sales()
            .record_return(&ret.id, &[line("p-1", 1, 500)], "cashier-2")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_transactions_for_day_filters_location() {
        let db = ready_db().await;
        seed_location(&db, "loc-b", "Warehouse").await;
        stock(&db, "p-1", "loc-b", 5).await;

        db.sales()
            .record_transaction(&new_transaction(vec![line("p-1", 1, 500)], Some("cash")))
            .await
            .unwrap();

        let mut at_b = new_transaction(vec![line("p-1", 1, 500)], Some("cash"));
        at_b.location_id = "loc-b".to_string();
        db.sales().record_transaction(&at_b).await.unwrap();

        let today = Utc::now().date_naive();
        assert_eq!(db.sales().transactions_for_day(today, None).await.unwrap().len(), 2);
        assert_eq!(
            db.sales()
                .transactions_for_day(today, Some("loc-a"))
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(db
            .sales()
            .transactions_for_day(today + chrono::Days::new(1), None)
            .await
            .unwrap()
            .is_empty());
    }
}
