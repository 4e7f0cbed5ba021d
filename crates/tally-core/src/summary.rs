//! # Daily Summary Aggregation
//!
//! Pure aggregation math for [`DailySalesSummary`]. The database layer
//! snapshots a day's transactions and hands them here; keeping the math pure
//! makes idempotence trivial to test.
//!
//! ## Determinism
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Same transactions in ──► identical summary out, every time             │
//! │                                                                         │
//! │  • payment breakdown is a BTreeMap (sorted keys, stable JSON)           │
//! │  • top seller ties break by LOWEST product id, never iteration order    │
//! │  • average is integer division (truncated), 0 for an empty day          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{DailySalesSummary, SaleLine, SalesTransaction};

/// Bucket name for transactions without a usable payment method.
pub const UNKNOWN_PAYMENT_METHOD: &str = "unknown";

/// Computes the daily rollup for a set of transactions.
///
/// Callers pass the transactions (with their lines) that fall inside the
/// target day; return transactions are skipped here as well, so a caller
/// that forgets the filter still gets sales-only figures.
///
/// ## Algorithm
/// 1. Count transactions, sum `total_cents`, sum line quantities
/// 2. Average = revenue / count, 0 when the day is empty (not an error)
/// 3. Group revenue by payment method; blank or missing methods bucket
///    under [`UNKNOWN_PAYMENT_METHOD`]
/// 4. Top seller = product with the maximum summed quantity; ties broken
///    deterministically by ascending product id
pub fn summarize(
    date: NaiveDate,
    location_id: Option<&str>,
    transactions: &[(SalesTransaction, Vec<SaleLine>)],
) -> DailySalesSummary {
    let mut total_transactions: i64 = 0;
    let mut total_revenue_cents: i64 = 0;
    let mut total_items_sold: i64 = 0;
    let mut payment_breakdown: BTreeMap<String, i64> = BTreeMap::new();
    let mut quantity_by_product: BTreeMap<String, i64> = BTreeMap::new();

    for (transaction, lines) in transactions {
        if transaction.is_return {
            continue;
        }

        total_transactions += 1;
        total_revenue_cents += transaction.total_cents;

        let method = match transaction.payment_method.as_deref() {
            Some(m) if !m.trim().is_empty() => m.trim().to_string(),
            _ => UNKNOWN_PAYMENT_METHOD.to_string(),
        };
        *payment_breakdown.entry(method).or_insert(0) += transaction.total_cents;

        for line in lines {
            total_items_sold += line.quantity;
            *quantity_by_product.entry(line.product_id.clone()).or_insert(0) += line.quantity;
        }
    }

    let average_transaction_cents = if total_transactions > 0 {
        total_revenue_cents / total_transactions
    } else {
        0
    };

    // BTreeMap iterates in ascending product id order; the strict `>` keeps
    // the first (lowest-id) product on quantity ties.
    let mut top_product_id: Option<String> = None;
    let mut top_quantity = i64::MIN;
    for (product_id, quantity) in &quantity_by_product {
        if *quantity > top_quantity {
            top_quantity = *quantity;
            top_product_id = Some(product_id.clone());
        }
    }

    DailySalesSummary {
        date,
        location_id: location_id.map(str::to_string),
        total_transactions,
        total_revenue_cents,
        total_items_sold,
        average_transaction_cents,
        top_product_id,
        payment_breakdown,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
