//! Shared helpers for repository tests.
//!
//! Catalog entities are inserted with fixed ids (the catalog repository
//! assigns UUIDs, which would make assertions noisy).

use tally_core::{MovementKind, NewMovement};

use crate::pool::{Database, DbConfig};

/// Fresh in-memory database with migrations applied.
pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

pub(crate) async fn seed_location(db: &Database, id: &str, name: &str) {
    sqlx::query(
        r#"
        INSERT INTO locations (id, name, is_active, created_at, updated_at)
        VALUES (?1, ?2, 1, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')
        "#,
    )
    .bind(id)
    .bind(name)
    .execute(db.pool())
    .await
    .expect("seed location");
}

pub(crate) async fn seed_product(db: &Database, id: &str, sku: &str, cost_cents: i64) {
    sqlx::query(
        r#"
        INSERT INTO products
            (id, sku, name, cost_cents, price_cents, reorder_level,
             min_stock, max_stock, expiry_date, is_active, created_at, updated_at)
        VALUES (?1, ?2, ?2, ?3, ?3 * 2, 0, 0, 100, NULL, 1,
                '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')
        "#,
    )
    .bind(id)
    .bind(sku)
    .bind(cost_cents)
    .execute(db.pool())
    .await
    .expect("seed product");
}

/// Puts `quantity` units on hand via a purchase ledger append.
pub(crate) async fn stock(db: &Database, product_id: &str, location_id: &str, quantity: i64) {
    db.ledger()
        .append(&NewMovement::new(
            product_id,
            location_id,
            MovementKind::Purchase,
            quantity,
            100,
            "test-seeder",
        ))
        .await
        .expect("seed stock");
}
