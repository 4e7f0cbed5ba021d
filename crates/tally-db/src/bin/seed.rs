//! Demo data seeder.
//!
//! Creates a small grocery catalog across two locations, stocks it,
//! runs a transfer and a few sales, and generates today's summary.
//!
//! ```text
//! cargo run --bin seed -- [database-path]
//! ```
//! Defaults to `./tally.db`.

use tracing::info;
use tracing_subscriber::EnvFilter;

use tally_core::{
    MovementKind, NewLocation, NewMovement, NewProduct, NewSaleLine, NewTransaction,
    TransferRequest,
};
use tally_db::{Database, DbConfig, DbResult};

#[tokio::main]
async fn main() -> DbResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./tally.db".to_string());

    info!(path = %path, "Seeding demo data");
    let db = Database::new(DbConfig::new(&path)).await?;

    let catalog = db.catalog();

    let store = catalog
        .create_location(&NewLocation {
            name: "Main Store".to_string(),
        })
        .await?;
    let warehouse = catalog
        .create_location(&NewLocation {
            name: "Warehouse".to_string(),
        })
        .await?;

    let expiry = chrono::Utc::now().date_naive() + chrono::Days::new(10);
    let products = [
        ("MILK-1L", "Whole Milk 1L", 180, 250, 20, Some(expiry)),
        ("BREAD-WHT", "White Bread Loaf", 120, 200, 15, Some(expiry)),
        ("EGGS-DOZ", "Eggs (Dozen)", 300, 450, 10, None),
        ("RICE-5KG", "Basmati Rice 5kg", 1500, 2200, 5, None),
    ];

    let mut seeded = Vec::new();
    for (sku, name, cost_cents, price_cents, reorder_level, expiry_date) in products {
        let product = catalog
            .create_product(&NewProduct {
                sku: sku.to_string(),
                name: name.to_string(),
                cost_cents,
                price_cents,
                reorder_level,
                min_stock: reorder_level / 2,
                max_stock: reorder_level * 10,
                expiry_date,
            })
            .await?;
        info!(sku, product_id = %product.id, "Product created");
        seeded.push(product);
    }

    // Receive opening stock into the warehouse.
    for product in &seeded {
        db.ledger()
            .append(&NewMovement::new(
                &product.id,
                &warehouse.id,
                MovementKind::Purchase,
                100,
                product.cost_cents,
                "seed",
            ))
            .await?;
    }

    // Push half of the milk to the store floor.
    let transfer = db
        .transfers()
        .transfer(&TransferRequest {
            product_id: seeded[0].id.clone(),
            from_location_id: warehouse.id.clone(),
            to_location_id: store.id.clone(),
            quantity: 50,
            actor_id: "seed".to_string(),
        })
        .await?;
    info!(reference_id = %transfer.reference_id, "Opening transfer done");

    // A couple of sales at the store.
    for (quantity, payment) in [(2, "cash"), (5, "card")] {
        let milk = &seeded[0];
        let line_total = milk.price_cents * quantity;
        db.sales()
            .record_transaction(&NewTransaction {
                location_id: store.id.clone(),
                cashier_id: "seed-cashier".to_string(),
                subtotal_cents: line_total,
                tax_cents: 0,
                discount_cents: 0,
                total_cents: line_total,
                payment_method: Some(payment.to_string()),
                lines: vec![NewSaleLine {
                    product_id: milk.id.clone(),
                    quantity,
                    unit_price_cents: milk.price_cents,
                    discount_cents: 0,
                    line_total_cents: line_total,
                }],
            })
            .await?;
    }

    let today = chrono::Utc::now().date_naive();
    let summary = db.summaries().generate(today, None).await?;
    info!(
        total_transactions = summary.total_transactions,
        total_revenue_cents = summary.total_revenue_cents,
        "Today's summary generated"
    );

    let report = db.positions().reconcile(None, None).await?;
    info!(
        pairs_checked = report.pairs_checked,
        clean = report.matches,
        "Reconciliation"
    );

    db.close().await;
    info!("Seed complete");
    Ok(())
}
