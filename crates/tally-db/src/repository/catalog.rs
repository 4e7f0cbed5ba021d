//! # Catalog
//!
//! Products and locations. Ledger entries reference catalog rows by id
//! only; deactivating a product or location is a soft delete that leaves
//! history intact.
//!
//! Also home to the two replenishment queries the back office runs against
//! the position cache: low stock and expiring stock.

use chrono::{Days, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{info, instrument};
use uuid::Uuid;

use tally_core::validation::{validate_name, validate_sku};
use tally_core::{Location, NewLocation, NewProduct, Product};

use crate::error::{DbError, DbResult};

/// Repository for the product/location catalog.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// Creates a product with a fresh UUID.
    ///
    /// ## Errors
    /// - `DbError::Domain(Validation)` - bad SKU or name
    /// - `DbError::UniqueViolation` - SKU already exists
    #[instrument(skip(self, new), fields(sku = %new.sku))]
    pub async fn create_product(&self, new: &NewProduct) -> DbResult<Product> {
        validate_sku(&new.sku).map_err(tally_core::CoreError::from)?;
        validate_name(&new.name).map_err(tally_core::CoreError::from)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: new.sku.clone(),
            name: new.name.clone(),
            cost_cents: new.cost_cents,
            price_cents: new.price_cents,
            reorder_level: new.reorder_level,
            min_stock: new.min_stock,
            max_stock: new.max_stock,
            expiry_date: new.expiry_date,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products
                (id, sku, name, cost_cents, price_cents, reorder_level,
                 min_stock, max_stock, expiry_date, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.reorder_level)
        .bind(product.min_stock)
        .bind(product.max_stock)
        .bind(product.expiry_date)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn get_product_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn list_active_products(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_active = 1 ORDER BY sku ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Soft-deletes a product. Ledger history keeps referencing it.
    pub async fn deactivate_product(&self, id: &str) -> DbResult<()> {
        let touched = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if touched == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Locations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create_location(&self, new: &NewLocation) -> DbResult<Location> {
        validate_name(&new.name).map_err(tally_core::CoreError::from)?;

        let now = Utc::now();
        let location = Location {
            id: Uuid::new_v4().to_string(),
            name: new.name.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO locations (id, name, is_active, created_at, updated_at)
            VALUES (?1, ?2, 1, ?3, ?3)
            "#,
        )
        .bind(&location.id)
        .bind(&location.name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(location_id = %location.id, "Location created");
        Ok(location)
    }

    pub async fn get_location(&self, id: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(location)
    }

    pub async fn list_active_locations(&self) -> DbResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(
            "SELECT * FROM locations WHERE is_active = 1 ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(locations)
    }

    pub async fn deactivate_location(&self, id: &str) -> DbResult<()> {
        let touched = sqlx::query(
            "UPDATE locations SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if touched == 0 {
            return Err(DbError::not_found("Location", id));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Replenishment queries
    // -------------------------------------------------------------------------

    /// Active products whose on-hand total across all locations has fallen
    /// to or below their reorder level. Products with no movements count
    /// as zero on hand.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT p.* FROM products p
            LEFT JOIN (
                SELECT product_id, SUM(on_hand) AS total_on_hand
                FROM stock_positions
                GROUP BY product_id
            ) s ON s.product_id = p.id
            WHERE p.is_active = 1
              AND COALESCE(s.total_on_hand, 0) <= p.reorder_level
            ORDER BY p.sku ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Active perishables expiring within `days_ahead` days (already-expired
    /// stock included; it needs action most urgently).
    pub async fn expiring(&self, days_ahead: u64) -> DbResult<Vec<Product>> {
        let cutoff: NaiveDate = Utc::now().date_naive() + Days::new(days_ahead);

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_active = 1
              AND expiry_date IS NOT NULL
              AND expiry_date <= ?1
            ORDER BY expiry_date ASC, sku ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{stock, test_db};
    use tally_core::CoreError;

    fn new_product(sku: &str, reorder_level: i64) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            cost_cents: 250,
            price_cents: 500,
            reorder_level,
            min_stock: 0,
            max_stock: 100,
            expiry_date: None,
        }
    }

    #[tokio::test]
    async fn test_product_crud_roundtrip() {
        let db = test_db().await;

        let created = db
            .catalog()
            .create_product(&new_product("MILK-1L", 10))
            .await
            .unwrap();

        let by_id = db.catalog().get_product(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "MILK-1L");

        let by_sku = db
            .catalog()
            .get_product_by_sku("MILK-1L")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_sku.id, created.id);

        assert_eq!(db.catalog().list_active_products().await.unwrap().len(), 1);

        db.catalog().deactivate_product(&created.id).await.unwrap();
        assert!(db.catalog().list_active_products().await.unwrap().is_empty());
        // Still fetchable by id after soft delete.
        assert!(db.catalog().get_product(&created.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = test_db().await;
        db.catalog()
            .create_product(&new_product("MILK-1L", 10))
            .await
            .unwrap();

        let err = db
            .catalog()
            .create_product(&new_product("MILK-1L", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_bad_sku_rejected() {
        let db = test_db().await;
        let mut bad = new_product("has spaces", 10);
        bad.sku = "has spaces".to_string();
        let err = db.catalog().create_product(&bad).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_location_crud() {
        let db = test_db().await;

        let loc = db
            .catalog()
            .create_location(&NewLocation {
                name: "Main Store".to_string(),
            })
            .await
            .unwrap();

        assert!(db.catalog().get_location(&loc.id).await.unwrap().is_some());
        assert_eq!(db.catalog().list_active_locations().await.unwrap().len(), 1);

        db.catalog().deactivate_location(&loc.id).await.unwrap();
        assert!(db.catalog().list_active_locations().await.unwrap().is_empty());

        let err = db.catalog().deactivate_location("ghost").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_low_stock_uses_total_across_locations() {
        let db = test_db().await;
        crate::testutil::seed_location(&db, "loc-a", "Main Store").await;
        crate::testutil::seed_location(&db, "loc-b", "Warehouse").await;

        let low = db.catalog().create_product(&new_product("LOW", 10)).await.unwrap();
        let ok = db.catalog().create_product(&new_product("OK", 10)).await.unwrap();

        // 4 + 3 = 7 <= 10: low. 8 + 8 = 16 > 10: fine.
        stock(&db, &low.id, "loc-a", 4).await;
        stock(&db, &low.id, "loc-b", 3).await;
        stock(&db, &ok.id, "loc-a", 8).await;
        stock(&db, &ok.id, "loc-b", 8).await;

        let flagged = db.catalog().low_stock().await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].sku, "LOW");
    }

    #[tokio::test]
    async fn test_low_stock_includes_never_moved_products() {
        let db = test_db().await;
        db.catalog().create_product(&new_product("NEW", 5)).await.unwrap();

        let flagged = db.catalog().low_stock().await.unwrap();
        assert_eq!(flagged.len(), 1);
    }

    #[tokio::test]
    async fn test_expiring_window() {
        let db = test_db().await;
        let today = Utc::now().date_naive();

        let mut soon = new_product("SOON", 0);
        soon.expiry_date = Some(today + Days::new(3));
        let mut later = new_product("LATER", 0);
        later.expiry_date = Some(today + Days::new(30));
        let fresh = new_product("FRESH", 0); // no expiry

        db.catalog().create_product(&soon).await.unwrap();
        db.catalog().create_product(&later).await.unwrap();
        db.catalog().create_product(&fresh).await.unwrap();

        let expiring = db.catalog().expiring(7).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].sku, "SOON");

        assert_eq!(db.catalog().expiring(60).await.unwrap().len(), 2);
    }
}
