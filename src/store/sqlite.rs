use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::models::{NotificationDestination, TrackedProduct};
use crate::store::{PriceStateUpdate, ProductStore};
use crate::{AppError, Result};

/// SQLite-backed store. Prices are stored as decimal strings so no precision
/// is lost in the round trip.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id            TEXT PRIMARY KEY,
                title         TEXT NOT NULL,
                url           TEXT NOT NULL,
                base_price    TEXT NOT NULL,
                current_price TEXT NOT NULL,
                on_sale       INTEGER NOT NULL,
                last_checked  TEXT,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS destinations (
                chat_id   INTEGER NOT NULL,
                thread_id INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_product(row: &SqliteRow) -> Result<TrackedProduct> {
    let base_price: String = row.try_get("base_price")?;
    let current_price: String = row.try_get("current_price")?;

    Ok(TrackedProduct {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        base_price: parse_stored_price(&base_price)?,
        current_price: parse_stored_price(&current_price)?,
        on_sale: row.try_get("on_sale")?,
        last_checked: row.try_get::<Option<DateTime<Utc>>, _>("last_checked")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parse_stored_price(text: &str) -> Result<Decimal> {
    Decimal::from_str(text)
        .map_err(|e| AppError::Internal(format!("invalid stored price {text:?}: {e}")))
}

fn row_to_destination(row: &SqliteRow) -> Result<NotificationDestination> {
    let chat_id: i64 = row.try_get("chat_id")?;
    let thread_id: Option<i64> = row.try_get("thread_id")?;
    Ok(match thread_id {
        Some(thread_id) => NotificationDestination::Threaded { chat_id, thread_id },
        None => NotificationDestination::Flat { chat_id },
    })
}

#[async_trait]
impl ProductStore for SqliteStore {
    async fn load_product(&self, id: &str) -> Result<Option<TrackedProduct>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<TrackedProduct>> {
        let rows = sqlx::query("SELECT * FROM products ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn insert_product(&self, product: &TrackedProduct) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, title, url, base_price, current_price, on_sale,
                 last_checked, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.title)
        .bind(&product.url)
        .bind(product.base_price.to_string())
        .bind(product.current_price.to_string())
        .bind(product.on_sale)
        .bind(product.last_checked)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_price_state(&self, id: &str, state: &PriceStateUpdate) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET base_price = ?, current_price = ?, on_sale = ?,
                last_checked = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(state.base_price.to_string())
        .bind(state.current_price.to_string())
        .bind(state.on_sale)
        .bind(state.last_checked)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                resource: format!("product {id}"),
            });
        }
        Ok(())
    }

    async fn delete_product(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_destinations(&self) -> Result<Vec<NotificationDestination>> {
        let rows = sqlx::query("SELECT chat_id, thread_id FROM destinations ORDER BY chat_id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_destination).collect()
    }

    async fn add_destination(&self, destination: &NotificationDestination) -> Result<()> {
        // `IS` instead of `=` so duplicate flat destinations (NULL thread_id)
        // are caught too.
        sqlx::query(
            r#"
            INSERT INTO destinations (chat_id, thread_id)
            SELECT ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM destinations WHERE chat_id = ? AND thread_id IS ?
            )
            "#,
        )
        .bind(destination.chat_id())
        .bind(destination.thread_id())
        .bind(destination.chat_id())
        .bind(destination.thread_id())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_destination(&self, destination: &NotificationDestination) -> Result<bool> {
        let result = sqlx::query("DELETE FROM destinations WHERE chat_id = ? AND thread_id IS ?")
            .bind(destination.chat_id())
            .bind(destination.thread_id())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewProduct, PriceObservation};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: 5,
        })
        .await
        .unwrap()
    }

    fn sample_product() -> TrackedProduct {
        TrackedProduct::new(NewProduct {
            title: "Example Game".to_string(),
            url: "https://store.example/app/10".to_string(),
            observation: PriceObservation {
                base_price: dec("1999.00"),
                discount_price: Some(dec("999.00")),
            },
        })
    }

    #[tokio::test]
    async fn test_product_roundtrip() {
        let store = memory_store().await;
        let product = sample_product();

        store.insert_product(&product).await.unwrap();
        let loaded = store.load_product(&product.id).await.unwrap().unwrap();

        assert_eq!(loaded.id, product.id);
        assert_eq!(loaded.title, product.title);
        assert_eq!(loaded.base_price, dec("1999.00"));
        assert_eq!(loaded.current_price, dec("999.00"));
        assert!(loaded.on_sale);
        assert!(loaded.last_checked.is_some());
    }

    #[tokio::test]
    async fn test_save_price_state_updates_fields() {
        let store = memory_store().await;
        let product = sample_product();
        store.insert_product(&product).await.unwrap();

        let state = PriceStateUpdate {
            base_price: dec("1999.00"),
            current_price: dec("1999.00"),
            on_sale: false,
            last_checked: Utc::now(),
        };
        store.save_price_state(&product.id, &state).await.unwrap();

        let loaded = store.load_product(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_price, dec("1999.00"));
        assert!(!loaded.on_sale);
    }

    #[tokio::test]
    async fn test_save_price_state_missing_product() {
        let store = memory_store().await;
        let state = PriceStateUpdate {
            base_price: dec("1"),
            current_price: dec("1"),
            on_sale: false,
            last_checked: Utc::now(),
        };

        let result = store.save_price_state("missing", &state).await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_product() {
        let store = memory_store().await;
        let product = sample_product();
        store.insert_product(&product).await.unwrap();

        assert!(store.delete_product(&product.id).await.unwrap());
        assert!(!store.delete_product(&product.id).await.unwrap());
        assert!(store.load_product(&product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_destinations_dedup_and_variants() {
        let store = memory_store().await;
        let flat = NotificationDestination::Flat { chat_id: -100 };
        let threaded = NotificationDestination::Threaded {
            chat_id: -100,
            thread_id: 7,
        };

        store.add_destination(&flat).await.unwrap();
        store.add_destination(&flat).await.unwrap();
        store.add_destination(&threaded).await.unwrap();

        let all = store.list_destinations().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.contains(&flat));
        assert!(all.contains(&threaded));

        assert!(store.remove_destination(&flat).await.unwrap());
        let all = store.list_destinations().await.unwrap();
        assert_eq!(all, vec![threaded]);
    }

    #[tokio::test]
    async fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}/dropwatch.db", dir.path().display()),
            max_connections: 1,
            acquire_timeout: 5,
        };

        let store = SqliteStore::connect(&config).await.unwrap();
        let product = sample_product();
        store.insert_product(&product).await.unwrap();
        drop(store);

        // Reconnect and verify the data survived
        let store = SqliteStore::connect(&config).await.unwrap();
        let loaded = store.load_product(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Example Game");
    }
}
