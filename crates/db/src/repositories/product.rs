use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use panaderia_core::domain::product::{Product, ProductId};
use panaderia_core::money;

use super::{CatalogStore, RepositoryError};
use crate::DbPool;

/// Outcome of a conditional stock decrement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockDecrement {
    Decremented,
    InsufficientStock { available: i64 },
    NotFound,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub stock: i64,
    pub image: Option<String>,
}

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, product: NewProduct) -> Result<ProductId, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO products (name, description, price, category, stock, image)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(money::to_f64(product.price))
        .bind(&product.category)
        .bind(product.stock)
        .bind(&product.image)
        .execute(&self.pool)
        .await?;

        Ok(ProductId(result.last_insert_rowid()))
    }

    /// Full-row update; returns false when no product matches.
    pub async fn update(
        &self,
        id: ProductId,
        product: NewProduct,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products
             SET name = ?, description = ?, price = ?, category = ?, stock = ?, image = ?
             WHERE id = ?",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(money::to_f64(product.price))
        .bind(&product.category)
        .bind(product.stock)
        .bind(&product.image)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns false when no product matches. A product referenced by order
    /// lines cannot be deleted; the foreign-key violation surfaces as a
    /// `Database` error for the caller to classify.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM products WHERE id = ?").bind(id.0).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CatalogStore for SqlProductRepository {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, description, price, category, stock, image
             FROM products WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, description, price, category, stock, image
             FROM products ORDER BY category, name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(product_from_row).collect()
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, description, price, category, stock, image
             FROM products WHERE category = ? AND stock > 0 ORDER BY name",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(product_from_row).collect()
    }

    async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(decrement_stock_in(&mut conn, id.0, quantity).await?)
    }
}

/// Conditional decrement against an explicit connection, shared between the
/// repository and the checkout transaction. Only succeeds when enough stock
/// remains, so concurrent checkouts can never drive stock below zero.
pub(crate) async fn decrement_stock_in(
    conn: &mut SqliteConnection,
    product_id: i64,
    quantity: u32,
) -> Result<StockDecrement, sqlx::Error> {
    let result =
        sqlx::query("UPDATE products SET stock = stock - ?2 WHERE id = ?1 AND stock >= ?2")
            .bind(product_id)
            .bind(i64::from(quantity))
            .execute(&mut *conn)
            .await?;

    if result.rows_affected() == 1 {
        return Ok(StockDecrement::Decremented);
    }

    let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(match available {
        Some(stock) => StockDecrement::InsufficientStock { available: stock },
        None => StockDecrement::NotFound,
    })
}

fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: ProductId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: money::from_f64(row.try_get("price")?),
        category: row.try_get("category")?,
        stock: row.try_get("stock")?,
        image: row.try_get("image")?,
    })
}
