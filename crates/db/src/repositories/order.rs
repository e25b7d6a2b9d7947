use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use panaderia_core::domain::order::{Order, OrderId, OrderLine, OrderStatus};
use panaderia_core::domain::product::ProductId;
use panaderia_core::domain::user::UserId;
use panaderia_core::money;

use super::{parse_timestamp, OrderStore, RepositoryError};
use crate::DbPool;

/// An order annotated with its line-item count, for history listings.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderSummary {
    pub order: Order,
    pub line_count: i64,
}

/// A line item joined with the product display fields the order-detail view
/// renders alongside it.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderLineDetail {
    pub line: OrderLine,
    pub product_name: String,
    pub product_description: String,
    pub product_image: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdminOrderSummary {
    pub order: Order,
    pub line_count: i64,
    pub customer_name: String,
    pub customer_email: String,
}

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, total, status, created_at FROM orders WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }
}

#[async_trait]
impl OrderStore for SqlOrderRepository {
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT o.id, o.user_id, o.total, o.status, o.created_at,
                    COUNT(l.id) AS line_count
             FROM orders o
             LEFT JOIN order_line l ON l.order_id = o.id
             WHERE o.user_id = ?
             GROUP BY o.id
             ORDER BY o.created_at DESC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderSummary {
                    order: order_from_row(row)?,
                    line_count: row.try_get("line_count")?,
                })
            })
            .collect()
    }

    async fn line_items(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderLineDetail>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT l.product_id, l.quantity, l.unit_price,
                    p.name, p.description, p.image
             FROM order_line l
             JOIN products p ON p.id = l.product_id
             WHERE l.order_id = ?
             ORDER BY l.id",
        )
        .bind(order_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let quantity: i64 = row.try_get("quantity")?;
                Ok(OrderLineDetail {
                    line: OrderLine {
                        order_id,
                        product_id: ProductId(row.try_get("product_id")?),
                        quantity: u32::try_from(quantity).map_err(|_| {
                            RepositoryError::Decode(format!("invalid line quantity {quantity}"))
                        })?,
                        unit_price: money::from_f64(row.try_get("unit_price")?),
                    },
                    product_name: row.try_get("name")?,
                    product_description: row.try_get("description")?,
                    product_image: row.try_get("image")?,
                })
            })
            .collect()
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(order_id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<AdminOrderSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT o.id, o.user_id, o.total, o.status, o.created_at,
                    u.first_name || ' ' || u.last_name AS customer_name,
                    u.email AS customer_email,
                    COUNT(l.id) AS line_count
             FROM orders o
             JOIN users u ON u.id = o.user_id
             LEFT JOIN order_line l ON l.order_id = o.id
             GROUP BY o.id
             ORDER BY o.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AdminOrderSummary {
                    order: order_from_row(row)?,
                    line_count: row.try_get("line_count")?,
                    customer_name: row.try_get("customer_name")?,
                    customer_email: row.try_get("customer_email")?,
                })
            })
            .collect()
    }
}

fn order_from_row(row: &SqliteRow) -> Result<Order, RepositoryError> {
    let raw_status: String = row.try_get("status")?;
    let raw_created_at: String = row.try_get("created_at")?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        total: money::from_f64(row.try_get("total")?),
        status: OrderStatus::from_str(&raw_status)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        created_at: parse_timestamp(&raw_created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use panaderia_core::domain::order::{OrderId, OrderStatus};
    use panaderia_core::domain::user::UserId;

    use super::SqlOrderRepository;
    use crate::repositories::OrderStore;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> (DbPool, SqlOrderRepository) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, phone, password_hash, registered_at)
             VALUES (1, 'Rosa', 'Miranda', 'rosa@example.com', '5512345678', 'hash', ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .expect("seed user");

        sqlx::query(
            "INSERT INTO products (id, name, description, price, category, stock, image)
             VALUES (1, 'Concha', 'Concha de vainilla', 12.5, 'pan-dulce', 10, 'concha.jpg'),
                    (2, 'Bolillo', 'Bolillo recien horneado', 5.0, 'pan-salado', 20, NULL)",
        )
        .execute(&pool)
        .await
        .expect("seed products");

        (pool.clone(), SqlOrderRepository::new(pool))
    }

    async fn seed_order(pool: &DbPool, id: i64, age_minutes: i64, lines: &[(i64, i64, f64)]) {
        let created_at = (Utc::now() - Duration::minutes(age_minutes)).to_rfc3339();
        sqlx::query("INSERT INTO orders (id, user_id, total, status, created_at) VALUES (?, 1, 75.0, 'pending', ?)")
            .bind(id)
            .bind(&created_at)
            .execute(pool)
            .await
            .expect("seed order");

        for (product_id, quantity, unit_price) in lines {
            sqlx::query(
                "INSERT INTO order_line (order_id, product_id, quantity, unit_price)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(product_id)
            .bind(quantity)
            .bind(unit_price)
            .execute(pool)
            .await
            .expect("seed line");
        }
    }

    #[tokio::test]
    async fn listing_returns_newest_first_with_line_counts() {
        let (pool, repo) = setup().await;
        seed_order(&pool, 1, 60, &[(1, 2, 12.5)]).await;
        seed_order(&pool, 2, 5, &[(1, 1, 12.5), (2, 3, 5.0)]).await;

        let summaries = repo.list_for_user(UserId(1)).await.expect("list");

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].order.id, OrderId(2));
        assert_eq!(summaries[0].line_count, 2);
        assert_eq!(summaries[1].order.id, OrderId(1));
        assert_eq!(summaries[1].line_count, 1);
        assert_eq!(summaries[0].order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn listing_for_user_without_orders_is_empty() {
        let (_pool, repo) = setup().await;
        assert!(repo.list_for_user(UserId(1)).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn line_items_carry_product_display_fields() {
        let (pool, repo) = setup().await;
        seed_order(&pool, 1, 0, &[(1, 2, 12.5), (2, 1, 5.0)]).await;

        let lines = repo.line_items(OrderId(1)).await.expect("lines");

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_name, "Concha");
        assert_eq!(lines[0].product_description, "Concha de vainilla");
        assert_eq!(lines[0].product_image.as_deref(), Some("concha.jpg"));
        assert_eq!(lines[0].line.order_id, OrderId(1));
        assert_eq!(lines[0].line.quantity, 2);
        assert_eq!(lines[0].line.unit_price, Decimal::new(1250, 2));
        assert_eq!(lines[0].line.line_total(), Decimal::new(2500, 2));
        assert_eq!(lines[1].product_image, None);
    }

    #[tokio::test]
    async fn update_status_reports_whether_a_row_matched() {
        let (pool, repo) = setup().await;
        seed_order(&pool, 1, 0, &[(1, 1, 12.5)]).await;

        assert!(repo.update_status(OrderId(1), OrderStatus::Shipped).await.expect("update"));
        assert!(!repo.update_status(OrderId(99), OrderStatus::Shipped).await.expect("update"));

        let order = repo.find_by_id(OrderId(1)).await.expect("find").expect("present");
        assert_eq!(order.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn admin_listing_joins_customer_identity() {
        let (pool, repo) = setup().await;
        seed_order(&pool, 1, 0, &[(1, 1, 12.5)]).await;

        let summaries = repo.list_all().await.expect("list");

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].customer_name, "Rosa Miranda");
        assert_eq!(summaries[0].customer_email, "rosa@example.com");
        assert_eq!(summaries[0].line_count, 1);
    }
}
