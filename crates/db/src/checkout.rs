//! Checkout: the one write path with multi-row consistency requirements.
//!
//! A checkout converts a transient cart into one `orders` row, N
//! `order_line` rows, and N conditional stock decrements. All of it happens
//! inside a single transaction: an error at any step rolls the whole unit
//! back, the caller keeps its cart, and no partial order is ever visible.

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use panaderia_core::cart::Cart;
use panaderia_core::domain::order::OrderId;
use panaderia_core::domain::user::UserId;
use panaderia_core::errors::ApplicationError;
use panaderia_core::money;

use crate::repositories::product::{decrement_stock_in, StockDecrement};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub total: Decimal,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("user {0} not found")]
    UnknownUser(i64),
    #[error("product {0} not found")]
    ProductNotFound(i64),
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock { product_id: i64, requested: u32, available: i64 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<CheckoutError> for ApplicationError {
    fn from(value: CheckoutError) -> Self {
        match value {
            CheckoutError::EmptyCart => {
                ApplicationError::Domain(panaderia_core::errors::DomainError::EmptyCart)
            }
            CheckoutError::UnknownUser(id) => ApplicationError::not_found(format!("user {id}")),
            CheckoutError::ProductNotFound(id) => {
                ApplicationError::not_found(format!("product {id}"))
            }
            CheckoutError::InsufficientStock { product_id, .. } => {
                ApplicationError::InsufficientStock { product_id }
            }
            CheckoutError::Database(error) => ApplicationError::Persistence(error.to_string()),
        }
    }
}

/// Place an order for `user_id` from the given cart.
///
/// The total is computed server-side from the cart (subtotal plus the flat
/// shipping fee); callers must not persist a client-supplied figure. On
/// success the caller is responsible for clearing the client's cart. On
/// failure the cart must NOT be cleared, so the user can retry.
pub async fn place_order(
    pool: &DbPool,
    user_id: UserId,
    cart: &Cart,
) -> Result<PlacedOrder, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let totals = cart.totals();
    let mut tx = pool.begin().await?;

    // The order insert is deliberately the first statement of the
    // transaction: it takes the write lock up front, so concurrent checkouts
    // serialize on busy_timeout instead of failing a read-to-write upgrade.
    // The user_id foreign key doubles as the existence check.
    let created_at = Utc::now().to_rfc3339();
    let inserted = sqlx::query(
        "INSERT INTO orders (user_id, total, status, created_at) VALUES (?, ?, 'pending', ?)",
    )
    .bind(user_id.0)
    .bind(money::to_f64(totals.total))
    .bind(&created_at)
    .execute(&mut *tx)
    .await
    .map_err(|error| classify_order_insert_error(error, user_id))?;
    let order_id = inserted.last_insert_rowid();

    for item in cart.items() {
        match decrement_stock_in(&mut tx, item.product_id.0, item.quantity).await? {
            StockDecrement::Decremented => {}
            StockDecrement::InsufficientStock { available } => {
                warn!(
                    event_name = "checkout.insufficient_stock",
                    user_id = %user_id,
                    product_id = %item.product_id,
                    requested = item.quantity,
                    available,
                    "checkout rejected, not enough stock"
                );
                return Err(CheckoutError::InsufficientStock {
                    product_id: item.product_id.0,
                    requested: item.quantity,
                    available,
                });
            }
            StockDecrement::NotFound => {
                return Err(CheckoutError::ProductNotFound(item.product_id.0));
            }
        }

        sqlx::query(
            "INSERT INTO order_line (order_id, product_id, quantity, unit_price)
             VALUES (?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(item.product_id.0)
        .bind(i64::from(item.quantity))
        .bind(money::to_f64(item.unit_price))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(
        event_name = "checkout.order_placed",
        user_id = %user_id,
        order_id,
        total = %totals.total,
        line_count = cart.len(),
        "order placed"
    );

    Ok(PlacedOrder { order_id: OrderId(order_id), total: totals.total })
}

/// The only foreign key on `orders` is `user_id`, so a constraint failure on
/// the insert means the user row does not exist.
fn classify_order_insert_error(error: sqlx::Error, user_id: UserId) -> CheckoutError {
    let is_fk_violation = error
        .as_database_error()
        .is_some_and(|db_error| db_error.message().contains("FOREIGN KEY"));

    if is_fk_violation {
        CheckoutError::UnknownUser(user_id.0)
    } else {
        CheckoutError::Database(error)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use panaderia_core::cart::{Cart, CartItem};
    use panaderia_core::domain::product::ProductId;
    use panaderia_core::domain::user::UserId;

    use super::{place_order, CheckoutError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool(url: &str, max_connections: u32) -> DbPool {
        let pool = connect_with_settings(url, max_connections, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, phone, password_hash, registered_at)
             VALUES (1, 'Rosa', 'Miranda', 'rosa@example.com', '5512345678', 'hash', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("seed user");

        sqlx::query(
            "INSERT INTO products (id, name, description, price, category, stock, image)
             VALUES (1, 'Concha', 'Concha de vainilla', 10.0, 'pan-dulce', 8, NULL),
                    (2, 'Bolillo', 'Bolillo recien horneado', 5.0, 'pan-salado', 4, NULL)",
        )
        .execute(&pool)
        .await
        .expect("seed products");

        pool
    }

    async fn setup() -> DbPool {
        setup_pool("sqlite::memory:", 1).await
    }

    fn item(id: i64, quantity: u32, unit_price: i64) -> CartItem {
        CartItem {
            product_id: ProductId(id),
            name: format!("product-{id}"),
            unit_price: Decimal::new(unit_price * 100, 2),
            quantity,
        }
    }

    async fn stock_of(pool: &DbPool, product_id: i64) -> i64 {
        sqlx::query_scalar("SELECT stock FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_one(pool)
            .await
            .expect("stock")
    }

    async fn order_count(pool: &DbPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(pool).await.expect("count")
    }

    async fn line_count(pool: &DbPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM order_line")
            .fetch_one(pool)
            .await
            .expect("count")
    }

    #[tokio::test]
    async fn checkout_commits_order_lines_and_stock_together() {
        let pool = setup().await;
        let cart = Cart::from_items([item(1, 2, 10), item(2, 1, 5)]).expect("cart");

        let placed = place_order(&pool, UserId(1), &cart).await.expect("place order");

        // 20 + 5 subtotal plus the 50.00 shipping fee.
        assert_eq!(placed.total, Decimal::new(7500, 2));

        let total: f64 = sqlx::query_scalar("SELECT total FROM orders WHERE id = ?")
            .bind(placed.order_id.0)
            .fetch_one(&pool)
            .await
            .expect("order total");
        assert_eq!(total, 75.0);

        let status: String = sqlx::query_scalar("SELECT status FROM orders WHERE id = ?")
            .bind(placed.order_id.0)
            .fetch_one(&pool)
            .await
            .expect("order status");
        assert_eq!(status, "pending");

        let line_sum: f64 = sqlx::query_scalar(
            "SELECT SUM(quantity * unit_price) FROM order_line WHERE order_id = ?",
        )
        .bind(placed.order_id.0)
        .fetch_one(&pool)
        .await
        .expect("line sum");
        assert_eq!(line_sum, 25.0);
        assert_eq!(line_count(&pool).await, 2);

        assert_eq!(stock_of(&pool, 1).await, 6);
        assert_eq!(stock_of(&pool, 2).await, 3);
    }

    #[tokio::test]
    async fn empty_cart_is_rejected_before_any_write() {
        let pool = setup().await;

        let error = place_order(&pool, UserId(1), &Cart::new()).await.expect_err("must fail");

        assert!(matches!(error, CheckoutError::EmptyCart));
        assert_eq!(order_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn unknown_user_is_rejected_without_writes() {
        let pool = setup().await;
        let cart = Cart::from_items([item(1, 1, 10)]).expect("cart");

        let error = place_order(&pool, UserId(42), &cart).await.expect_err("must fail");

        assert!(matches!(error, CheckoutError::UnknownUser(42)));
        assert_eq!(order_count(&pool).await, 0);
        assert_eq!(stock_of(&pool, 1).await, 8);
    }

    #[tokio::test]
    async fn insufficient_stock_rolls_back_the_entire_order() {
        let pool = setup().await;
        // Product 2 has stock 4; asking for 5 must fail after product 1 was
        // already decremented inside the transaction.
        let cart = Cart::from_items([item(1, 2, 10), item(2, 5, 5)]).expect("cart");

        let error = place_order(&pool, UserId(1), &cart).await.expect_err("must fail");

        assert!(matches!(
            error,
            CheckoutError::InsufficientStock { product_id: 2, requested: 5, available: 4 }
        ));
        assert_eq!(order_count(&pool).await, 0);
        assert_eq!(line_count(&pool).await, 0);
        assert_eq!(stock_of(&pool, 1).await, 8);
        assert_eq!(stock_of(&pool, 2).await, 4);
    }

    #[tokio::test]
    async fn failure_on_second_line_leaves_zero_partial_state() {
        let pool = setup().await;
        // Second line references a product that does not exist, simulating a
        // mid-loop write failure.
        let cart = Cart::from_items([item(1, 2, 10), item(99, 1, 5)]).expect("cart");

        let error = place_order(&pool, UserId(1), &cart).await.expect_err("must fail");

        assert!(matches!(error, CheckoutError::ProductNotFound(99)));
        assert_eq!(order_count(&pool).await, 0);
        assert_eq!(line_count(&pool).await, 0);
        assert_eq!(stock_of(&pool, 1).await, 8);
    }

    #[tokio::test]
    async fn concurrent_checkouts_cannot_oversell_the_last_unit() {
        // Concurrency needs two real connections; a file-backed database in
        // WAL mode gives the same busy-wait semantics as production.
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("checkout_race.db").display());
        let pool = setup_pool(&url, 2).await;

        sqlx::query("UPDATE products SET stock = 1 WHERE id = 1")
            .execute(&pool)
            .await
            .expect("set stock");

        let cart = Cart::from_items([item(1, 1, 10)]).expect("cart");

        let first = {
            let pool = pool.clone();
            let cart = cart.clone();
            tokio::spawn(async move { place_order(&pool, UserId(1), &cart).await })
        };
        let second = {
            let pool = pool.clone();
            let cart = cart.clone();
            tokio::spawn(async move { place_order(&pool, UserId(1), &cart).await })
        };

        let outcomes = [first.await.expect("join"), second.await.expect("join")];
        let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        let stock_conflicts = outcomes
            .iter()
            .filter(|outcome| {
                matches!(outcome, Err(CheckoutError::InsufficientStock { product_id: 1, .. }))
            })
            .count();

        assert_eq!(successes, 1, "exactly one checkout should win the last unit");
        assert_eq!(stock_conflicts, 1, "the loser should see InsufficientStock");
        assert_eq!(stock_of(&pool, 1).await, 0);
        assert_eq!(order_count(&pool).await, 1);
    }
}
