//! Product catalog endpoints.
//!
//! - `GET    /api/products`                      — full catalog, grouped by category
//! - `GET    /api/products/category/{category}`  — in-stock products of one category
//! - `POST   /api/products`                      — add a product (admin)
//! - `PUT    /api/products/{id}`                 — update a product (admin)
//! - `DELETE /api/products/{id}`                 — remove a product (admin)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use panaderia_core::domain::product::{Product, ProductId};
use panaderia_core::errors::ApplicationError;
use panaderia_core::money;
use panaderia_db::repositories::{CatalogStore, NewProduct, RepositoryError, SqlProductRepository};
use panaderia_db::DbPool;

use crate::respond::{self, ApiError, ApiMessage};

#[derive(Clone)]
pub struct CatalogState {
    db_pool: DbPool,
}

#[derive(Debug, Serialize)]
pub struct ProductDto {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub stock: i64,
    pub image: Option<String>,
}

impl From<Product> for ProductDto {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.0,
            name: product.name,
            description: product.description,
            price: money::to_f64(product.price),
            category: product.category,
            stock: product.stock,
            image: product.image,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub success: bool,
    pub products: Vec<ProductDto>,
}

#[derive(Debug, Deserialize)]
pub struct ProductPayload {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductCreatedResponse {
    pub success: bool,
    pub product_id: i64,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/category/{category}", get(list_by_category))
        .route("/api/products", post(create_product))
        .route("/api/products/{id}", put(update_product))
        .route("/api/products/{id}", delete(delete_product))
        .with_state(CatalogState { db_pool })
}

async fn list_products(
    State(state): State<CatalogState>,
) -> Result<Json<ProductsResponse>, (StatusCode, Json<ApiError>)> {
    let repo = SqlProductRepository::new(state.db_pool.clone());
    let products = repo.list().await.map_err(|error| respond::failure(error.into()))?;

    Ok(Json(ProductsResponse {
        success: true,
        products: products.into_iter().map(ProductDto::from).collect(),
    }))
}

async fn list_by_category(
    Path(category): Path<String>,
    State(state): State<CatalogState>,
) -> Result<Json<ProductsResponse>, (StatusCode, Json<ApiError>)> {
    let repo = SqlProductRepository::new(state.db_pool.clone());
    let products =
        repo.list_by_category(&category).await.map_err(|error| respond::failure(error.into()))?;

    Ok(Json(ProductsResponse {
        success: true,
        products: products.into_iter().map(ProductDto::from).collect(),
    }))
}

async fn create_product(
    State(state): State<CatalogState>,
    Json(body): Json<ProductPayload>,
) -> Result<(StatusCode, Json<ProductCreatedResponse>), (StatusCode, Json<ApiError>)> {
    let new_product = validate_payload(body)?;

    let repo = SqlProductRepository::new(state.db_pool.clone());
    let id = repo.create(new_product).await.map_err(|error| respond::failure(error.into()))?;

    Ok((StatusCode::CREATED, Json(ProductCreatedResponse { success: true, product_id: id.0 })))
}

async fn update_product(
    Path(id): Path<i64>,
    State(state): State<CatalogState>,
    Json(body): Json<ProductPayload>,
) -> Result<Json<ApiMessage>, (StatusCode, Json<ApiError>)> {
    let new_product = validate_payload(body)?;

    let repo = SqlProductRepository::new(state.db_pool.clone());
    let updated = repo
        .update(ProductId(id), new_product)
        .await
        .map_err(|error| respond::failure(error.into()))?;

    if !updated {
        return Err(respond::failure(ApplicationError::not_found(format!("product {id}"))));
    }

    Ok(Json(ApiMessage::new("product updated")))
}

async fn delete_product(
    Path(id): Path<i64>,
    State(state): State<CatalogState>,
) -> Result<Json<ApiMessage>, (StatusCode, Json<ApiError>)> {
    let repo = SqlProductRepository::new(state.db_pool.clone());

    let deleted = match repo.delete(ProductId(id)).await {
        Ok(deleted) => deleted,
        // Line items keep their product reference for order history; a
        // product that has been ordered can only go out of stock, not away.
        Err(RepositoryError::Database(error))
            if error
                .as_database_error()
                .is_some_and(|db_error| db_error.message().contains("FOREIGN KEY")) =>
        {
            return Err((
                StatusCode::CONFLICT,
                Json(ApiError {
                    error: format!("product {id} has order history and cannot be deleted"),
                }),
            ));
        }
        Err(error) => return Err(respond::failure(error.into())),
    };

    if !deleted {
        return Err(respond::failure(ApplicationError::not_found(format!("product {id}"))));
    }

    Ok(Json(ApiMessage::new("product deleted")))
}

fn validate_payload(body: ProductPayload) -> Result<NewProduct, (StatusCode, Json<ApiError>)> {
    if body.name.trim().is_empty()
        || body.description.trim().is_empty()
        || body.category.trim().is_empty()
    {
        return Err(respond::bad_request("name, description and category are required"));
    }
    if body.price <= 0.0 {
        return Err(respond::bad_request("price must be greater than zero"));
    }
    let stock = body.stock.unwrap_or(0);
    if stock < 0 {
        return Err(respond::bad_request("stock must not be negative"));
    }

    Ok(NewProduct {
        name: body.name.trim().to_string(),
        description: body.description.trim().to_string(),
        price: money::from_f64(body.price),
        category: body.category.trim().to_string(),
        stock,
        image: body.image,
    })
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::Json;

    use super::*;
    use panaderia_db::{connect_with_settings, migrations};

    async fn setup() -> State<CatalogState> {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        State(CatalogState { db_pool: pool })
    }

    fn payload(name: &str, category: &str, stock: i64) -> ProductPayload {
        ProductPayload {
            name: name.to_string(),
            description: format!("{name} de la casa"),
            price: 12.5,
            category: category.to_string(),
            stock: Some(stock),
            image: None,
        }
    }

    #[tokio::test]
    async fn created_products_appear_in_the_catalog() {
        let state = setup().await;

        let (status, created) =
            create_product(state.clone(), Json(payload("Concha", "pan-dulce", 10)))
                .await
                .expect("create");
        assert_eq!(status, StatusCode::CREATED);

        let listing = list_products(state).await.expect("list");
        assert_eq!(listing.0.products.len(), 1);
        assert_eq!(listing.0.products[0].id, created.0.product_id);
        assert_eq!(listing.0.products[0].price, 12.5);
    }

    #[tokio::test]
    async fn create_rejects_blank_required_fields() {
        let state = setup().await;

        let (status, body) =
            create_product(state, Json(payload("  ", "pan-dulce", 10)))
                .await
                .expect_err("must fail");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.0.error.contains("required"));
    }

    #[tokio::test]
    async fn category_listing_excludes_sold_out_products() {
        let state = setup().await;
        create_product(state.clone(), Json(payload("Concha", "pan-dulce", 10)))
            .await
            .expect("create");
        create_product(state.clone(), Json(payload("Rosca", "pan-dulce", 0)))
            .await
            .expect("create");

        let listing =
            list_by_category(Path("pan-dulce".to_string()), state).await.expect("list");

        assert_eq!(listing.0.products.len(), 1);
        assert_eq!(listing.0.products[0].name, "Concha");
    }

    #[tokio::test]
    async fn update_of_unknown_product_is_not_found() {
        let state = setup().await;

        let (status, _) = update_product(Path(41), state, Json(payload("Concha", "pan-dulce", 1)))
            .await
            .expect_err("must fail");

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_unordered_products() {
        let state = setup().await;
        let (_, created) = create_product(state.clone(), Json(payload("Concha", "pan-dulce", 1)))
            .await
            .expect("create");

        let response =
            delete_product(Path(created.0.product_id), state.clone()).await.expect("delete");
        assert!(response.0.success);

        let (status, _) =
            delete_product(Path(created.0.product_id), state).await.expect_err("second delete");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_of_ordered_product_is_a_conflict() {
        let state = setup().await;
        let pool = state.0.db_pool.clone();
        let (_, created) = create_product(state.clone(), Json(payload("Concha", "pan-dulce", 5)))
            .await
            .expect("create");

        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, phone, password_hash, registered_at)
             VALUES (1, 'Rosa', 'Miranda', 'rosa@example.com', '5512345678', 'hash', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("seed user");
        sqlx::query(
            "INSERT INTO orders (id, user_id, total, status, created_at)
             VALUES (1, 1, 62.5, 'pending', '2026-02-01T10:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("seed order");
        sqlx::query(
            "INSERT INTO order_line (order_id, product_id, quantity, unit_price) VALUES (1, ?, 1, 12.5)",
        )
        .bind(created.0.product_id)
        .execute(&pool)
        .await
        .expect("seed line");

        let (status, body) =
            delete_product(Path(created.0.product_id), state).await.expect_err("must conflict");

        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.0.error.contains("order history"));
    }
}
