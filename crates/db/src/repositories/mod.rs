use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use panaderia_core::domain::order::{OrderId, OrderStatus};
use panaderia_core::domain::product::{Product, ProductId};
use panaderia_core::domain::user::{User, UserId};
use panaderia_core::errors::ApplicationError;

pub mod order;
pub mod product;
pub mod user;

pub use order::{AdminOrderSummary, OrderLineDetail, OrderSummary, SqlOrderRepository};
pub use product::{NewProduct, SqlProductRepository, StockDecrement};
pub use user::{NewUser, ProfileUpdate, SqlUserRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

/// Catalog capabilities the checkout path and storefront depend on.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, RepositoryError>;
    async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError>;
}

/// Order read paths plus the administrative status mutation.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<OrderSummary>, RepositoryError>;
    async fn line_items(&self, order_id: OrderId)
        -> Result<Vec<OrderLineDetail>, RepositoryError>;
    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<AdminOrderSummary>, RepositoryError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<UserId, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, RepositoryError>;
    async fn email_in_use(
        &self,
        email: &str,
        exclude: Option<UserId>,
    ) -> Result<bool, RepositoryError>;
    async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<bool, RepositoryError>;
    async fn record_login(&self, id: UserId) -> Result<(), RepositoryError>;
}

/// Timestamps are stored as RFC 3339 strings (TEXT columns).
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {error}")))
}
