pub mod auth;
pub mod cart;
pub mod config;
pub mod domain;
pub mod errors;
pub mod money;
pub mod session;

pub use cart::{Cart, CartItem, CartTotals, SHIPPING_FEE_CENTS};
pub use domain::order::{Order, OrderId, OrderLine, OrderStatus};
pub use domain::product::{Product, ProductId};
pub use domain::user::{User, UserId, UserRole, UserStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
