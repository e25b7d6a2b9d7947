pub mod checkout;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use checkout::{place_order, CheckoutError, PlacedOrder};
pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoDataset, SeedResult, VerificationResult};
