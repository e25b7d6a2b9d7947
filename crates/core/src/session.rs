//! Session-boundary persistence for the cart.
//!
//! The cart is owned by one client session and survives page loads only as
//! a serialized blob in session-scoped storage. That boundary is explicit
//! here: a [`SessionStore`] holds opaque strings, and the cart crosses it
//! through `save_cart`/`load_cart`. A load always revalidates invariants via
//! [`Cart::from_items`], so a tampered or stale blob cannot smuggle in a
//! zero-quantity or duplicated entry.

use std::collections::HashMap;

use thiserror::Error;

use crate::cart::Cart;
use crate::errors::DomainError;

pub const CART_KEY: &str = "cart";

pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cart serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("stored cart is not valid JSON: {0}")]
    Deserialize(#[source] serde_json::Error),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub fn save_cart(store: &mut dyn SessionStore, cart: &Cart) -> Result<(), SessionError> {
    let payload = serde_json::to_string(cart).map_err(SessionError::Serialize)?;
    store.put(CART_KEY, payload);
    Ok(())
}

/// Restore the session's cart. A missing entry is an empty cart, not an
/// error; a present entry must deserialize and satisfy cart invariants.
pub fn load_cart(store: &dyn SessionStore) -> Result<Cart, SessionError> {
    let Some(payload) = store.get(CART_KEY) else {
        return Ok(Cart::new());
    };

    let stored: Cart = serde_json::from_str(&payload).map_err(SessionError::Deserialize)?;
    Ok(Cart::from_items(stored.items().to_vec())?)
}

pub fn discard_cart(store: &mut dyn SessionStore) {
    store.remove(CART_KEY);
}
