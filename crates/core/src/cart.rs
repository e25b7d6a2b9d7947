//! Transient per-session shopping cart.
//!
//! A cart lives for one client session: it is mutated in memory, serialized
//! to session storage between page loads, and either resolves into a durable
//! order at checkout or is discarded. It never touches durable storage
//! itself.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::errors::DomainError;

/// Flat shipping fee in hundredths of the currency unit, applied to any
/// non-empty cart.
pub const SHIPPING_FEE_CENTS: i64 = 5000;

pub fn shipping_fee() -> Decimal {
    Decimal::new(SHIPPING_FEE_CENTS, 2)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub item_count: u32,
}

/// Ordered list of cart items, unique by product id.
///
/// Invariant: every item has `quantity >= 1`; a quantity change that would
/// reach zero removes the item instead.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a cart from untrusted items (session storage, wire payloads).
    /// Rejects non-positive quantities and merges duplicate product ids into
    /// a single entry, preserving first-seen order.
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Result<Self, DomainError> {
        let mut cart = Cart::new();
        for item in items {
            if item.quantity == 0 {
                return Err(DomainError::InvalidQuantity(0));
            }
            match cart.position_of(item.product_id) {
                Some(index) => cart.items[index].quantity += item.quantity,
                None => cart.items.push(item),
            }
        }
        Ok(cart)
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    fn position_of(&self, product_id: ProductId) -> Option<usize> {
        self.items.iter().position(|item| item.product_id == product_id)
    }

    /// Add one unit of a product. An existing entry is incremented; a new
    /// product is appended with quantity 1. Stock is not consulted here;
    /// availability is enforced at checkout, not at add time.
    pub fn add(&mut self, product_id: ProductId, name: &str, unit_price: Decimal) {
        match self.position_of(product_id) {
            Some(index) => self.items[index].quantity += 1,
            None => self.items.push(CartItem {
                product_id,
                name: name.to_string(),
                unit_price,
                quantity: 1,
            }),
        }
    }

    /// Adjust the quantity at `index` by `delta`. A resulting quantity of
    /// zero or less removes the item.
    pub fn change_quantity(&mut self, index: usize, delta: i64) -> Result<(), DomainError> {
        let len = self.items.len();
        let item =
            self.items.get_mut(index).ok_or(DomainError::InvalidIndex { index, len })?;

        let quantity = i64::from(item.quantity) + delta;
        if quantity <= 0 {
            self.items.remove(index);
        } else {
            item.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<CartItem, DomainError> {
        if index >= self.items.len() {
            return Err(DomainError::InvalidIndex { index, len: self.items.len() });
        }
        Ok(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Derived totals: shipping applies only to non-empty carts.
    pub fn totals(&self) -> CartTotals {
        let subtotal: Decimal = self.items.iter().map(CartItem::line_total).sum();
        let shipping = if subtotal > Decimal::ZERO { shipping_fee() } else { Decimal::ZERO };
        let item_count = self.items.iter().map(|item| item.quantity).sum();

        CartTotals { subtotal, shipping, total: subtotal + shipping, item_count }
    }
}
