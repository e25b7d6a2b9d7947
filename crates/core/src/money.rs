//! Conversions between domain money (`Decimal`) and the f64 values that
//! cross the SQLite and JSON boundaries. Amounts are rounded to two decimal
//! places on the way in so float noise never reaches the domain.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub fn from_f64(value: f64) -> Decimal {
    Decimal::from_f64_retain(value).unwrap_or_default().round_dp(2)
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}
