use rust_decimal::Decimal;

use super::errors::OrderError;
use crate::models::{NewOrder, OrderInput};

// ============================================================================
// Order Value Objects - Field rules checked before any remote or store call
// ============================================================================

pub const PRODUCT_NAME_MIN_CHARS: usize = 2;
pub const PRODUCT_NAME_MAX_CHARS: usize = 100;
pub const PRICE_MAX_INTEGER_DIGITS: u32 = 10;
pub const PRICE_MAX_FRACTION_DIGITS: u32 = 2;

pub fn validate_user_id(user_id: Option<i64>) -> Result<i64, OrderError> {
    user_id.ok_or_else(|| OrderError::Validation("User ID is required".to_string()))
}

pub fn validate_product_name(name: Option<&str>) -> Result<String, OrderError> {
    let name = match name {
        Some(name) if !name.trim().is_empty() => name,
        _ => return Err(OrderError::Validation("Product name is required".to_string())),
    };

    let len = name.chars().count();
    if !(PRODUCT_NAME_MIN_CHARS..=PRODUCT_NAME_MAX_CHARS).contains(&len) {
        return Err(OrderError::Validation(format!(
            "Product name must be between {} and {} characters",
            PRODUCT_NAME_MIN_CHARS, PRODUCT_NAME_MAX_CHARS
        )));
    }

    Ok(name.to_string())
}

pub fn validate_price(price: Option<Decimal>) -> Result<Decimal, OrderError> {
    let price = price.ok_or_else(|| OrderError::Validation("Price is required".to_string()))?;

    if price <= Decimal::ZERO {
        return Err(OrderError::Validation("Price must be greater than zero".to_string()));
    }

    let integer_limit = Decimal::from(10_i64.pow(PRICE_MAX_INTEGER_DIGITS));
    if price.trunc() >= integer_limit || price.normalize().scale() > PRICE_MAX_FRACTION_DIGITS {
        return Err(OrderError::Validation(format!(
            "Price must have up to {} digits and {} decimals",
            PRICE_MAX_INTEGER_DIGITS, PRICE_MAX_FRACTION_DIGITS
        )));
    }

    Ok(price)
}

impl OrderInput {
    /// Field-by-field checks; the first violation wins
    pub fn validate(&self) -> Result<NewOrder, OrderError> {
        Ok(NewOrder {
            user_id: validate_user_id(self.user_id)?,
            product_name: validate_product_name(self.product_name.as_deref())?,
            price: validate_price(self.price)?,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
