//! # Validation Module
//!
//! Input validation for checkout requests and catalog-admin writes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE                                                  │
//! │  ├── Checkout request shape (items, quantities, email)                 │
//! │  └── Discount / gift card definitions before they are stored           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Services (orderly-db)                                        │
//! │  └── State checks inside the transaction (stock, balance, status)      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), CHECK (balance_cents >= 0)                    │
//! │  └── UNIQUE order_number, gift card code                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use orderly_core::validation::{validate_percent, validate_quantity};
//!
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_percent(101).is_err());
//! ```

use crate::discount::{Discount, DiscountMethod, DiscountType};
use crate::error::ValidationError;
use crate::types::{CheckoutRequest, ItemRequest};
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_ITEMS, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty, at most 50 characters
/// - Letters, numbers, hyphens, underscores only
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product or variant title.
pub fn validate_title(title: &str) -> ValidationResult<()> {
    let title = title.trim();

    if title.is_empty() {
        return Err(required("title"));
    }

    if title.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "title".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Minimal shape check; deliverability is the mailer's problem.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(required("email"));
    }

    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 254,
        });
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        }),
    }
}

/// Validates a discount or gift card code.
///
/// ## Example
/// ```rust
/// use orderly_core::validation::validate_code;
///
/// assert!(validate_code("code", "SUMMER-10").is_ok());
/// assert!(validate_code("code", "has space").is_err());
/// ```
pub fn validate_code(field: &str, code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(required(field));
    }

    if code.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// ISO 3166-1 alpha-2.
pub fn validate_country(country: &str) -> ValidationResult<()> {
    if country.len() == 2 && country.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field: "country".to_string(),
            reason: "must be a two-letter country code".to_string(),
        })
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Percent values are whole numbers in `[1, 100]`.
pub fn validate_percent(percent: i64) -> ValidationResult<()> {
    if !(1..=100).contains(&percent) {
        return Err(ValidationError::OutOfRange {
            field: "percent".to_string(),
            min: 1,
            max: 100,
        });
    }

    Ok(())
}

/// Validates a VAT rate in basis points (0% to 100%).
pub fn validate_vat_rate_bps(bps: i64) -> ValidationResult<()> {
    if !(0..=10000).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: "vat_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

pub fn validate_gift_card_value(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "initial_value".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Checkout Request
// =============================================================================

/// Validates line count and each requested line.
pub fn validate_items(items: &[ItemRequest]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(required("items"));
    }

    if items.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    for item in items {
        if item.item_id.trim().is_empty() {
            return Err(required("item_id"));
        }
        validate_quantity(item.quantity)?;
    }

    Ok(())
}

/// Shape checks run before the checkout transaction opens.
pub fn validate_checkout(request: &CheckoutRequest) -> ValidationResult<()> {
    validate_email(&request.customer.email)?;
    validate_items(&request.items)?;
    validate_country(&request.shipping_address.country)?;
    if let Some(billing) = &request.billing_address {
        validate_country(&billing.country)?;
    }
    if let Some(code) = &request.discount_code {
        validate_code("discount_code", code)?;
    }
    if let Some(code) = &request.gift_card_code {
        validate_code("gift_card_code", code)?;
    }
    Ok(())
}

// =============================================================================
// Discount Definitions
// =============================================================================

/// Catalog-admin rules a discount must satisfy before it is stored.
///
/// ## Rules per type
/// | Type                            | Requires                        |
/// |---------------------------------|---------------------------------|
/// | `OrderAmount`, `ProductAmount`  | `amount_cents > 0`              |
/// | `OrderPercent`, `ProductPercent`| `percent` in `[1, 100]`         |
/// | `BuyXGetY`                      | `buy_x >= 1`, `get_y >= 1`      |
/// | `FreeShipping`                  | nothing                         |
///
/// `Code` discounts need a well-formed code; the window must not be inverted.
pub fn validate_discount(discount: &Discount) -> ValidationResult<()> {
    if discount.method == DiscountMethod::Code {
        match &discount.code {
            Some(code) => validate_code("code", code)?,
            None => return Err(required("code")),
        }
    }

    match discount.discount_type {
        DiscountType::OrderAmount | DiscountType::ProductAmount => {
            match discount.amount_cents {
                Some(cents) if cents > MAX_PRICE_CENTS => {
                    return Err(ValidationError::OutOfRange {
                        field: "amount".to_string(),
                        min: 1,
                        max: MAX_PRICE_CENTS,
                    })
                }
                Some(cents) if cents > 0 => {}
                Some(_) => {
                    return Err(ValidationError::MustBePositive {
                        field: "amount".to_string(),
                    })
                }
                None => return Err(required("amount")),
            }
        }
        DiscountType::OrderPercent | DiscountType::ProductPercent => {
            validate_percent(discount.percent.ok_or_else(|| required("percent"))?)?;
        }
        DiscountType::BuyXGetY => {
            let buy_x = discount.buy_x_quantity.ok_or_else(|| required("buy_x_quantity"))?;
            let get_y = discount.get_y_quantity.ok_or_else(|| required("get_y_quantity"))?;
            for (field, value) in [("buy_x_quantity", buy_x), ("get_y_quantity", get_y)] {
                if value < 1 {
                    return Err(ValidationError::MustBePositive {
                        field: field.to_string(),
                    });
                }
            }
        }
        DiscountType::FreeShipping => {}
    }

    if let Some(min) = discount.min_purchase_amount_cents {
        if min < 0 {
            return Err(ValidationError::OutOfRange {
                field: "min_purchase_amount".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
    }

    if let (Some(starts), Some(ends)) = (discount.starts_at, discount.ends_at) {
        if ends < starts {
            return Err(ValidationError::InvalidFormat {
                field: "ends_at".to_string(),
                reason: "must not be before starts_at".to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, CustomerInput};
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;

    fn discount(discount_type: DiscountType) -> Discount {
        Discount {
            id: "d-1".into(),
            title: "Promo".into(),
            code: None,
            method: DiscountMethod::Automatic,
            discount_type,
            amount_cents: None,
            percent: None,
            buy_x_quantity: None,
            get_y_quantity: None,
            min_purchase_amount_cents: None,
            applies_to_all_products: true,
            product_ids: BTreeSet::new(),
            collection_ids: BTreeSet::new(),
            starts_at: None,
            ends_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("TEE-RED-M").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@localhost").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents_is_capped() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_price_cents(10_000_000_000_000_000).is_err());

        // the largest legal checkout still fits in i64
        let worst = MAX_PRICE_CENTS as i128 * MAX_ITEM_QUANTITY as i128 * MAX_LINE_ITEMS as i128;
        assert!(worst < i64::MAX as i128);
    }

    #[test]
    fn test_validate_percent_range() {
        assert!(validate_percent(1).is_ok());
        assert!(validate_percent(100).is_ok());
        assert!(validate_percent(0).is_err());
        assert!(validate_percent(101).is_err());
    }

    #[test]
    fn test_validate_items() {
        let item = |id: &str, quantity| ItemRequest {
            item_id: id.into(),
            quantity,
        };
        assert!(validate_items(&[item("v-1", 2)]).is_ok());
        assert!(validate_items(&[]).is_err());
        assert!(validate_items(&[item("", 1)]).is_err());
        assert!(validate_items(&[item("v-1", 0)]).is_err());

        let too_many: Vec<_> = (0..=MAX_LINE_ITEMS).map(|i| item(&format!("v-{}", i), 1)).collect();
        assert!(validate_items(&too_many).is_err());
    }

    #[test]
    fn test_validate_checkout() {
        let request = CheckoutRequest {
            customer: CustomerInput {
                email: "ada@example.com".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                ..Default::default()
            },
            items: vec![ItemRequest {
                item_id: "v-1".into(),
                quantity: 1,
            }],
            shipping_address: Address {
                country: "ZA".into(),
                ..Default::default()
            },
            billing_address: None,
            discount_code: Some("SAVE10".into()),
            gift_card_code: None,
        };
        assert!(validate_checkout(&request).is_ok());

        let bad_country = CheckoutRequest {
            shipping_address: Address {
                country: "South Africa".into(),
                ..Default::default()
            },
            ..request.clone()
        };
        assert!(validate_checkout(&bad_country).is_err());
    }

    #[test]
    fn test_validate_discount_rules() {
        let mut pct = discount(DiscountType::OrderPercent);
        assert!(validate_discount(&pct).is_err());
        pct.percent = Some(150);
        assert!(validate_discount(&pct).is_err());
        pct.percent = Some(15);
        assert!(validate_discount(&pct).is_ok());

        let mut amount = discount(DiscountType::ProductAmount);
        amount.amount_cents = Some(0);
        assert!(validate_discount(&amount).is_err());
        amount.amount_cents = Some(250);
        assert!(validate_discount(&amount).is_ok());
        amount.amount_cents = Some(MAX_PRICE_CENTS + 1);
        assert!(validate_discount(&amount).is_err());

        let mut bxgy = discount(DiscountType::BuyXGetY);
        bxgy.buy_x_quantity = Some(0);
        bxgy.get_y_quantity = Some(1);
        assert!(validate_discount(&bxgy).is_err());
        bxgy.buy_x_quantity = Some(2);
        assert!(validate_discount(&bxgy).is_ok());

        assert!(validate_discount(&discount(DiscountType::FreeShipping)).is_ok());
    }

    #[test]
    fn test_validate_discount_code_and_window() {
        let mut coded = discount(DiscountType::FreeShipping);
        coded.method = DiscountMethod::Code;
        assert!(validate_discount(&coded).is_err());
        coded.code = Some("SHIPFREE".into());
        assert!(validate_discount(&coded).is_ok());

        let now = Utc::now();
        coded.starts_at = Some(now);
        coded.ends_at = Some(now - Duration::days(1));
        assert!(validate_discount(&coded).is_err());
    }
}
