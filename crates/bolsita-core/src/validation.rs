//! # Validation Module
//!
//! Input validation for Mi Bolsita. Every check here runs before any store
//! call, so a rejected input never costs a round trip.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Repository call (bolsita-db)                                 │
//! │  └── THIS MODULE: field rules (names, prices, quantities)              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Transaction body (bolsita-db::txn)                           │
//! │  └── Rules that need stored state (stock, balance)                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Document store                                               │
//! │  └── Version preconditions on commit                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bolsita_core::validation::{validate_name, validate_quantity};
//!
//! validate_name("name", "Café molido").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{EntryDraft, NewDebt, NewProduct, ProductPatch};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_NAME_LEN, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required display string (product name, concept, person).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
///
/// ```rust
/// use bolsita_core::validation::validate_name;
///
/// assert!(validate_name("name", "Arroz 1kg").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
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

/// Validates a unit price or cost.
///
/// ## Rules
/// - May be zero (free items) but never negative
/// - Must not exceed MAX_PRICE_CENTS ($100,000,000.00)
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::negative(field));
    }

    if price.cents() > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Ledger amounts, debt amounts and payments must be strictly positive.
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::must_be_positive(field));
    }
    Ok(())
}

pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::negative("stock"));
    }
    Ok(())
}

/// Discount percentages are basis points in `0..=10000`.
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size (number of distinct lines).
///
/// ## Rules
/// - At least one line
/// - Must not exceed MAX_CART_ITEMS (100)
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::required("cart items"));
    }

    if lines > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Entity Validators
// =============================================================================

pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_name("name", &product.name)?;
    validate_price("costPrice", product.cost_price)?;
    validate_price("salePrice", product.sale_price)?;
    validate_stock(product.stock)
}

pub fn validate_product_patch(patch: &ProductPatch) -> ValidationResult<()> {
    if let Some(name) = &patch.name {
        validate_name("name", name)?;
    }
    if let Some(cost) = patch.cost_price {
        validate_price("costPrice", cost)?;
    }
    if let Some(price) = patch.sale_price {
        validate_price("salePrice", price)?;
    }
    if let Some(stock) = patch.stock {
        validate_stock(stock)?;
    }
    Ok(())
}

pub fn validate_entry_draft(draft: &EntryDraft) -> ValidationResult<()> {
    validate_name("concept", &draft.concept)?;
    validate_positive_amount("amount", draft.amount)
}

pub fn validate_new_debt(debt: &NewDebt) -> ValidationResult<()> {
    validate_name("personName", &debt.person_name)?;
    validate_positive_amount("initialAmount", debt.initial_amount)?;
    if debt.concept.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "concept".to_string(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

/// Validates a document id supplied by a caller.
///
/// Ids are opaque, but they end up inside document paths, so `/` is
/// rejected.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    if id.contains('/') {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain '/'".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DebtDirection, EntryKind};

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Coca-Cola 330ml").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(201)).is_err());
        assert!(validate_name("name", &"ñ".repeat(200)).is_ok());
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
    fn test_validate_amounts() {
        assert!(validate_price("salePrice", Money::zero()).is_ok());
        assert!(validate_price("salePrice", Money::from_cents(-1)).is_err());
        assert!(validate_price("salePrice", Money::from_cents(MAX_PRICE_CENTS)).is_ok());
        assert_eq!(
            validate_price("salePrice", Money::from_cents(MAX_PRICE_CENTS + 1)),
            Err(ValidationError::OutOfRange {
                field: "salePrice".to_string(),
                min: 0,
                max: MAX_PRICE_CENTS,
            })
        );
        assert!(validate_positive_amount("amount", Money::zero()).is_err());
        assert!(validate_positive_amount("amount", Money::from_cents(1)).is_ok());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_err());
        assert!(validate_cart_size(1).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS + 1).is_err());
    }

    #[test]
    fn test_validate_new_product_rejects_negative_stock() {
        let product = NewProduct {
            name: "Pan".to_string(),
            cost_price: Money::from_cents(10),
            sale_price: Money::from_cents(25),
            stock: -1,
            barcode: None,
        };
        assert_eq!(
            validate_new_product(&product),
            Err(ValidationError::negative("stock"))
        );
    }

    #[test]
    fn test_validate_entry_and_debt() {
        let draft = EntryDraft {
            kind: EntryKind::Expense,
            amount: Money::zero(),
            concept: "Luz".to_string(),
            category_id: None,
        };
        assert!(validate_entry_draft(&draft).is_err());

        let debt = NewDebt {
            direction: DebtDirection::Receivable,
            person_name: "Ana".to_string(),
            initial_amount: Money::from_cents(5000),
            concept: "Fiado".to_string(),
            due_date: None,
        };
        assert!(validate_new_debt(&debt).is_ok());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("id", "abc-123").is_ok());
        assert!(validate_id("id", "").is_err());
        assert!(validate_id("id", "a/b").is_err());
    }
}
