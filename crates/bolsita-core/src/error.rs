//! # Error Types
//!
//! Domain-specific error types for bolsita-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bolsita-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bolsita-db errors (separate crate)                                    │
//! │  └── DbError          - Store failures, conflicts, wraps CoreError     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → user-facing message     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Taxonomy
//! 1. `ValidationError`: caught before any store call (missing field,
//!    non-positive amount)
//! 2. `CoreError`: raised inside an atomic operation (insufficient stock,
//!    overpayment, entity gone)
//! 3. Transport failures live in `bolsita-db`

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
///
/// Raised by the pure rules in this crate and by the transaction bodies in
/// `bolsita-db`. Every variant reads as a sentence the user can act on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A product referenced by a sale no longer exists.
    ///
    /// ## When This Occurs
    /// - The product was deleted after it was put in the cart
    /// - A concurrent session removed it between snapshot attempts
    #[error("Product {name} no longer exists")]
    ProductGone { name: String },

    /// Insufficient stock to complete sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: Coffee × 5
    ///      │
    ///      ▼
    /// Snapshot: Coffee.stock = 3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Coffee", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole sale aborted, nothing written
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// A sale was requested with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The discount is larger than the sale subtotal.
    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal { discount: Money, subtotal: Money },

    /// Debt cannot be found.
    #[error("Debt not found: {0}")]
    DebtNotFound(String),

    /// Payment larger than the outstanding balance.
    #[error("Payment {amount} exceeds outstanding balance {balance}")]
    Overpayment { amount: Money, balance: Money },

    /// Cash tendered does not cover the sale total.
    #[error("Cash tendered {tendered} does not cover total {total}")]
    InsufficientCash { tendered: Money, total: Money },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    Negative { field: String },

    /// The field cannot be edited on this record.
    #[error("{field} cannot be changed on a sale entry")]
    Locked { field: String },

    /// A computed amount does not fit in the money type.
    #[error("{field} is too large")]
    TooLarge { field: String },

    /// Invalid format (e.g., invalid UUID, unparsable amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }

    pub fn negative(field: impl Into<String>) -> Self {
        ValidationError::Negative {
            field: field.into(),
        }
    }

    pub fn locked(field: impl Into<String>) -> Self {
        ValidationError::Locked {
            field: field.into(),
        }
    }

    pub fn too_large(field: impl Into<String>) -> Self {
        ValidationError::TooLarge {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Coffee".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Coffee: available 3, requested 5"
        );

        let err = CoreError::Overpayment {
            amount: Money::from_cents(1500),
            balance: Money::from_cents(1000),
        };
        assert_eq!(
            err.to_string(),
            "Payment $15.00 exceeds outstanding balance $10.00"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::required("name").to_string(),
            "name is required"
        );
        assert_eq!(
            ValidationError::must_be_positive("amount").to_string(),
            "amount must be positive"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
