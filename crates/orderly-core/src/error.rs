//! # Error Types
//!
//! Domain-specific error types for orderly-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  orderly-core errors (this file)                                       │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Caller-facing taxonomy                         │
//! │                                                                         │
//! │  orderly-db errors (separate crate)                                    │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Taxonomy
//! Every error maps onto exactly one [`ErrorKind`]:
//!
//! | Kind           | Examples                                              |
//! |----------------|-------------------------------------------------------|
//! | `NotFound`     | missing variant, product, order, gift card, discount  |
//! | `InvalidInput` | bad amounts, expired or inactive gift card            |
//! | `Conflict`     | stock insufficient, order-number collision, CAS miss  |
//! | `Forbidden`    | ownership checks propagated from collaborators        |

use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification used by callers to decide on retries and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Conflict,
    Forbidden,
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    ///
    /// ## When This Occurs
    /// - Line item id names neither a variant nor a variant-less product
    /// - Order id or gift card code is unknown
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Insufficient stock to complete the sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// Conditional decrement: stock=3
    ///      │
    ///      ▼
    /// InsufficientStock { target: "variant:…", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole checkout rolls back
    /// ```
    #[error("Insufficient stock for {target}: available {available}, requested {requested}")]
    InsufficientStock {
        target: String,
        available: i64,
        requested: i64,
    },

    /// Gift card exists but is not active.
    #[error("Gift card {code} is not active")]
    GiftCardInactive { code: String },

    /// Gift card is past its expiry date.
    #[error("Gift card {code} has expired")]
    GiftCardExpired { code: String },

    /// The order cannot move between the requested states.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: String,
        to: String,
    },

    /// Malformed or out-of-range input that is not a single-field problem.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A concurrent writer or uniqueness guard won the race.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller is not allowed to touch this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Maps the error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::InsufficientStock { .. } | CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::GiftCardInactive { .. }
            | CoreError::GiftCardExpired { .. }
            | CoreError::InvalidTransition { .. }
            | CoreError::InvalidInput(_)
            | CoreError::Validation(_) => ErrorKind::InvalidInput,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
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

    /// Invalid format (e.g., malformed email or code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
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
            target: "variant:v-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for variant:v-1: available 3, requested 5"
        );

        let err = CoreError::not_found("GiftCard", "XMAS-2026");
        assert_eq!(err.to_string(), "GiftCard not found: XMAS-2026");
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(CoreError::not_found("Order", "o").kind(), ErrorKind::NotFound);
        assert_eq!(
            CoreError::GiftCardExpired { code: "G".into() }.kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(CoreError::Conflict("race".into()).kind(), ErrorKind::Conflict);
        assert_eq!(CoreError::Forbidden("vendor".into()).kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "email".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::InvalidInput);
    }
}
