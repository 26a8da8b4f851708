//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                          │
//! │  ├── CoreError        - Everything an operation can refuse with        │
//! │  │   └── category()   - Validation | Authorization | Integrity |       │
//! │  │                      Network | Concurrency                          │
//! │  └── ValidationError  - Field-level input failures                     │
//! │                                                                         │
//! │  collaborators.rs                                                      │
//! │  └── CollaboratorError - What an external service call returned        │
//! │                                                                         │
//! │  caja-client errors (separate crate)                                   │
//! │  └── ClientError      - HTTP/config failures, mapped to Collaborator   │
//! │                                                                         │
//! │  Flow: ClientError → CollaboratorError → CoreError → operator message  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Itemize: shortages and integrity blocks carry every offending product
//! 3. Errors are enum variants, never String
//! 4. Nothing is retried; `CollaboratorError::is_ambiguous` tells the caller
//!    when authoritative state must be re-queried

use std::fmt;

use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::types::{ClosureStatus, NegativeStockProduct, StockShortage};

// =============================================================================
// Error Category
// =============================================================================

/// Coarse classification used by the frontend to pick a dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Stock shortage, missing or malformed input, illegal transition.
    Validation,
    /// Invalid admin credential or insufficient role.
    Authorization,
    /// Negative stock blocking a closure.
    Integrity,
    /// A collaborator call failed.
    Network,
    /// Stock changed between cart assembly and submission.
    Concurrency,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Requested quantities exceed available stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Submit sale
    ///      │
    ///      ▼
    /// Aggregate per product: Coke 8 (available 5, no override)
    ///      │
    ///      ▼
    /// InsufficientStock { shortages: [Coke: available 5, requested 8] }
    ///      │
    ///      ▼
    /// UI lists every product that blocks the sale
    /// ```
    #[error("Insufficient stock: {}", ShortageList(.shortages))]
    InsufficientStock { shortages: Vec<StockShortage> },

    /// Stock dropped below what the cart already checked against.
    ///
    /// ## When This Occurs
    /// - Another terminal sold the same product after it was added here
    #[error("Stock changed since items were added: {}", ShortageList(.shortages))]
    StockChanged { shortages: Vec<StockShortage> },

    /// Product is not in the cart.
    #[error("Product {0} is not in the cart")]
    ProductNotInCart(String),

    /// A stock authorization is pending; the cart is locked until it resolves.
    #[error("A stock authorization for {product_id} is pending")]
    GateBusy { product_id: String },

    /// A gate operation was requested while no authorization is pending.
    #[error("No stock authorization is pending")]
    NoOpenGate,

    /// The gate step called does not match the gate's current state.
    #[error("Stock authorization is in {current} state, cannot {attempted}")]
    GateOutOfOrder {
        current: &'static str,
        attempted: &'static str,
    },

    /// The operator cancelled the pending authorization.
    #[error("Stock authorization cancelled")]
    GateCancelled,

    /// Administrator credential was rejected, could not be checked, or the
    /// check timed out.
    #[error("Administrator authorization rejected: {reason}")]
    AdminAuthorizationRejected { reason: String },

    /// Caller may not approve or reject closures.
    #[error("User {user_id} is not allowed to approve or reject closures")]
    InsufficientRole { user_id: String },

    /// Closure creation refused because some products have negative stock.
    #[error("Closure blocked: {} product(s) with negative stock: {}",
        .products.len(), NegativeList(.products))]
    IntegrityBlocked { products: Vec<NegativeStockProduct> },

    /// Closure is not in a state that allows the requested transition.
    #[error("Closure {closure_id} is {current:?}, cannot move to {requested:?}")]
    InvalidTransition {
        closure_id: String,
        current: ClosureStatus,
        requested: ClosureStatus,
    },

    /// An external collaborator failed. Surfaced verbatim, never retried.
    #[error("{0}")]
    Collaborator(#[from] CollaboratorError),
}

impl CoreError {
    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Validation(_)
            | CoreError::InsufficientStock { .. }
            | CoreError::ProductNotInCart(_)
            | CoreError::GateBusy { .. }
            | CoreError::NoOpenGate
            | CoreError::GateOutOfOrder { .. }
            | CoreError::GateCancelled
            | CoreError::InvalidTransition { .. } => ErrorCategory::Validation,
            CoreError::AdminAuthorizationRejected { .. } | CoreError::InsufficientRole { .. } => {
                ErrorCategory::Authorization
            }
            CoreError::IntegrityBlocked { .. } => ErrorCategory::Integrity,
            CoreError::Collaborator(_) => ErrorCategory::Network,
            CoreError::StockChanged { .. } => ErrorCategory::Concurrency,
        }
    }

    /// Returns true if the caller must re-query authoritative state before
    /// doing anything else (the server may or may not have committed).
    pub fn requires_requery(&self) -> bool {
        matches!(self, CoreError::Collaborator(e) if e.is_ambiguous())
    }
}

/// Renders "Coke (available 5, requested 8); Water (...)".
struct ShortageList<'a>(&'a [StockShortage]);

impl fmt::Display for ShortageList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(
                f,
                "{} (available {}, requested {})",
                s.name, s.available, s.requested
            )?;
        }
        Ok(())
    }
}

struct NegativeList<'a>(&'a [NegativeStockProduct]);

impl fmt::Display for NegativeList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} (stock {})", p.name, p.current_stock)?;
        }
        Ok(())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when operator input doesn't meet requirements.
/// Raised before any collaborator is called.
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

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., malformed amount, inverted period).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
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
    fn test_shortage_message_is_itemized() {
        let err = CoreError::InsufficientStock {
            shortages: vec![
                StockShortage {
                    product_id: "p-1".to_string(),
                    name: "Coca-Cola 330ml".to_string(),
                    available: 5,
                    requested: 8,
                },
                StockShortage {
                    product_id: "p-2".to_string(),
                    name: "Agua Pura".to_string(),
                    available: 0,
                    requested: 1,
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock: Coca-Cola 330ml (available 5, requested 8); \
             Agua Pura (available 0, requested 1)"
        );
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_integrity_message_lists_products() {
        let err = CoreError::IntegrityBlocked {
            products: vec![
                NegativeStockProduct {
                    id: "p-1".to_string(),
                    name: "Pan Dulce".to_string(),
                    current_stock: -2,
                },
                NegativeStockProduct {
                    id: "p-2".to_string(),
                    name: "Leche".to_string(),
                    current_stock: -1,
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Closure blocked: 2 product(s)"));
        assert!(msg.contains("Pan Dulce (stock -2)"));
        assert!(msg.contains("Leche (stock -1)"));
        assert_eq!(err.category(), ErrorCategory::Integrity);
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            CoreError::StockChanged { shortages: vec![] }.category(),
            ErrorCategory::Concurrency
        );
        assert_eq!(
            CoreError::InsufficientRole {
                user_id: "u-1".into()
            }
            .category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            CoreError::Collaborator(CollaboratorError::Unavailable("down".into())).category(),
            ErrorCategory::Network
        );
    }

    #[test]
    fn test_timeout_requires_requery() {
        let err = CoreError::from(CollaboratorError::Timeout { seconds: 10 });
        assert!(err.requires_requery());
        let err = CoreError::from(CollaboratorError::Unavailable("refused".into()));
        assert!(!err.requires_requery());
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "reason".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: reason is required");
    }
}
