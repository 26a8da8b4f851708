//! # Validation Module
//!
//! Input validation for cart, gate, submission and closure operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend                                                     │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate operator feedback                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: caja-core operation                                          │
//! │  └── THIS MODULE: runs before ANY collaborator call                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend                                                      │
//! │  └── Authoritative stock, roles and persistence rules                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caja_core::validation::{validate_quantity, validate_rejection_reason};
//!
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_rejection_reason("   ").is_err());
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::ClosurePeriod;
use crate::{
    MAX_CART_ITEMS, MAX_DENOMINATION_QUANTITY, MAX_ENTERED_AMOUNT_CENTS, MAX_ENTERED_COUNT,
    MAX_ITEM_QUANTITY, MAX_NOTES_LENGTH, MAX_REASON_LENGTH,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Quantity Validators
// =============================================================================

/// Validates a quantity being added to the cart.
///
/// ## Rules
/// ```text
/// qty <= 0    → "quantity must be positive"
/// qty > 999   → "quantity must be between 1 and 999"
/// ```
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

/// Validates a replacement quantity for an existing line. Zero is allowed
/// and means "remove the line".
pub fn validate_new_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates the extra physical units an operator reports during an
/// availability confirmation.
pub fn validate_additional_units(units: i64) -> ValidationResult<()> {
    if units < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "additional units".to_string(),
        });
    }
    Ok(())
}

/// Validates the quantity a stock override would set the line to.
pub fn validate_candidate_quantity(candidate: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&candidate) {
        return Err(ValidationError::OutOfRange {
            field: "authorized quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates an operator-entered count (0..=1,000,000).
pub fn validate_count(field: &str, count: i64) -> ValidationResult<()> {
    validate_bounded_count(field, count, MAX_ENTERED_COUNT)
}

/// Validates how many of one bill or coin were counted (0..=100,000).
pub fn validate_denomination_quantity(quantity: i64) -> ValidationResult<()> {
    validate_bounded_count("denomination quantity", quantity, MAX_DENOMINATION_QUANTITY)
}

fn validate_bounded_count(field: &str, count: i64, max: i64) -> ValidationResult<()> {
    if count < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    if count > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Money Validators
// =============================================================================

/// Validates an operator-entered amount (cash received, actual per method).
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (nothing counted for that method)
/// - At most Q10,000,000.00
pub fn validate_entered_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    if amount.cents() > MAX_ENTERED_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_ENTERED_AMOUNT_CENTS,
        });
    }
    Ok(())
}

/// Validates a face value (0 < value <= Q10,000,000.00).
pub fn validate_face_value(value: Money) -> ValidationResult<()> {
    if !value.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "face value".to_string(),
        });
    }
    if value.cents() > MAX_ENTERED_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "face value".to_string(),
            min: 1,
            max: MAX_ENTERED_AMOUNT_CENTS,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size before a NEW line is added.
///
/// ## Rules
/// - Must not exceed MAX_CART_ITEMS (100)
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field and returns it trimmed.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Validates a closure rejection reason.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 500 characters
pub fn validate_rejection_reason(reason: &str) -> ValidationResult<String> {
    let reason = validate_required("rejection reason", reason)?;
    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(ValidationError::TooLong {
            field: "rejection reason".to_string(),
            max: MAX_REASON_LENGTH,
        });
    }
    Ok(reason)
}

/// Normalizes optional notes: blank becomes `None`, long notes are refused.
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if notes.chars().count() > MAX_NOTES_LENGTH {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LENGTH,
        });
    }

    Ok(Some(notes.to_string()))
}

// =============================================================================
// Period Validators
// =============================================================================

/// Builds a closure period, requiring `start < end`.
pub fn validate_period(start: DateTime<Utc>, end: DateTime<Utc>) -> ValidationResult<ClosurePeriod> {
    if start >= end {
        return Err(ValidationError::InvalidFormat {
            field: "period".to_string(),
            reason: "start must be before end".to_string(),
        });
    }
    Ok(ClosurePeriod { start, end })
}

// =============================================================================
// Unit Tests
// =============================================================================
