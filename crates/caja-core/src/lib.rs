//! # caja-core: Business Logic for the Caja Back Office
//!
//! The point-of-sale override flow and the end-of-period cash-drawer
//! reconciliation engine. Every external system is reached through a trait
//! in [`collaborators`]; this crate performs no I/O of its own.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja Back Office                                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Frontend (screens)                           │   │
//! │  │    Cart UI ──► Override dialog ──► Checkout ──► Closure UI      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌────────────┐  ┌─────────────┐  │   │
//! │  │   │   cart   │  │   gate   │  │ submission │  │   closure   │  │   │
//! │  │   │ Session  │─►│ 2-step   │  │ live stock │  │ worksheet   │  │   │
//! │  │   │ lines    │  │ override │  │ re-check   │  │ + approval  │  │   │
//! │  │   └──────────┘  └──────────┘  └────────────┘  └─────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   collaborators: traits only • NO HTTP • NO DATABASE           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              caja-client (REST adapter, config)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (cart lines, sale drafts, closures)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input rules checked before any collaborator call
//! - [`session`] - The acting operator
//! - [`collaborators`] - Async traits for every external service
//! - [`cart`] / [`gate`] - Cart session and the stock authorization gate
//! - [`submission`] - Final stock re-check and hand-off to persistence
//! - [`closure`] / [`approval`] - Reconciliation and the approval workflow
//!
//! ## Example Usage
//!
//! ```rust
//! use caja_core::money::Money;
//!
//! let price = Money::from_cents(2550); // 25.50
//! assert_eq!(price.multiply_quantity(3).to_string(), "76.50");
//!
//! let difference = Money::from_cents(-5000);
//! let net = Money::from_cents(100000);
//! assert_eq!(difference.percentage_of(net).to_string(), "-5.00%");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod approval;
pub mod cart;
pub mod closure;
pub mod collaborators;
pub mod error;
pub mod gate;
pub mod money;
pub mod session;
pub mod submission;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use approval::{ClosureApproval, ClosureDecision};
pub use cart::{CartChange, CartSession, CartSummary};
pub use closure::{CashClosureCalculator, CashCountPolicy, ClosurePolicy, ClosureWorksheet};
pub use collaborators::CollaboratorError;
pub use error::{CoreError, CoreResult, ErrorCategory, ValidationError};
pub use gate::{GatePolicy, ShortfallNotice, StockAuthorizationGate};
pub use money::Money;
pub use session::OperatorSession;
pub use submission::{SaleRequest, SaleSubmitter, SubmittedSale};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of a closure rejection reason.
pub const MAX_REASON_LENGTH: usize = 500;

/// Maximum length of free-text notes.
pub const MAX_NOTES_LENGTH: usize = 1000;

/// Maximum pieces of one bill or coin in a drawer count.
pub const MAX_DENOMINATION_QUANTITY: i64 = 100_000;

/// Maximum operator-entered count (transactions, vouchers).
pub const MAX_ENTERED_COUNT: i64 = 1_000_000;

/// Maximum operator-entered amount, in cents (Q10,000,000.00).
///
/// Keeps every subtotal, sum and difference far inside `i64`.
pub const MAX_ENTERED_AMOUNT_CENTS: i64 = 1_000_000_000;
