//! # Collaborator Traits
//!
//! Every external system the core talks to, expressed as an async trait.
//!
//! ## Boundary
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         caja-core                                       │
//! │                                                                         │
//! │  CartSession ──────────► AuthValidator                                 │
//! │  submit_sale ──────────► InventoryService, SalePersistence             │
//! │  CashClosureCalculator ► InventoryService, SalesAggregation,           │
//! │                          ClosurePersistence                             │
//! │  ClosureApproval ──────► RolePermission, ClosurePersistence            │
//! │                                                                         │
//! └──────────────────────────────┬──────────────────────────────────────────┘
//!                                │ implemented by
//!                 ┌──────────────┴──────────────┐
//!                 ▼                             ▼
//!     caja_client::RestBackend          test_support fakes
//!          (HTTP/JSON)                     (in-memory)
//! ```
//!
//! ## No Retries
//! Implementations make exactly one attempt. When the outcome is unknown
//! (`CollaboratorError::is_ambiguous`), the caller re-queries authoritative
//! state instead of repeating a write.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::OperatorSession;
use crate::types::{
    CashClosure, ClosurePeriod, NewClosure, PersistedSale, SaleDraft, StatusPatch,
    StockIntegrityReport, TheoreticalSnapshot,
};

// =============================================================================
// Collaborator Error
// =============================================================================

/// What went wrong talking to an external service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The request never reached the service (refused, DNS, bad config).
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// No answer within the deadline. The service may have acted.
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The connection dropped after the request was sent.
    #[error("Connection interrupted: {0}")]
    Interrupted(String),

    /// The caller's credentials were refused.
    #[error("Authentication required")]
    Unauthorized,

    /// The service refused the request (4xx).
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The service failed while handling the request (5xx).
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The response arrived but could not be read.
    #[error("Invalid response: {0}")]
    InvalidPayload(String),
}

impl CollaboratorError {
    /// Returns true when the service may or may not have committed the
    /// request, so authoritative state must be re-queried.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            CollaboratorError::Timeout { .. }
            | CollaboratorError::Interrupted(_)
            | CollaboratorError::InvalidPayload(_) => true,
            CollaboratorError::Server { status, .. } => matches!(status, 502 | 504),
            CollaboratorError::Unavailable(_)
            | CollaboratorError::Unauthorized
            | CollaboratorError::Rejected { .. } => false,
        }
    }
}

/// Convenience alias for collaborator results.
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

// =============================================================================
// Traits
// =============================================================================

/// Computes expected period totals from recorded transactions.
#[async_trait]
pub trait SalesAggregation: Send + Sync {
    async fn theoretical_totals(&self, period: &ClosurePeriod)
        -> CollaboratorResult<TheoreticalSnapshot>;
}

/// Live stock levels and the negative-stock integrity check.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Every product whose recorded stock is below zero.
    async fn stock_integrity(&self) -> CollaboratorResult<StockIntegrityReport>;

    /// Available units per product id. Products missing from the answer are
    /// treated as having zero units.
    async fn available_stock(&self, product_ids: &[String])
        -> CollaboratorResult<HashMap<String, i64>>;
}

/// Checks an administrator identity/credential pair.
///
/// The credential is passed through verbatim and must never be logged.
#[async_trait]
pub trait AuthValidator: Send + Sync {
    async fn validate(&self, identity: &str, credential: &str) -> CollaboratorResult<bool>;
}

#[async_trait]
pub trait SalePersistence: Send + Sync {
    async fn create_sale(&self, draft: &SaleDraft) -> CollaboratorResult<PersistedSale>;
}

#[async_trait]
pub trait ClosurePersistence: Send + Sync {
    async fn create_closure(&self, payload: &NewClosure) -> CollaboratorResult<CashClosure>;

    /// Applies one atomic status change and returns the updated closure.
    async fn update_status(&self, closure_id: &str, patch: &StatusPatch)
        -> CollaboratorResult<CashClosure>;
}

/// Role lookup for the acting operator.
#[async_trait]
pub trait RolePermission: Send + Sync {
    /// True if the operator holds any role other than seller.
    async fn is_non_seller(&self, session: &OperatorSession) -> CollaboratorResult<bool>;
}
