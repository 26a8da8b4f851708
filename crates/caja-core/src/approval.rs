//! # Closure Approval
//!
//! Moves a closure out of Pending with supervisor attribution.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │               approve(signature?)                                       │
//! │   ┌─────────┐ ─────────────────────► ┌──────────┐                       │
//! │   │ Pending │                        │ Approved │  terminal             │
//! │   └─────────┘ ─────────────────────► └──────────┘                       │
//! │               reject(reason ≠ "")    ┌──────────┐                       │
//! │                          └─────────► │ Rejected │  terminal             │
//! │                                      └──────────┘                       │
//! │                                                                         │
//! │   Order: local validation → role check → one status patch              │
//! │   Failure at any step: closure unchanged, error surfaced, no retry     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use crate::collaborators::{ClosurePersistence, CollaboratorError, RolePermission};
use crate::error::{CoreError, CoreResult};
use crate::session::OperatorSession;
use crate::types::{CashClosure, ClosureStatus, StatusPatch};
use crate::validation::{validate_notes, validate_rejection_reason, validate_required};

/// A supervisor's decision on a pending closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ClosureDecision {
    Approve { signature: Option<String> },
    Reject { reason: String },
}

impl ClosureDecision {
    pub fn target(&self) -> ClosureStatus {
        match self {
            ClosureDecision::Approve { .. } => ClosureStatus::Approved,
            ClosureDecision::Reject { .. } => ClosureStatus::Rejected,
        }
    }
}

/// Guarded transition: only Pending may move, and only to a terminal
/// state.
pub fn transition(
    closure_id: &str,
    current: ClosureStatus,
    requested: ClosureStatus,
) -> CoreResult<ClosureStatus> {
    if current.is_terminal() || !requested.is_terminal() {
        return Err(CoreError::InvalidTransition {
            closure_id: closure_id.to_string(),
            current,
            requested,
        });
    }
    Ok(requested)
}

/// Applies supervisor decisions to closures.
pub struct ClosureApproval {
    roles: Arc<dyn RolePermission>,
    persistence: Arc<dyn ClosurePersistence>,
}

impl ClosureApproval {
    pub fn new(roles: Arc<dyn RolePermission>, persistence: Arc<dyn ClosurePersistence>) -> Self {
        ClosureApproval { roles, persistence }
    }

    pub async fn approve(
        &self,
        closure: &CashClosure,
        signature: Option<String>,
        session: &OperatorSession,
    ) -> CoreResult<CashClosure> {
        self.decide(closure, ClosureDecision::Approve { signature }, session)
            .await
    }

    pub async fn reject(
        &self,
        closure: &CashClosure,
        reason: &str,
        session: &OperatorSession,
    ) -> CoreResult<CashClosure> {
        self.decide(
            closure,
            ClosureDecision::Reject {
                reason: reason.to_string(),
            },
            session,
        )
        .await
    }

    /// Validates locally, checks the role, then sends one status patch.
    /// Returns the closure as the backend now reports it; `closure` itself
    /// is never modified.
    pub async fn decide(
        &self,
        closure: &CashClosure,
        decision: ClosureDecision,
        session: &OperatorSession,
    ) -> CoreResult<CashClosure> {
        let requested = decision.target();
        debug!(
            closure_id = %closure.id,
            current = ?closure.status,
            requested = ?requested,
            supervisor = %session.user_id,
            "Closure decision requested"
        );

        // ---------------------------------------------------------------------
        // Local validation
        // ---------------------------------------------------------------------
        let status = transition(&closure.id, closure.status, requested)?;
        let supervisor_name = validate_required("supervisor", &session.display_name)?;
        let (signature, rejection_reason) = match decision {
            ClosureDecision::Approve { signature } => (validate_notes(signature.as_deref())?, None),
            ClosureDecision::Reject { reason } => (None, Some(validate_rejection_reason(&reason)?)),
        };

        // ---------------------------------------------------------------------
        // Role check
        // ---------------------------------------------------------------------
        let allowed = self.roles.is_non_seller(session).await.map_err(|e| {
            error!(closure_id = %closure.id, error = %e, "Role check failed");
            CoreError::from(e)
        })?;
        if !allowed {
            warn!(closure_id = %closure.id, user_id = %session.user_id, "Closure decision refused: seller role");
            return Err(CoreError::InsufficientRole {
                user_id: session.user_id.clone(),
            });
        }

        // ---------------------------------------------------------------------
        // Status patch
        // ---------------------------------------------------------------------
        let patch = StatusPatch {
            status,
            supervisor_name,
            signature,
            rejection_reason,
            decided_at: Utc::now(),
        };

        let updated = self
            .persistence
            .update_status(&closure.id, &patch)
            .await
            .map_err(|e| {
                error!(
                    closure_id = %closure.id,
                    error = %e,
                    ambiguous = e.is_ambiguous(),
                    "Status patch failed"
                );
                CoreError::from(e)
            })?;

        if updated.status != status {
            error!(
                closure_id = %closure.id,
                reported = ?updated.status,
                "Backend reported a different status after patch"
            );
            return Err(CollaboratorError::InvalidPayload(format!(
                "closure {} reported as {:?} after {:?} patch",
                closure.id, updated.status, status
            ))
            .into());
        }

        info!(
            closure_id = %closure.id,
            status = ?status,
            supervisor = %patch.supervisor_name,
            "Closure status changed"
        );
        Ok(updated)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
