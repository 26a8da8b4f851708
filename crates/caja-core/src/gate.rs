//! # Stock Authorization Gate
//!
//! Two-step exception flow that lets an operator sell beyond recorded stock
//! once an administrator approves.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   cart change exceeds stock                                            │
//! │            │                                                            │
//! │            ▼                                                            │
//! │   ┌──────────────────────┐   cancel                                    │
//! │   │ AvailabilityConfirm  │──────────► closed, nothing changed          │
//! │   │ shortfall = req−avail│                                              │
//! │   └──────────┬───────────┘                                              │
//! │              │ confirm(additional ≥ 0)                                  │
//! │              │ candidate = avail + additional, 1..=999                  │
//! │              ▼                                                          │
//! │   ┌──────────────────────┐   invalid / error / timeout / cancel        │
//! │   │   AdminAuthorize     │──────────► closed, nothing changed          │
//! │   │  candidate_quantity  │                                              │
//! │   └──────────┬───────────┘                                              │
//! │              │ credential valid                                         │
//! │              ▼                                                          │
//! │   product authorized for the session, line = candidate                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The gate itself never touches the cart. [`crate::cart::CartSession`]
//! owns it and applies the parked change once [`StockAuthorizationGate::authorize`]
//! returns an [`AdminApproval`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::collaborators::AuthValidator;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::ProductSnapshot;
use crate::validation::{validate_additional_units, validate_candidate_quantity, validate_required};

/// Default bound on the credential check.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Policy
// =============================================================================

/// Gate settings handed in by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    /// How long to wait for the credential check before rejecting.
    pub auth_timeout: Duration,
}

impl Default for GatePolicy {
    fn default() -> Self {
        GatePolicy {
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }
}

// =============================================================================
// Notice & State
// =============================================================================

/// What the operator is shown when a change exceeds stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShortfallNotice {
    pub product_id: String,
    pub name: String,
    /// Units known to be available (never below zero).
    pub available: i64,
    /// Cumulative quantity the change would leave in the cart.
    pub requested: i64,
    /// `requested − available`.
    pub shortfall: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum GateState {
    /// Waiting for the operator to report extra physical units.
    AvailabilityConfirm,
    /// Waiting for an administrator credential.
    AdminAuthorize { candidate_quantity: i64 },
}

impl GateState {
    pub fn name(&self) -> &'static str {
        match self {
            GateState::AvailabilityConfirm => "availability confirmation",
            GateState::AdminAuthorize { .. } => "administrator authorization",
        }
    }
}

/// Result of a successful credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminApproval {
    pub product: ProductSnapshot,
    pub granted_by: String,
    pub quantity: i64,
}

// =============================================================================
// Gate
// =============================================================================

/// One pending stock override. At most one exists per cart session.
#[derive(Debug)]
pub struct StockAuthorizationGate {
    product: ProductSnapshot,
    notice: ShortfallNotice,
    state: GateState,
    cancel: CancellationToken,
}

impl StockAuthorizationGate {
    /// Opens a gate for `product` with `requested` units wanted in total.
    pub fn open(product: ProductSnapshot, requested: i64) -> Self {
        let available = product.available_stock.max(0);
        let notice = ShortfallNotice {
            product_id: product.id.clone(),
            name: product.name.clone(),
            available,
            requested,
            shortfall: requested - available,
        };

        debug!(
            product_id = %notice.product_id,
            available,
            requested,
            shortfall = notice.shortfall,
            "Stock authorization gate opened"
        );

        StockAuthorizationGate {
            product,
            notice,
            state: GateState::AvailabilityConfirm,
            cancel: CancellationToken::new(),
        }
    }

    pub fn notice(&self) -> &ShortfallNotice {
        &self.notice
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn product_id(&self) -> &str {
        &self.product.id
    }

    /// Token that aborts an in-flight credential check when cancelled.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Step 1: the operator reports `additional` physical units beyond the
    /// recorded stock. Returns the candidate quantity.
    pub fn confirm_availability(&mut self, additional: i64) -> CoreResult<i64> {
        if self.state != GateState::AvailabilityConfirm {
            return Err(CoreError::GateOutOfOrder {
                current: self.state.name(),
                attempted: "confirm availability",
            });
        }

        validate_additional_units(additional)?;
        let candidate_quantity = self.notice.available.saturating_add(additional);
        validate_candidate_quantity(candidate_quantity)?;

        self.state = GateState::AdminAuthorize { candidate_quantity };
        debug!(
            product_id = %self.notice.product_id,
            additional,
            candidate_quantity,
            "Availability confirmed, awaiting administrator"
        );
        Ok(candidate_quantity)
    }

    /// Step 2: checks the administrator credential.
    ///
    /// Blank identities are refused locally. Both identity and credential
    /// go to the validator exactly as typed. An `Err` other than a local validation error
    /// means the gate must be closed.
    pub async fn authorize(
        &self,
        validator: &dyn AuthValidator,
        identity: &str,
        credential: &str,
        policy: &GatePolicy,
    ) -> CoreResult<AdminApproval> {
        let GateState::AdminAuthorize { candidate_quantity } = self.state else {
            return Err(CoreError::GateOutOfOrder {
                current: self.state.name(),
                attempted: "authorize",
            });
        };

        validate_required("administrator identity", identity)?;
        if credential.is_empty() {
            return Err(ValidationError::Required {
                field: "administrator credential".to_string(),
            }
            .into());
        }

        debug!(
            product_id = %self.notice.product_id,
            admin = %identity,
            "Validating administrator credential"
        );

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => {
                info!(product_id = %self.notice.product_id, "Stock authorization cancelled");
                return Err(CoreError::GateCancelled);
            }
            result = tokio::time::timeout(
                policy.auth_timeout,
                validator.validate(identity, credential),
            ) => result,
        };

        match outcome {
            Ok(Ok(true)) => {
                info!(
                    product_id = %self.notice.product_id,
                    admin = %identity,
                    quantity = candidate_quantity,
                    "Stock override granted"
                );
                Ok(AdminApproval {
                    product: self.product.clone(),
                    granted_by: identity.to_string(),
                    quantity: candidate_quantity,
                })
            }
            Ok(Ok(false)) => {
                warn!(product_id = %self.notice.product_id, admin = %identity, "Administrator credential rejected");
                Err(CoreError::AdminAuthorizationRejected {
                    reason: "invalid administrator credentials".to_string(),
                })
            }
            Ok(Err(e)) => {
                warn!(product_id = %self.notice.product_id, error = %e, "Credential check failed");
                Err(CoreError::AdminAuthorizationRejected {
                    reason: format!("credential check failed: {}", e),
                })
            }
            Err(_) => {
                warn!(
                    product_id = %self.notice.product_id,
                    timeout_secs = policy.auth_timeout.as_secs(),
                    "Credential check timed out"
                );
                Err(CoreError::AdminAuthorizationRejected {
                    reason: format!(
                        "credential check timed out after {}s",
                        policy.auth_timeout.as_secs()
                    ),
                })
            }
        }
    }

    /// Aborts any in-flight credential check.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::test_support::FakeAuth;

    fn coke(stock: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: "p-coke".to_string(),
            name: "Coca-Cola 330ml".to_string(),
            unit_price: Money::from_cents(800),
            available_stock: stock,
        }
    }

    #[test]
    fn test_shortfall_and_candidate() {
        let mut gate = StockAuthorizationGate::open(coke(5), 8);
        assert_eq!(gate.notice().shortfall, 3);
        assert_eq!(gate.state(), GateState::AvailabilityConfirm);

        let candidate = gate.confirm_availability(3).unwrap();
        assert_eq!(candidate, 8);
        assert_eq!(
            gate.state(),
            GateState::AdminAuthorize {
                candidate_quantity: 8
            }
        );
    }

    #[test]
    fn test_negative_stock_counts_as_zero() {
        let gate = StockAuthorizationGate::open(coke(-4), 2);
        assert_eq!(gate.notice().available, 0);
        assert_eq!(gate.notice().shortfall, 2);
    }

    #[test]
    fn test_confirm_rejects_bad_input() {
        let mut gate = StockAuthorizationGate::open(coke(0), 1);
        assert!(matches!(
            gate.confirm_availability(-1),
            Err(CoreError::Validation(_))
        ));
        // candidate 0 is below the minimum
        assert!(gate.confirm_availability(0).is_err());
        assert_eq!(gate.state(), GateState::AvailabilityConfirm);

        let mut gate = StockAuthorizationGate::open(coke(998), 1000);
        assert!(gate.confirm_availability(5).is_err());
    }

    #[test]
    fn test_confirm_twice_is_out_of_order() {
        let mut gate = StockAuthorizationGate::open(coke(5), 8);
        gate.confirm_availability(3).unwrap();
        assert!(matches!(
            gate.confirm_availability(3),
            Err(CoreError::GateOutOfOrder { .. })
        ));
    }

    #[tokio::test]
    async fn test_authorize_before_confirm_is_out_of_order() {
        let gate = StockAuthorizationGate::open(coke(5), 8);
        let auth = FakeAuth::accepting("admin", "1234");
        let err = gate
            .authorize(&auth, "admin", "1234", &GatePolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::GateOutOfOrder { .. }));
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_valid_credential_approves() {
        let mut gate = StockAuthorizationGate::open(coke(5), 8);
        gate.confirm_availability(3).unwrap();
        let auth = FakeAuth::accepting("admin", "1234");

        let approval = gate
            .authorize(&auth, "admin", "1234", &GatePolicy::default())
            .await
            .unwrap();
        assert_eq!(approval.granted_by, "admin");
        assert_eq!(approval.quantity, 8);
    }

    #[tokio::test]
    async fn test_identity_reaches_validator_as_typed() {
        let mut gate = StockAuthorizationGate::open(coke(5), 8);
        gate.confirm_availability(3).unwrap();

        // Padding is part of what was typed; the validator decides.
        let strict = FakeAuth::accepting("admin", "1234");
        let err = gate
            .authorize(&strict, " admin ", "1234", &GatePolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AdminAuthorizationRejected { .. }));
        assert_eq!(strict.calls(), 1);

        let padded = FakeAuth::accepting(" admin ", "1234");
        let approval = gate
            .authorize(&padded, " admin ", "1234", &GatePolicy::default())
            .await
            .unwrap();
        assert_eq!(approval.granted_by, " admin ");
    }

    #[tokio::test]
    async fn test_invalid_credential_rejects() {
        let mut gate = StockAuthorizationGate::open(coke(5), 8);
        gate.confirm_availability(3).unwrap();
        let auth = FakeAuth::accepting("admin", "1234");

        let err = gate
            .authorize(&auth, "admin", "0000", &GatePolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AdminAuthorizationRejected { .. }));
    }

    #[tokio::test]
    async fn test_collaborator_failure_rejects() {
        let mut gate = StockAuthorizationGate::open(coke(5), 8);
        gate.confirm_availability(3).unwrap();
        let auth = FakeAuth::failing();

        let err = gate
            .authorize(&auth, "admin", "1234", &GatePolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AdminAuthorizationRejected { .. }));
    }

    #[tokio::test]
    async fn test_empty_identity_never_reaches_validator() {
        let mut gate = StockAuthorizationGate::open(coke(5), 8);
        gate.confirm_availability(3).unwrap();
        let auth = FakeAuth::accepting("admin", "1234");

        let err = gate
            .authorize(&auth, "  ", "1234", &GatePolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_validator_times_out() {
        let mut gate = StockAuthorizationGate::open(coke(5), 8);
        gate.confirm_availability(3).unwrap();
        let auth = FakeAuth::accepting("admin", "1234").with_delay(Duration::from_secs(60));
        let policy = GatePolicy {
            auth_timeout: Duration::from_secs(5),
        };

        let err = gate
            .authorize(&auth, "admin", "1234", &policy)
            .await
            .unwrap_err();
        match err {
            CoreError::AdminAuthorizationRejected { reason } => {
                assert!(reason.contains("timed out"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_check() {
        let mut gate = StockAuthorizationGate::open(coke(5), 8);
        gate.confirm_availability(3).unwrap();
        let auth = FakeAuth::accepting("admin", "1234").with_delay(Duration::from_secs(20));

        let handle = gate.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.cancel();
        });

        let err = gate
            .authorize(&auth, "admin", "1234", &GatePolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::GateCancelled));
    }
}
