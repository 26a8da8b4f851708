//! # Cart Session
//!
//! Builds one in-progress sale and routes stock shortfalls through the
//! [`StockAuthorizationGate`].
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Session Operations                              │
//! │                                                                         │
//! │  Operator Action        Operation               Effect                  │
//! │  ───────────────        ─────────               ──────                  │
//! │                                                                         │
//! │  Scan product ─────────► add_line() ──┬──► Applied (line merged/added) │
//! │                                       └──► AuthorizationRequired       │
//! │  Change quantity ──────► update_quantity() (same split; 0 removes)     │
//! │  Remove line ──────────► remove_line() ───► line gone, grant revoked   │
//! │  New sale ─────────────► clear() ─────────► lines, grants, gate gone   │
//! │                                                                         │
//! │  Gate open? every mutation above fails with GateBusy until:            │
//! │    confirm_availability() → authorize_override() | cancel_authorization│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Rule
//! A change applies immediately when the cumulative requested quantity of
//! the product fits the known available stock, or when the product already
//! holds an override grant in this session. Otherwise nothing is mutated and
//! the change is parked in a gate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::collaborators::AuthValidator;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::gate::{GatePolicy, ShortfallNotice, StockAuthorizationGate};
use crate::money::Money;
use crate::types::{CartLine, OverrideGrant, ProductSnapshot};
use crate::validation::{validate_cart_size, validate_new_quantity, validate_quantity};
use crate::MAX_ITEM_QUANTITY;

/// Outcome of a cart mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "notice", rename_all = "snake_case")]
pub enum CartChange {
    /// The cart now reflects the change.
    Applied,
    /// Stock is short; a gate is open and the cart is unchanged.
    AuthorizationRequired(ShortfallNotice),
}

/// Totals summary for the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartSummary {
    pub session_id: String,
    pub line_count: usize,
    pub total_quantity: i64,
    pub total: Money,
    pub authorized_product_ids: Vec<String>,
    pub gate_open: bool,
}

/// The in-progress sale.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding the same product merges)
/// - Every line has `quantity > 0`
/// - At most 100 lines, at most 999 units per line
/// - At most one open gate; while open, the cart is read-only
#[derive(Debug)]
pub struct CartSession {
    id: Uuid,
    lines: Vec<CartLine>,
    overrides: HashMap<String, OverrideGrant>,
    gate: Option<StockAuthorizationGate>,
    policy: GatePolicy,
    created_at: DateTime<Utc>,
}

impl CartSession {
    pub fn new(policy: GatePolicy) -> Self {
        let id = Uuid::new_v4();
        debug!(session_id = %id, "Cart session started");
        CartSession {
            id,
            lines: Vec::new(),
            overrides: HashMap::new(),
            gate: None,
            policy,
            created_at: Utc::now(),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds `quantity` units of `product`, merging into an existing line.
    pub fn add_line(&mut self, product: &ProductSnapshot, quantity: i64) -> CoreResult<CartChange> {
        self.ensure_no_gate()?;
        validate_quantity(quantity)?;

        debug!(
            session_id = %self.id,
            product_id = %product.id,
            quantity,
            "Adding to cart"
        );

        let current = self.requested_quantity(&product.id);
        if current == 0 {
            validate_cart_size(self.lines.len())?;
        }

        let requested = current + quantity;
        if requested > MAX_ITEM_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_ITEM_QUANTITY,
            }
            .into());
        }

        Ok(self.apply_or_gate(product.clone(), requested))
    }

    /// Replaces a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<CartChange> {
        self.ensure_no_gate()?;
        validate_new_quantity(quantity)?;

        if quantity == 0 {
            self.remove_line(product_id)?;
            return Ok(CartChange::Applied);
        }

        let line = self
            .line(product_id)
            .ok_or_else(|| CoreError::ProductNotInCart(product_id.to_string()))?;

        let product = ProductSnapshot {
            id: line.product_id.clone(),
            name: line.name.clone(),
            unit_price: line.unit_price,
            available_stock: line.stock_snapshot,
        };

        debug!(
            session_id = %self.id,
            product_id,
            quantity,
            "Updating cart quantity"
        );

        Ok(self.apply_or_gate(product, quantity))
    }

    /// Removes a line and revokes the product's override grant.
    pub fn remove_line(&mut self, product_id: &str) -> CoreResult<()> {
        self.ensure_no_gate()?;

        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() == before {
            return Err(CoreError::ProductNotInCart(product_id.to_string()));
        }

        if self.overrides.remove(product_id).is_some() {
            debug!(session_id = %self.id, product_id, "Override grant revoked");
        }
        info!(session_id = %self.id, product_id, "Line removed");
        Ok(())
    }

    /// Drops every line, every grant and any open gate.
    pub fn clear(&mut self) {
        if let Some(gate) = self.gate.take() {
            gate.cancel();
        }
        self.lines.clear();
        self.overrides.clear();
        self.created_at = Utc::now();
        debug!(session_id = %self.id, "Cart cleared");
    }

    // =========================================================================
    // Gate Steps
    // =========================================================================

    /// The pending stock authorization, if any.
    pub fn open_gate(&self) -> Option<&StockAuthorizationGate> {
        self.gate.as_ref()
    }

    /// Token that aborts the in-flight credential check of the open gate.
    pub fn gate_cancel_handle(&self) -> Option<CancellationToken> {
        self.gate.as_ref().map(|g| g.cancel_handle())
    }

    /// Gate step 1. Returns the candidate quantity.
    pub fn confirm_availability(&mut self, additional: i64) -> CoreResult<i64> {
        let gate = self.gate.as_mut().ok_or(CoreError::NoOpenGate)?;
        gate.confirm_availability(additional)
    }

    /// Operator cancel at any gate step. The cart is left as it was.
    pub fn cancel_authorization(&mut self) -> CoreResult<()> {
        let gate = self.gate.take().ok_or(CoreError::NoOpenGate)?;
        gate.cancel();
        info!(
            session_id = %self.id,
            product_id = %gate.product_id(),
            "Stock authorization cancelled by operator"
        );
        Ok(())
    }

    /// Gate step 2. On success the product is authorized for the rest of
    /// the session and its line is set to the candidate quantity. Any
    /// rejection closes the gate with the cart untouched; local input
    /// errors leave the gate open for another attempt.
    pub async fn authorize_override(
        &mut self,
        validator: &dyn AuthValidator,
        identity: &str,
        credential: &str,
    ) -> CoreResult<()> {
        let gate = self.gate.as_ref().ok_or(CoreError::NoOpenGate)?;
        let outcome = gate
            .authorize(validator, identity, credential, &self.policy)
            .await;

        match outcome {
            Ok(approval) => {
                self.gate = None;
                self.set_line(&approval.product, approval.quantity);
                self.overrides.insert(
                    approval.product.id.clone(),
                    OverrideGrant {
                        product_id: approval.product.id.clone(),
                        granted_by: approval.granted_by,
                        granted_at: Utc::now(),
                    },
                );
                info!(
                    session_id = %self.id,
                    product_id = %approval.product.id,
                    quantity = approval.quantity,
                    "Override applied to cart"
                );
                Ok(())
            }
            Err(e @ CoreError::Validation(_)) | Err(e @ CoreError::GateOutOfOrder { .. }) => {
                Err(e)
            }
            Err(e) => {
                self.gate = None;
                warn!(session_id = %self.id, error = %e, "Stock authorization closed without change");
                Err(e)
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Σ(unit_price × quantity), recomputed on every call.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Cumulative quantity of `product_id` across every line.
    pub fn requested_quantity(&self, product_id: &str) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .map(|l| l.quantity)
            .sum()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn is_authorized(&self, product_id: &str) -> bool {
        self.overrides.contains_key(product_id)
    }

    pub fn override_grant(&self, product_id: &str) -> Option<&OverrideGrant> {
        self.overrides.get(product_id)
    }

    /// Grants sorted by product id.
    pub fn override_grants(&self) -> Vec<OverrideGrant> {
        let mut grants: Vec<OverrideGrant> = self.overrides.values().cloned().collect();
        grants.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        grants
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn summary(&self) -> CartSummary {
        CartSummary {
            session_id: self.id.to_string(),
            line_count: self.line_count(),
            total_quantity: self.total_quantity(),
            total: self.total(),
            authorized_product_ids: self
                .override_grants()
                .into_iter()
                .map(|g| g.product_id)
                .collect(),
            gate_open: self.gate.is_some(),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    pub(crate) fn ensure_no_gate(&self) -> CoreResult<()> {
        match &self.gate {
            Some(gate) => Err(CoreError::GateBusy {
                product_id: gate.product_id().to_string(),
            }),
            None => Ok(()),
        }
    }

    fn apply_or_gate(&mut self, product: ProductSnapshot, requested: i64) -> CartChange {
        if self.is_authorized(&product.id) || requested <= product.available_stock {
            self.set_line(&product, requested);
            info!(
                session_id = %self.id,
                product_id = %product.id,
                quantity = requested,
                total = %self.total(),
                "Cart line applied"
            );
            return CartChange::Applied;
        }

        let gate = StockAuthorizationGate::open(product, requested);
        let notice = gate.notice().clone();
        warn!(
            session_id = %self.id,
            product_id = %notice.product_id,
            available = notice.available,
            requested = notice.requested,
            "Stock shortfall, authorization required"
        );
        self.gate = Some(gate);
        CartChange::AuthorizationRequired(notice)
    }

    /// Sets the product's line to `quantity`, creating it if needed. The
    /// stock snapshot follows the latest known availability; name and
    /// price stay frozen from the first add.
    fn set_line(&mut self, product: &ProductSnapshot, quantity: i64) {
        match self.lines.iter_mut().find(|l| l.product_id == product.id) {
            Some(line) => {
                line.quantity = quantity;
                line.stock_snapshot = product.available_stock;
            }
            None => self.lines.push(CartLine::from_product(product, quantity)),
        }
    }
}

impl Default for CartSession {
    fn default() -> Self {
        Self::new(GatePolicy::default())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::gate::GateState;
    use crate::test_support::{product, FakeAuth};

    #[test]
    fn test_total_is_sum_of_lines() {
        let mut cart = CartSession::default();
        cart.add_line(&product("a", "Café", 2550, 10), 3).unwrap();
        cart.add_line(&product("b", "Pan", 1000, 10), 1).unwrap();

        assert_eq!(cart.total(), Money::from_cents(8650));
        assert_eq!(cart.total().to_string(), "86.50");
    }

    #[test]
    fn test_same_product_merges() {
        let mut cart = CartSession::default();
        let p = product("a", "Café", 2550, 10);
        cart.add_line(&p, 2).unwrap();
        cart.add_line(&p, 3).unwrap();

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.requested_quantity("a"), 5);
    }

    #[test]
    fn test_shortfall_opens_gate_without_mutation() {
        let mut cart = CartSession::default();
        let coke = product("coke", "Coca-Cola", 800, 5);
        cart.add_line(&coke, 4).unwrap();

        let change = cart.add_line(&coke, 4).unwrap();
        match change {
            CartChange::AuthorizationRequired(notice) => {
                assert_eq!(notice.available, 5);
                assert_eq!(notice.requested, 8);
                assert_eq!(notice.shortfall, 3);
            }
            CartChange::Applied => panic!("expected authorization"),
        }
        assert_eq!(cart.requested_quantity("coke"), 4);
        assert!(cart.open_gate().is_some());
    }

    #[test]
    fn test_gate_blocks_every_mutation() {
        let mut cart = CartSession::default();
        let coke = product("coke", "Coca-Cola", 800, 1);
        let pan = product("pan", "Pan", 100, 50);
        cart.add_line(&pan, 1).unwrap();
        cart.add_line(&coke, 2).unwrap();

        assert!(matches!(cart.add_line(&pan, 1), Err(CoreError::GateBusy { .. })));
        assert!(matches!(
            cart.update_quantity("pan", 3),
            Err(CoreError::GateBusy { .. })
        ));
        assert!(matches!(cart.remove_line("pan"), Err(CoreError::GateBusy { .. })));
    }

    #[test]
    fn test_cancel_leaves_cart_untouched() {
        let mut cart = CartSession::default();
        let coke = product("coke", "Coca-Cola", 800, 0);
        cart.add_line(&coke, 1).unwrap();
        cart.cancel_authorization().unwrap();

        assert!(cart.is_empty());
        assert!(cart.open_gate().is_none());
        assert!(matches!(cart.cancel_authorization(), Err(CoreError::NoOpenGate)));
    }

    #[tokio::test]
    async fn test_full_override_flow() {
        let mut cart = CartSession::default();
        let coke = product("coke", "Coca-Cola", 800, 5);
        let auth = FakeAuth::accepting("admin", "1234");

        cart.add_line(&coke, 8).unwrap();
        assert_eq!(cart.confirm_availability(3).unwrap(), 8);
        assert_eq!(
            cart.open_gate().map(|g| g.state()),
            Some(GateState::AdminAuthorize {
                candidate_quantity: 8
            })
        );

        cart.authorize_override(&auth, "admin", "1234").await.unwrap();

        assert!(cart.open_gate().is_none());
        assert!(cart.is_authorized("coke"));
        assert_eq!(cart.requested_quantity("coke"), 8);
        assert_eq!(cart.override_grant("coke").unwrap().granted_by, "admin");

        // Authorized products skip the stock check from now on.
        assert_eq!(cart.add_line(&coke, 10).unwrap(), CartChange::Applied);
        assert_eq!(cart.requested_quantity("coke"), 18);
    }

    #[tokio::test]
    async fn test_rejected_credential_closes_gate() {
        let mut cart = CartSession::default();
        let coke = product("coke", "Coca-Cola", 800, 2);
        cart.add_line(&coke, 2).unwrap();
        cart.add_line(&coke, 1).unwrap();
        cart.confirm_availability(1).unwrap();

        let auth = FakeAuth::accepting("admin", "1234");
        let err = cart
            .authorize_override(&auth, "admin", "wrong")
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::AdminAuthorizationRejected { .. }));
        assert!(cart.open_gate().is_none());
        assert!(!cart.is_authorized("coke"));
        assert_eq!(cart.requested_quantity("coke"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_credential_check_closes_gate() {
        let mut cart = CartSession::default();
        let coke = product("coke", "Coca-Cola", 800, 2);
        cart.add_line(&coke, 2).unwrap();
        cart.add_line(&coke, 3).unwrap();
        cart.confirm_availability(3).unwrap();

        let auth = FakeAuth::accepting("admin", "1234").with_delay(Duration::from_secs(5));
        let handle = cart.gate_cancel_handle().unwrap();

        let (outcome, _) = tokio::join!(
            cart.authorize_override(&auth, "admin", "1234"),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                handle.cancel();
            }
        );

        assert!(matches!(outcome, Err(CoreError::GateCancelled)));
        assert_eq!(auth.calls(), 1);
        assert!(cart.open_gate().is_none());
        assert!(cart.gate_cancel_handle().is_none());
        assert!(!cart.is_authorized("coke"));
        assert_eq!(cart.requested_quantity("coke"), 2);
    }

    #[tokio::test]
    async fn test_blank_identity_keeps_gate_open() {
        let mut cart = CartSession::default();
        cart.add_line(&product("coke", "Coca-Cola", 800, 0), 1).unwrap();
        cart.confirm_availability(1).unwrap();

        let auth = FakeAuth::accepting("admin", "1234");
        let err = cart.authorize_override(&auth, "", "1234").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(cart.open_gate().is_some());
    }

    #[tokio::test]
    async fn test_remove_line_revokes_override() {
        let mut cart = CartSession::default();
        let coke = product("coke", "Coca-Cola", 800, 0);
        let auth = FakeAuth::accepting("admin", "1234");

        cart.add_line(&coke, 2).unwrap();
        cart.confirm_availability(2).unwrap();
        cart.authorize_override(&auth, "admin", "1234").await.unwrap();
        assert!(cart.is_authorized("coke"));

        cart.remove_line("coke").unwrap();
        assert!(!cart.is_authorized("coke"));

        let change = cart.add_line(&coke, 1).unwrap();
        assert!(matches!(change, CartChange::AuthorizationRequired(_)));
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = CartSession::default();
        cart.add_line(&product("a", "Café", 2550, 10), 3).unwrap();
        assert_eq!(cart.update_quantity("a", 0).unwrap(), CartChange::Applied);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_checks_snapshot() {
        let mut cart = CartSession::default();
        cart.add_line(&product("a", "Café", 2550, 4), 1).unwrap();

        assert_eq!(cart.update_quantity("a", 4).unwrap(), CartChange::Applied);
        assert!(matches!(
            cart.update_quantity("a", 5).unwrap(),
            CartChange::AuthorizationRequired(_)
        ));
        assert_eq!(cart.requested_quantity("a"), 4);
    }

    #[test]
    fn test_update_quantity_validation() {
        let mut cart = CartSession::default();
        cart.add_line(&product("a", "Café", 2550, 10), 1).unwrap();

        assert!(matches!(
            cart.update_quantity("a", -1),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            cart.update_quantity("missing", 1),
            Err(CoreError::ProductNotInCart(_))
        ));
    }

    #[test]
    fn test_limits() {
        let mut cart = CartSession::default();
        let p = product("a", "Café", 100, 5000);
        cart.add_line(&p, 999).unwrap();
        assert!(cart.add_line(&p, 1).is_err());

        let mut cart = CartSession::default();
        for i in 0..100 {
            cart.add_line(&product(&format!("p{i}"), "X", 100, 10), 1)
                .unwrap();
        }
        assert!(cart.add_line(&product("extra", "X", 100, 10), 1).is_err());
    }

    #[tokio::test]
    async fn test_clear_drops_everything() {
        let mut cart = CartSession::default();
        let auth = FakeAuth::accepting("admin", "1234");
        let coke = product("coke", "Coca-Cola", 800, 0);
        cart.add_line(&coke, 1).unwrap();
        cart.confirm_availability(1).unwrap();
        cart.authorize_override(&auth, "admin", "1234").await.unwrap();
        cart.add_line(&product("pan", "Pan", 100, 0), 1).unwrap();
        assert!(cart.open_gate().is_some());

        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.open_gate().is_none());
        assert!(!cart.is_authorized("coke"));
        assert_eq!(cart.total(), Money::zero());
    }
}
