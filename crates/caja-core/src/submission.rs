//! # Sale Submission
//!
//! Final atomic check before a sale reaches Sale Persistence.
//!
//! ## Submission Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        submit()                                         │
//! │                                                                         │
//! │  1. LOCAL CHECKS (no network)                                          │
//! │     no open gate · cart not empty · payment method · cash received     │
//! │                │                                                        │
//! │  2. AGGREGATE requested units per product                              │
//! │                │                                                        │
//! │  3. LIVE STOCK for non-overridden products (one call, or none)         │
//! │     any shortage ──► abort, itemized report, cart untouched            │
//! │       within cart-time snapshot → StockChanged (concurrency)           │
//! │       beyond snapshot           → InsufficientStock (validation)       │
//! │                │                                                        │
//! │  4. BUILD SaleDraft (total, change = max(0, received − total))         │
//! │                │                                                        │
//! │  5. PERSIST ──► failure: error surfaced, cart untouched                │
//! │                │                                                        │
//! │  6. CLEAR cart and override grants                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use crate::cart::CartSession;
use crate::collaborators::{InventoryService, SalePersistence};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::session::OperatorSession;
use crate::types::{
    CustomerInfo, PaymentMethod, PersistedSale, SaleDraft, SaleLine, StockShortage,
};
use crate::validation::{validate_entered_amount, validate_notes, validate_required};

/// Checkout details entered by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRequest {
    pub customer: CustomerInfo,
    pub payment_method: Option<PaymentMethod>,
    /// Cash tendered. Required for cash, ignored otherwise.
    pub amount_received: Option<Money>,
    pub notes: Option<String>,
}

/// A sale the backend accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SubmittedSale {
    pub persisted: PersistedSale,
    pub draft: SaleDraft,
}

/// Per-product aggregate across every cart line.
struct ProductDemand {
    name: String,
    requested: i64,
    snapshot: i64,
}

/// Validates a cart against live stock and hands it to persistence.
pub struct SaleSubmitter {
    inventory: Arc<dyn InventoryService>,
    persistence: Arc<dyn SalePersistence>,
}

impl SaleSubmitter {
    pub fn new(inventory: Arc<dyn InventoryService>, persistence: Arc<dyn SalePersistence>) -> Self {
        SaleSubmitter {
            inventory,
            persistence,
        }
    }

    /// Submits the cart. The cart is cleared only after persistence
    /// succeeds.
    pub async fn submit(
        &self,
        cart: &mut CartSession,
        session: &OperatorSession,
        request: SaleRequest,
    ) -> CoreResult<SubmittedSale> {
        debug!(
            session_id = %cart.id(),
            cashier = %session.user_id,
            lines = cart.line_count(),
            "Submitting sale"
        );

        // ---------------------------------------------------------------------
        // Local checks
        // ---------------------------------------------------------------------
        cart.ensure_no_gate()?;
        if cart.is_empty() {
            return Err(ValidationError::Required {
                field: "cart lines".to_string(),
            }
            .into());
        }

        let cashier_id = validate_required("cashier", &session.user_id)?;
        let method = request.payment_method.ok_or_else(|| ValidationError::Required {
            field: "payment method".to_string(),
        })?;

        let total = cart.total();
        let (amount_received, change) = if method.category.is_cash() {
            let received = request.amount_received.ok_or_else(|| ValidationError::Required {
                field: "amount received".to_string(),
            })?;
            validate_entered_amount("amount received", received)?;
            (Some(received), Some(received.saturating_sub_floor_zero(total)))
        } else {
            (None, None)
        };
        let notes = validate_notes(request.notes.as_deref())?;

        // ---------------------------------------------------------------------
        // Live stock
        // ---------------------------------------------------------------------
        let mut demand: BTreeMap<String, ProductDemand> = BTreeMap::new();
        for line in cart.lines() {
            let entry = demand
                .entry(line.product_id.clone())
                .or_insert_with(|| ProductDemand {
                    name: line.name.clone(),
                    requested: 0,
                    snapshot: line.stock_snapshot,
                });
            entry.requested += line.quantity;
            entry.snapshot = entry.snapshot.min(line.stock_snapshot);
        }

        let to_check: Vec<String> = demand
            .keys()
            .filter(|id| !cart.is_authorized(id))
            .cloned()
            .collect();

        if !to_check.is_empty() {
            let live = self.inventory.available_stock(&to_check).await.map_err(|e| {
                error!(session_id = %cart.id(), error = %e, "Live stock query failed");
                CoreError::from(e)
            })?;

            let mut changed = Vec::new();
            let mut insufficient = Vec::new();
            for id in &to_check {
                let Some(d) = demand.get(id) else { continue };
                let available = live.get(id).copied().unwrap_or(0);
                if d.requested <= available {
                    continue;
                }
                let shortage = StockShortage {
                    product_id: id.clone(),
                    name: d.name.clone(),
                    available,
                    requested: d.requested,
                };
                if d.requested <= d.snapshot {
                    changed.push(shortage);
                } else {
                    insufficient.push(shortage);
                }
            }

            if !insufficient.is_empty() {
                insufficient.extend(changed);
                warn!(session_id = %cart.id(), count = insufficient.len(), "Sale blocked: insufficient stock");
                return Err(CoreError::InsufficientStock {
                    shortages: insufficient,
                });
            }
            if !changed.is_empty() {
                warn!(session_id = %cart.id(), count = changed.len(), "Sale blocked: stock changed");
                return Err(CoreError::StockChanged { shortages: changed });
            }
        } else {
            debug!(session_id = %cart.id(), "Every product overridden, live stock skipped");
        }

        // ---------------------------------------------------------------------
        // Draft & persist
        // ---------------------------------------------------------------------
        let override_grants = cart.override_grants();
        let draft = SaleDraft {
            session_id: cart.id().to_string(),
            cashier_id,
            cashier_name: session.display_name.clone(),
            customer: request.customer,
            payment_method_id: method.id,
            payment_category: method.category,
            lines: cart.lines().iter().map(SaleLine::from).collect(),
            total,
            amount_received,
            change,
            authorized_override_product_ids: override_grants
                .iter()
                .map(|g| g.product_id.clone())
                .collect(),
            override_grants,
            notes,
            created_at: Utc::now(),
        };

        let persisted = self.persistence.create_sale(&draft).await.map_err(|e| {
            error!(
                session_id = %cart.id(),
                error = %e,
                ambiguous = e.is_ambiguous(),
                "Sale persistence failed"
            );
            CoreError::from(e)
        })?;

        info!(
            session_id = %cart.id(),
            sale_id = %persisted.id,
            total = %draft.total,
            overrides = draft.authorized_override_product_ids.len(),
            "Sale submitted"
        );
        cart.clear();

        Ok(SubmittedSale { persisted, draft })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorError;
    use crate::error::ErrorCategory;
    use crate::test_support::*;

    struct Fixture {
        inventory: Arc<FakeInventory>,
        store: Arc<FakeSaleStore>,
        submitter: SaleSubmitter,
    }

    fn fixture(inventory: FakeInventory) -> Fixture {
        let inventory = Arc::new(inventory);
        let store = Arc::new(FakeSaleStore::new());
        let submitter = SaleSubmitter::new(inventory.clone(), store.clone());
        Fixture {
            inventory,
            store,
            submitter,
        }
    }

    fn cash_request(received_cents: i64) -> SaleRequest {
        SaleRequest {
            customer: CustomerInfo {
                name: "Consumidor Final".to_string(),
                tax_id: Some("CF".to_string()),
                email: None,
            },
            payment_method: Some(cash_method()),
            amount_received: Some(Money::from_cents(received_cents)),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_cash_sale_computes_change_and_clears_cart() {
        let f = fixture(FakeInventory::new().with_stock("a", 10).with_stock("b", 10));
        let mut cart = CartSession::default();
        cart.add_line(&product("a", "Café", 2550, 10), 3).unwrap();
        cart.add_line(&product("b", "Pan", 1000, 10), 1).unwrap();

        let sale = f
            .submitter
            .submit(&mut cart, &cashier(), cash_request(10000))
            .await
            .unwrap();

        assert_eq!(sale.persisted.id, "sale-1");
        assert_eq!(sale.draft.total, Money::from_cents(8650));
        assert_eq!(sale.draft.change, Some(Money::from_cents(1350)));
        assert_eq!(sale.draft.cashier_name, "Ana López");
        assert!(cart.is_empty());
        assert_eq!(f.store.created().len(), 1);
    }

    #[tokio::test]
    async fn test_underpaid_cash_gives_zero_change() {
        let f = fixture(FakeInventory::new().with_stock("a", 10));
        let mut cart = CartSession::default();
        cart.add_line(&product("a", "Café", 2550, 10), 1).unwrap();

        let sale = f
            .submitter
            .submit(&mut cart, &cashier(), cash_request(2000))
            .await
            .unwrap();
        assert_eq!(sale.draft.change, Some(Money::zero()));
    }

    #[tokio::test]
    async fn test_card_sale_has_no_cash_fields() {
        let f = fixture(FakeInventory::new().with_stock("a", 10));
        let mut cart = CartSession::default();
        cart.add_line(&product("a", "Café", 2550, 10), 1).unwrap();

        let request = SaleRequest {
            payment_method: Some(card_method()),
            amount_received: Some(Money::from_major(50)),
            ..SaleRequest::default()
        };
        let sale = f.submitter.submit(&mut cart, &cashier(), request).await.unwrap();
        assert_eq!(sale.draft.amount_received, None);
        assert_eq!(sale.draft.change, None);
    }

    #[tokio::test]
    async fn test_local_checks_run_before_network() {
        let f = fixture(FakeInventory::new());
        let mut cart = CartSession::default();

        let err = f
            .submitter
            .submit(&mut cart, &cashier(), cash_request(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        cart.add_line(&product("a", "Café", 2550, 10), 1).unwrap();
        let no_method = SaleRequest::default();
        assert!(f.submitter.submit(&mut cart, &cashier(), no_method).await.is_err());

        let no_cash = SaleRequest {
            amount_received: None,
            ..cash_request(0)
        };
        assert!(f.submitter.submit(&mut cart, &cashier(), no_cash).await.is_err());

        assert_eq!(f.inventory.availability_calls(), 0);
        assert!(f.store.created().is_empty());
        assert_eq!(cart.line_count(), 1);
    }

    #[tokio::test]
    async fn test_open_gate_blocks_submission() {
        let f = fixture(FakeInventory::new());
        let mut cart = CartSession::default();
        cart.add_line(&product("a", "Café", 2550, 0), 1).unwrap();

        let err = f
            .submitter
            .submit(&mut cart, &cashier(), cash_request(10000))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::GateBusy { .. }));
    }

    #[tokio::test]
    async fn test_stock_drop_is_concurrency_error() {
        let f = fixture(FakeInventory::new().with_stock("coke", 2).with_stock("pan", 10));
        let mut cart = CartSession::default();
        cart.add_line(&product("coke", "Coca-Cola", 800, 5), 4).unwrap();
        cart.add_line(&product("pan", "Pan", 100, 10), 2).unwrap();

        let err = f
            .submitter
            .submit(&mut cart, &cashier(), cash_request(10000))
            .await
            .unwrap_err();

        match &err {
            CoreError::StockChanged { shortages } => {
                assert_eq!(shortages.len(), 1);
                assert_eq!(shortages[0].name, "Coca-Cola");
                assert_eq!(shortages[0].available, 2);
                assert_eq!(shortages[0].requested, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.category(), ErrorCategory::Concurrency);
        assert_eq!(cart.line_count(), 2);
        assert!(f.store.created().is_empty());
    }

    #[tokio::test]
    async fn test_missing_product_counts_as_zero() {
        let f = fixture(FakeInventory::new());
        let mut cart = CartSession::default();
        cart.add_line(&product("ghost", "Fantasma", 100, 3), 1).unwrap();

        let err = f
            .submitter
            .submit(&mut cart, &cashier(), cash_request(10000))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::StockChanged { .. }));
    }

    #[tokio::test]
    async fn test_overridden_products_skip_stock_check() {
        let f = fixture(FakeInventory::new().with_stock("pan", 10));
        let auth = FakeAuth::accepting("admin", "1234");
        let mut cart = CartSession::default();

        cart.add_line(&product("coke", "Coca-Cola", 800, 5), 8).unwrap();
        cart.confirm_availability(3).unwrap();
        cart.authorize_override(&auth, "admin", "1234").await.unwrap();
        cart.add_line(&product("pan", "Pan", 100, 10), 1).unwrap();

        let sale = f
            .submitter
            .submit(&mut cart, &cashier(), cash_request(10000))
            .await
            .unwrap();

        assert_eq!(f.inventory.last_query(), vec!["pan".to_string()]);
        assert_eq!(sale.draft.authorized_override_product_ids, vec!["coke".to_string()]);
        assert_eq!(sale.draft.override_grants[0].granted_by, "admin");
        assert!(!cart.is_authorized("coke"));
    }

    #[tokio::test]
    async fn test_all_overridden_makes_no_inventory_call() {
        let f = fixture(FakeInventory::new());
        let auth = FakeAuth::accepting("admin", "1234");
        let mut cart = CartSession::default();

        cart.add_line(&product("coke", "Coca-Cola", 800, 0), 2).unwrap();
        cart.confirm_availability(2).unwrap();
        cart.authorize_override(&auth, "admin", "1234").await.unwrap();

        f.submitter
            .submit(&mut cart, &cashier(), cash_request(10000))
            .await
            .unwrap();
        assert_eq!(f.inventory.availability_calls(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_cart() {
        let f = fixture(FakeInventory::new().with_stock("a", 10));
        f.store.fail_with(CollaboratorError::Timeout { seconds: 10 });
        let mut cart = CartSession::default();
        cart.add_line(&product("a", "Café", 2550, 10), 1).unwrap();

        let err = f
            .submitter
            .submit(&mut cart, &cashier(), cash_request(10000))
            .await
            .unwrap_err();

        assert!(err.requires_requery());
        assert_eq!(cart.line_count(), 1);
    }

    #[tokio::test]
    async fn test_inventory_failure_surfaces_verbatim() {
        let inventory = FakeInventory::new();
        inventory.fail_availability_with(CollaboratorError::Unavailable("refused".into()));
        let f = fixture(inventory);
        let mut cart = CartSession::default();
        cart.add_line(&product("a", "Café", 2550, 10), 1).unwrap();

        let err = f
            .submitter
            .submit(&mut cart, &cashier(), cash_request(10000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Collaborator(CollaboratorError::Unavailable(_))
        ));
        assert_eq!(cart.line_count(), 1);
    }
}
