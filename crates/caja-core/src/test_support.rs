//! # Test Support
//!
//! In-memory collaborator fakes shared by the unit tests of every module.
//! Each fake counts its calls so tests can assert that local validation
//! short-circuits before any collaborator is reached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::collaborators::{
    AuthValidator, ClosurePersistence, CollaboratorError, CollaboratorResult, InventoryService,
    RolePermission, SalePersistence, SalesAggregation,
};
use crate::money::Money;
use crate::session::OperatorSession;
use crate::types::*;

// =============================================================================
// Fixtures
// =============================================================================

pub fn product(id: &str, name: &str, price_cents: i64, stock: i64) -> ProductSnapshot {
    ProductSnapshot {
        id: id.to_string(),
        name: name.to_string(),
        unit_price: Money::from_cents(price_cents),
        available_stock: stock,
    }
}

pub fn cashier() -> OperatorSession {
    OperatorSession::new("u-cashier", "Ana López")
}

pub fn supervisor() -> OperatorSession {
    OperatorSession::new("u-super", "Carlos Pérez")
}

pub fn method(id: &str, name: &str, category: PaymentCategory) -> PaymentMethod {
    PaymentMethod {
        id: id.to_string(),
        name: name.to_string(),
        category,
    }
}

pub fn cash_method() -> PaymentMethod {
    method("pm-cash", "Efectivo", PaymentCategory::Cash)
}

pub fn card_method() -> PaymentMethod {
    method("pm-card", "Tarjeta", PaymentCategory::Card)
}

/// A fixed eight-hour shift.
pub fn shift() -> ClosurePeriod {
    ClosurePeriod {
        start: Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2026, 3, 2, 16, 0, 0).unwrap(),
    }
}

// =============================================================================
// Auth
// =============================================================================

pub struct FakeAuth {
    identity: String,
    credential: String,
    delay: Option<Duration>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeAuth {
    pub fn accepting(identity: &str, credential: &str) -> Self {
        FakeAuth {
            identity: identity.to_string(),
            credential: credential.to_string(),
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        FakeAuth {
            fail: true,
            ..FakeAuth::accepting("", "")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthValidator for FakeAuth {
    async fn validate(&self, identity: &str, credential: &str) -> CollaboratorResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(CollaboratorError::Unavailable("auth service down".into()));
        }
        Ok(identity == self.identity && credential == self.credential)
    }
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Default)]
pub struct FakeInventory {
    stock: Mutex<HashMap<String, i64>>,
    negatives: Mutex<Vec<NegativeStockProduct>>,
    fail_availability: Mutex<Option<CollaboratorError>>,
    availability_calls: AtomicUsize,
    integrity_calls: AtomicUsize,
    last_query: Mutex<Vec<String>>,
}

impl FakeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stock(self, product_id: &str, units: i64) -> Self {
        self.set_stock(product_id, units);
        self
    }

    pub fn set_stock(&self, product_id: &str, units: i64) {
        self.stock
            .lock()
            .unwrap()
            .insert(product_id.to_string(), units);
    }

    pub fn with_negative(self, id: &str, name: &str, current_stock: i64) -> Self {
        self.add_negative(id, name, current_stock);
        self
    }

    pub fn add_negative(&self, id: &str, name: &str, current_stock: i64) {
        self.negatives.lock().unwrap().push(NegativeStockProduct {
            id: id.to_string(),
            name: name.to_string(),
            current_stock,
        });
    }

    pub fn fail_availability_with(&self, err: CollaboratorError) {
        *self.fail_availability.lock().unwrap() = Some(err);
    }

    pub fn availability_calls(&self) -> usize {
        self.availability_calls.load(Ordering::SeqCst)
    }

    pub fn integrity_calls(&self) -> usize {
        self.integrity_calls.load(Ordering::SeqCst)
    }

    /// Product ids sent in the most recent availability query.
    pub fn last_query(&self) -> Vec<String> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl InventoryService for FakeInventory {
    async fn stock_integrity(&self) -> CollaboratorResult<StockIntegrityReport> {
        self.integrity_calls.fetch_add(1, Ordering::SeqCst);
        Ok(StockIntegrityReport {
            negative_products: self.negatives.lock().unwrap().clone(),
        })
    }

    async fn available_stock(
        &self,
        product_ids: &[String],
    ) -> CollaboratorResult<HashMap<String, i64>> {
        self.availability_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = product_ids.to_vec();
        if let Some(err) = self.fail_availability.lock().unwrap().clone() {
            return Err(err);
        }
        let stock = self.stock.lock().unwrap();
        Ok(product_ids
            .iter()
            .filter_map(|id| stock.get(id).map(|units| (id.clone(), *units)))
            .collect())
    }
}

// =============================================================================
// Sales Aggregation
// =============================================================================

pub struct FakeSales {
    snapshot: TheoreticalSnapshot,
    calls: AtomicUsize,
}

impl FakeSales {
    pub fn new(snapshot: TheoreticalSnapshot) -> Self {
        FakeSales {
            snapshot,
            calls: AtomicUsize::new(0),
        }
    }

    /// Net 1000.00 split into 700.00 cash (40 tx) and 300.00 card (10 tx).
    pub fn standard_day() -> Self {
        FakeSales::new(TheoreticalSnapshot {
            totals: TheoreticalTotals::new(Money::from_major(1100), Money::from_major(100)),
            metrics: ClosureMetrics {
                transactions: 50,
                customers: 45,
                average_ticket: Money::from_major(20),
            },
            payment_breakdown: vec![
                TheoreticalPaymentLine {
                    method: cash_method(),
                    amount: Money::from_major(700),
                    count: 40,
                },
                TheoreticalPaymentLine {
                    method: card_method(),
                    amount: Money::from_major(300),
                    count: 10,
                },
            ],
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SalesAggregation for FakeSales {
    async fn theoretical_totals(
        &self,
        _period: &ClosurePeriod,
    ) -> CollaboratorResult<TheoreticalSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.clone())
    }
}

// =============================================================================
// Sale Persistence
// =============================================================================

#[derive(Default)]
pub struct FakeSaleStore {
    created: Mutex<Vec<SaleDraft>>,
    fail_with: Mutex<Option<CollaboratorError>>,
}

impl FakeSaleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, err: CollaboratorError) {
        *self.fail_with.lock().unwrap() = Some(err);
    }

    pub fn created(&self) -> Vec<SaleDraft> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl SalePersistence for FakeSaleStore {
    async fn create_sale(&self, draft: &SaleDraft) -> CollaboratorResult<PersistedSale> {
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        let mut created = self.created.lock().unwrap();
        created.push(draft.clone());
        Ok(PersistedSale {
            id: format!("sale-{}", created.len()),
            status: "completed".to_string(),
        })
    }
}

// =============================================================================
// Closure Persistence
// =============================================================================

#[derive(Default)]
pub struct FakeClosureStore {
    created: Mutex<Vec<NewClosure>>,
    patches: Mutex<Vec<(String, StatusPatch)>>,
    patch_error: Mutex<Option<CollaboratorError>>,
}

impl FakeClosureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> Vec<NewClosure> {
        self.created.lock().unwrap().clone()
    }

    pub fn patches(&self) -> Vec<(String, StatusPatch)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn fail_patch_with(&self, err: CollaboratorError) {
        *self.patch_error.lock().unwrap() = Some(err);
    }
}

/// A pending closure as the backend would return it.
pub fn pending_closure(id: &str) -> CashClosure {
    CashClosure {
        id: id.to_string(),
        closure_number: "CC-0001".to_string(),
        period: shift(),
        cashier_name: "Ana López".to_string(),
        theoretical: TheoreticalTotals::new(Money::from_major(1000), Money::zero()),
        metrics: ClosureMetrics::default(),
        payment_breakdowns: Vec::new(),
        denominations: Vec::new(),
        actual_total: Money::from_major(950),
        difference: Money::from_major(-50),
        difference_percentage: Percentage::from_bps(-500),
        notes: None,
        status: ClosureStatus::Pending,
        supervisor_name: None,
        approval_timestamp: None,
        rejection_reason: None,
        signature: None,
    }
}

#[async_trait]
impl ClosurePersistence for FakeClosureStore {
    async fn create_closure(&self, payload: &NewClosure) -> CollaboratorResult<CashClosure> {
        let mut created = self.created.lock().unwrap();
        created.push(payload.clone());
        Ok(CashClosure {
            id: format!("cc-{}", created.len()),
            closure_number: format!("CC-{:04}", created.len()),
            period: payload.period,
            cashier_name: payload.cashier_name.clone(),
            theoretical: payload.theoretical,
            metrics: payload.metrics,
            payment_breakdowns: payload.payment_breakdowns.clone(),
            denominations: payload.denominations.clone(),
            actual_total: payload.actual_total,
            difference: payload.difference,
            difference_percentage: payload.difference_percentage,
            notes: payload.notes.clone(),
            status: ClosureStatus::Pending,
            supervisor_name: None,
            approval_timestamp: None,
            rejection_reason: None,
            signature: None,
        })
    }

    async fn update_status(
        &self,
        closure_id: &str,
        patch: &StatusPatch,
    ) -> CollaboratorResult<CashClosure> {
        if let Some(err) = self.patch_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.patches
            .lock()
            .unwrap()
            .push((closure_id.to_string(), patch.clone()));
        Ok(CashClosure {
            status: patch.status,
            supervisor_name: Some(patch.supervisor_name.clone()),
            approval_timestamp: Some(patch.decided_at),
            rejection_reason: patch.rejection_reason.clone(),
            signature: patch.signature.clone(),
            ..pending_closure(closure_id)
        })
    }
}

// =============================================================================
// Roles
// =============================================================================

pub struct FakeRoles {
    non_seller: bool,
    calls: AtomicUsize,
}

impl FakeRoles {
    pub fn supervisor() -> Self {
        FakeRoles {
            non_seller: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn seller() -> Self {
        FakeRoles {
            non_seller: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RolePermission for FakeRoles {
    async fn is_non_seller(&self, _session: &OperatorSession) -> CollaboratorResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.non_seller)
    }
}
