//! # Cash Closure
//!
//! End-of-period reconciliation of theoretical totals against what the
//! operator counted.
//!
//! ## Reconciliation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   CashClosureCalculator                                 │
//! │                                                                         │
//! │  start(period)                                                         │
//! │    ├── 1. pre-check: any negative stock? ──► IntegrityBlocked (stop)   │
//! │    └── 2. theoretical fetch ──► ClosureWorksheet                       │
//! │                                                                         │
//! │  ClosureWorksheet (local, no I/O)                                      │
//! │    ├── 3. record_actual(method, amount, count, notes)                  │
//! │    ├── 4. set_denomination(face, kind, qty)                            │
//! │    └── 5. summary(): per-method difference, total difference, %        │
//! │                                                                         │
//! │  create(worksheet)                                                     │
//! │    ├── build payload (cash count policy, qty > 0 denominations)        │
//! │    ├── pre-check AGAIN ──► IntegrityBlocked (nothing persisted)        │
//! │    └── ClosurePersistence::create_closure ──► CashClosure (Pending)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Formulas
//! ```text
//! difference(method)    = actual − theoretical      (+ overage, − shortage)
//! actual_total          = Σ actual
//! total_difference      = actual_total − theoretical_net
//! difference_percentage = net == 0 ? 0 : total_difference / net × 100
//! subtotal(denomination)= face_value × quantity
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use crate::collaborators::{ClosurePersistence, InventoryService, SalesAggregation};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::session::OperatorSession;
use crate::types::{
    CashClosure, ClosurePeriod, Denomination, DenominationKind, DiscrepancyKind, NewClosure,
    PaymentMethodBreakdown, Percentage, StockIntegrityReport, TheoreticalSnapshot,
    TheoreticalTotals,
};
use crate::validation::{
    validate_count, validate_denomination_quantity, validate_entered_amount, validate_face_value,
    validate_notes, validate_period, validate_required,
};

// =============================================================================
// Policy
// =============================================================================

/// Whether the denomination count must equal the cash method's actual.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashCountPolicy {
    /// The variance is reported; the closure can still be created.
    #[default]
    Informational,
    /// The closure cannot be created while the variance is non-zero.
    RequireMatch,
}

/// One entry of the denomination catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DenominationSpec {
    pub face_value: Money,
    pub kind: DenominationKind,
}

/// Closure settings handed in by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosurePolicy {
    pub cash_count: CashCountPolicy,
    pub denominations: Vec<DenominationSpec>,
}

impl Default for ClosurePolicy {
    fn default() -> Self {
        ClosurePolicy {
            cash_count: CashCountPolicy::default(),
            denominations: quetzal_denominations(),
        }
    }
}

/// Guatemalan Quetzal bills and coins.
pub fn quetzal_denominations() -> Vec<DenominationSpec> {
    const BILLS: [i64; 7] = [20000, 10000, 5000, 2000, 1000, 500, 100];
    const COINS: [i64; 6] = [100, 50, 25, 10, 5, 1];

    let bills = BILLS.iter().map(|&cents| DenominationSpec {
        face_value: Money::from_cents(cents),
        kind: DenominationKind::Bill,
    });
    let coins = COINS.iter().map(|&cents| DenominationSpec {
        face_value: Money::from_cents(cents),
        kind: DenominationKind::Coin,
    });
    bills.chain(coins).collect()
}

// =============================================================================
// Worksheet
// =============================================================================

/// What the operator entered for one payment method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ActualEntry {
    pub amount: Money,
    pub count: Option<i64>,
    pub notes: Option<String>,
}

/// Display summary of a worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosureSummary {
    pub period: ClosurePeriod,
    pub theoretical: TheoreticalTotals,
    pub actual_total: Money,
    pub total_difference: Money,
    pub difference_percentage: Percentage,
    pub discrepancy: DiscrepancyKind,
    pub cash_counted_total: Money,
    /// `cash_counted_total − cash actual`; `None` without a cash method.
    pub cash_count_variance: Option<Money>,
    pub breakdowns: Vec<PaymentMethodBreakdown>,
}

/// A closure being prepared. Holds the theoretical snapshot fetched at
/// start plus everything the operator enters; nothing here does I/O.
#[derive(Debug, Clone)]
pub struct ClosureWorksheet {
    period: ClosurePeriod,
    cashier_name: String,
    snapshot: TheoreticalSnapshot,
    actuals: HashMap<String, ActualEntry>,
    denominations: Vec<Denomination>,
    cash_count: CashCountPolicy,
    notes: Option<String>,
}

impl ClosureWorksheet {
    pub fn new(
        period: ClosurePeriod,
        cashier_name: String,
        snapshot: TheoreticalSnapshot,
        policy: &ClosurePolicy,
    ) -> Self {
        let denominations = policy
            .denominations
            .iter()
            .map(|spec| Denomination {
                face_value: spec.face_value,
                kind: spec.kind,
                quantity: 0,
            })
            .collect();

        ClosureWorksheet {
            period,
            cashier_name,
            snapshot,
            actuals: HashMap::new(),
            denominations,
            cash_count: policy.cash_count,
            notes: None,
        }
    }

    pub fn period(&self) -> &ClosurePeriod {
        &self.period
    }

    pub fn theoretical(&self) -> &TheoreticalSnapshot {
        &self.snapshot
    }

    /// Records the counted amount for one payment method. Re-recording
    /// replaces the previous entry.
    pub fn record_actual(
        &mut self,
        payment_method_id: &str,
        amount: Money,
        count: Option<i64>,
        notes: Option<&str>,
    ) -> CoreResult<()> {
        if !self
            .snapshot
            .payment_breakdown
            .iter()
            .any(|l| l.method.id == payment_method_id)
        {
            return Err(ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: self
                    .snapshot
                    .payment_breakdown
                    .iter()
                    .map(|l| l.method.id.clone())
                    .collect(),
            }
            .into());
        }

        validate_entered_amount("actual amount", amount)?;
        if let Some(count) = count {
            validate_count("actual count", count)?;
        }
        let notes = validate_notes(notes)?;

        debug!(payment_method_id, amount = %amount, "Actual recorded");
        self.actuals.insert(
            payment_method_id.to_string(),
            ActualEntry {
                amount,
                count,
                notes,
            },
        );
        Ok(())
    }

    /// Sets how many of one catalog bill or coin were counted.
    pub fn set_denomination(
        &mut self,
        face_value: Money,
        kind: DenominationKind,
        quantity: i64,
    ) -> CoreResult<()> {
        validate_face_value(face_value)?;
        validate_denomination_quantity(quantity)?;

        let slot = self
            .denominations
            .iter_mut()
            .find(|d| d.face_value == face_value && d.kind == kind)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "denomination".to_string(),
                reason: format!("{} {:?} is not in the catalog", face_value, kind),
            })?;
        slot.quantity = quantity;
        Ok(())
    }

    pub fn set_notes(&mut self, notes: Option<&str>) -> CoreResult<()> {
        self.notes = validate_notes(notes)?;
        Ok(())
    }

    pub fn denominations(&self) -> &[Denomination] {
        &self.denominations
    }

    /// Theoretical vs actual per method. Methods without an entry count as
    /// actual zero.
    pub fn breakdowns(&self) -> Vec<PaymentMethodBreakdown> {
        self.snapshot
            .payment_breakdown
            .iter()
            .map(|line| {
                let entry = self.actuals.get(&line.method.id);
                let actual_amount = entry.map(|e| e.amount).unwrap_or_default();
                PaymentMethodBreakdown {
                    payment_method_id: line.method.id.clone(),
                    name: line.method.name.clone(),
                    category: line.method.category,
                    theoretical_amount: line.amount,
                    theoretical_count: line.count,
                    actual_amount,
                    actual_count: entry.and_then(|e| e.count).unwrap_or(0),
                    difference: actual_amount - line.amount,
                    notes: entry.and_then(|e| e.notes.clone()),
                }
            })
            .collect()
    }

    /// Σ(face_value × quantity).
    pub fn cash_counted_total(&self) -> Money {
        self.denominations.iter().map(Denomination::subtotal).sum()
    }

    /// Actual amount entered for cash-category methods, if there is one.
    pub fn cash_actual(&self) -> Option<Money> {
        let mut cash = self
            .snapshot
            .payment_breakdown
            .iter()
            .filter(|l| l.method.category.is_cash())
            .peekable();
        cash.peek()?;
        Some(
            cash.map(|l| self.actuals.get(&l.method.id).map(|e| e.amount).unwrap_or_default())
                .sum(),
        )
    }

    pub fn cash_count_variance(&self) -> Option<Money> {
        self.cash_actual()
            .map(|actual| self.cash_counted_total() - actual)
    }

    pub fn actual_total(&self) -> Money {
        self.actuals.values().map(|e| e.amount).sum()
    }

    /// `actual_total − theoretical_net`.
    pub fn total_difference(&self) -> Money {
        self.actual_total() - self.snapshot.totals.net
    }

    pub fn difference_percentage(&self) -> Percentage {
        self.total_difference().percentage_of(self.snapshot.totals.net)
    }

    pub fn summary(&self) -> ClosureSummary {
        let total_difference = self.total_difference();
        ClosureSummary {
            period: self.period,
            theoretical: self.snapshot.totals,
            actual_total: self.actual_total(),
            total_difference,
            difference_percentage: self.difference_percentage(),
            discrepancy: DiscrepancyKind::of(total_difference),
            cash_counted_total: self.cash_counted_total(),
            cash_count_variance: self.cash_count_variance(),
            breakdowns: self.breakdowns(),
        }
    }

    /// Builds the creation payload. Purely local.
    pub fn build_payload(&self) -> CoreResult<NewClosure> {
        let cashier_name = validate_required("cashier name", &self.cashier_name)?;

        if self.cash_count == CashCountPolicy::RequireMatch {
            if let Some(variance) = self.cash_count_variance().filter(|v| !v.is_zero()) {
                warn!(variance = %variance, "Cash count does not match cash actual");
                return Err(ValidationError::InvalidFormat {
                    field: "cash count".to_string(),
                    reason: format!(
                        "denomination total {} differs from cash actual by {}",
                        self.cash_counted_total(),
                        variance
                    ),
                }
                .into());
            }
        }

        Ok(NewClosure {
            period: self.period,
            cashier_name,
            theoretical: self.snapshot.totals,
            metrics: self.snapshot.metrics,
            actual_total: self.actual_total(),
            difference: self.total_difference(),
            difference_percentage: self.difference_percentage(),
            notes: self.notes.clone(),
            payment_breakdowns: self.breakdowns(),
            denominations: self
                .denominations
                .iter()
                .filter(|d| d.quantity > 0)
                .copied()
                .collect(),
        })
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// Runs the pre-check, fetches theoretical data and creates closures.
pub struct CashClosureCalculator {
    inventory: Arc<dyn InventoryService>,
    sales: Arc<dyn SalesAggregation>,
    persistence: Arc<dyn ClosurePersistence>,
    policy: ClosurePolicy,
}

impl CashClosureCalculator {
    pub fn new(
        inventory: Arc<dyn InventoryService>,
        sales: Arc<dyn SalesAggregation>,
        persistence: Arc<dyn ClosurePersistence>,
        policy: ClosurePolicy,
    ) -> Self {
        CashClosureCalculator {
            inventory,
            sales,
            persistence,
            policy,
        }
    }

    pub fn policy(&self) -> &ClosurePolicy {
        &self.policy
    }

    /// Inventory integrity pre-check. Fails with every negative-stock
    /// product listed.
    pub async fn precheck(&self) -> CoreResult<StockIntegrityReport> {
        let report = self.inventory.stock_integrity().await.map_err(|e| {
            error!(error = %e, "Stock integrity check failed");
            CoreError::from(e)
        })?;

        if !report.is_valid() {
            warn!(
                count = report.negative_products.len(),
                "Closure blocked by negative stock"
            );
            return Err(CoreError::IntegrityBlocked {
                products: report.negative_products,
            });
        }
        Ok(report)
    }

    /// Opens a worksheet for `period`: pre-check, then theoretical fetch.
    pub async fn start(
        &self,
        period: ClosurePeriod,
        session: &OperatorSession,
    ) -> CoreResult<ClosureWorksheet> {
        let period = validate_period(period.start, period.end)?;
        debug!(start = %period.start, end = %period.end, cashier = %session.user_id, "Starting closure");

        self.precheck().await?;

        let snapshot = self.sales.theoretical_totals(&period).await.map_err(|e| {
            error!(error = %e, "Theoretical totals fetch failed");
            CoreError::from(e)
        })?;
        debug!(
            net = %snapshot.totals.net,
            methods = snapshot.payment_breakdown.len(),
            "Theoretical totals loaded"
        );

        Ok(ClosureWorksheet::new(
            period,
            session.display_name.clone(),
            snapshot,
            &self.policy,
        ))
    }

    /// Builds the payload, re-runs the pre-check, then persists.
    pub async fn create(&self, worksheet: &ClosureWorksheet) -> CoreResult<CashClosure> {
        let payload = worksheet.build_payload()?;
        self.precheck().await?;

        let closure = self.persistence.create_closure(&payload).await.map_err(|e| {
            error!(error = %e, ambiguous = e.is_ambiguous(), "Closure creation failed");
            CoreError::from(e)
        })?;

        info!(
            closure_id = %closure.id,
            closure_number = %closure.closure_number,
            difference = %payload.difference,
            percentage = %payload.difference_percentage,
            "Closure created"
        );
        Ok(closure)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
