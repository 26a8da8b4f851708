//! # Domain Types
//!
//! Core domain types shared by the cart, the submission validator and the
//! cash closure engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  SALE SIDE                          CLOSURE SIDE                        │
//! │  ┌─────────────────┐               ┌──────────────────────────┐        │
//! │  │ ProductSnapshot │               │ ClosurePeriod [start,end)│        │
//! │  │ CartLine        │               │ TheoreticalSnapshot      │        │
//! │  │ OverrideGrant   │               │ PaymentMethodBreakdown   │        │
//! │  │ SaleDraft       │──► persisted  │ Denomination             │        │
//! │  │ PersistedSale   │               │ NewClosure ──► CashClosure│       │
//! │  └─────────────────┘               │ ClosureStatus            │        │
//! │                                     └──────────────────────────┘        │
//! │  SHARED: Money, Percentage, PaymentMethod, StockShortage               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Cart lines freeze name, price and the stock level seen at add time so the
//! cart stays consistent even if the catalog changes mid-sale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Percentage
// =============================================================================

/// Signed percentage in basis points (1 bp = 0.01%).
///
/// ## Why Basis Points?
/// -500 bps = -5.00% is exact; a float would not be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percentage(i64);

impl Percentage {
    /// Creates a percentage from basis points.
    #[inline]
    pub const fn from_bps(bps: i64) -> Self {
        Percentage(bps)
    }

    /// Returns the value in basis points.
    #[inline]
    pub const fn bps(&self) -> i64 {
        self.0
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Percentage::zero()
    }
}

/// Renders "-5.00%".
impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}%", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

// =============================================================================
// Product (as seen by the cart)
// =============================================================================

/// The catalog facts the cart needs about a product at the moment it is
/// scanned or picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSnapshot {
    pub id: String,
    pub name: String,
    pub unit_price: Money,
    /// Units the inventory reports as available right now.
    pub available_stock: i64,
}

// =============================================================================
// Cart Line
// =============================================================================

/// A line in the in-progress sale.
///
/// ## Invariants
/// - `quantity > 0`
/// - `unit_price`, `name` and `stock_snapshot` are frozen copies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    /// Product name at time of adding (frozen).
    pub name: String,
    /// Unit price at time of adding (frozen).
    pub unit_price: Money,
    pub quantity: i64,
    /// Available stock the inventory reported when the line was added or
    /// last updated.
    pub stock_snapshot: i64,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Creates a new line from a product and quantity.
    pub fn from_product(product: &ProductSnapshot, quantity: i64) -> Self {
        CartLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.unit_price,
            quantity,
            stock_snapshot: product.available_stock,
            added_at: Utc::now(),
        }
    }

    /// Line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Stock Override Authorization
// =============================================================================

/// A per-session grant allowing a product to be sold beyond recorded stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OverrideGrant {
    pub product_id: String,
    /// Administrator identity that approved the override.
    pub granted_by: String,
    #[ts(as = "String")]
    pub granted_at: DateTime<Utc>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// Payment method category. Only `Cash` takes tendered amounts and a
/// denomination count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentCategory {
    Cash,
    Card,
    Transfer,
    Other,
}

impl PaymentCategory {
    #[inline]
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentCategory::Cash)
    }
}

/// A payment method configured in the back office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    pub category: PaymentCategory,
}

// =============================================================================
// Sale Draft
// =============================================================================

/// Customer data printed on the invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInfo {
    pub name: String,
    /// Tax identification number ("CF" for final consumer).
    pub tax_id: Option<String>,
    pub email: Option<String>,
}

/// Frozen line of a submitted sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub line_total: Money,
}

impl From<&CartLine> for SaleLine {
    fn from(line: &CartLine) -> Self {
        SaleLine {
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            line_total: line.line_total(),
        }
    }
}

/// The immutable sale handed to Sale Persistence.
///
/// Built only by the submission validator; fields are read-only outside
/// this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDraft {
    pub session_id: String,
    pub cashier_id: String,
    pub cashier_name: String,
    pub customer: CustomerInfo,
    pub payment_method_id: String,
    pub payment_category: PaymentCategory,
    pub lines: Vec<SaleLine>,
    pub total: Money,
    /// Cash only.
    pub amount_received: Option<Money>,
    /// Cash only: `max(0, amount_received − total)`.
    pub change: Option<Money>,
    /// Audit trail: products sold under a stock override.
    pub authorized_override_product_ids: Vec<String>,
    pub override_grants: Vec<OverrideGrant>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// What Sale Persistence returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PersistedSale {
    pub id: String,
    pub status: String,
}

// =============================================================================
// Stock Reports
// =============================================================================

/// One product that blocks a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockShortage {
    pub product_id: String,
    pub name: String,
    pub available: i64,
    pub requested: i64,
}

/// One product with negative recorded stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NegativeStockProduct {
    pub id: String,
    pub name: String,
    pub current_stock: i64,
}

/// Result of the inventory integrity check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockIntegrityReport {
    pub negative_products: Vec<NegativeStockProduct>,
}

impl StockIntegrityReport {
    /// True when no product has negative stock.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.negative_products.is_empty()
    }
}

// =============================================================================
// Closure Period & Theoretical Data
// =============================================================================

/// Half-open reconciliation window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosurePeriod {
    #[ts(as = "String")]
    pub start: DateTime<Utc>,
    #[ts(as = "String")]
    pub end: DateTime<Utc>,
}

/// Period totals computed by the Sales Aggregation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TheoreticalTotals {
    pub sales: Money,
    pub returns: Money,
    /// Always `sales − returns`.
    pub net: Money,
}

impl TheoreticalTotals {
    /// Builds totals with `net` derived from sales and returns.
    pub fn new(sales: Money, returns: Money) -> Self {
        TheoreticalTotals {
            sales,
            returns,
            net: sales - returns,
        }
    }
}

/// Period activity metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosureMetrics {
    pub transactions: i64,
    pub customers: i64,
    pub average_ticket: Money,
}

/// Expected amount per payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TheoreticalPaymentLine {
    pub method: PaymentMethod,
    pub amount: Money,
    pub count: i64,
}

/// Everything the aggregation service reports for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TheoreticalSnapshot {
    pub totals: TheoreticalTotals,
    pub metrics: ClosureMetrics,
    pub payment_breakdown: Vec<TheoreticalPaymentLine>,
}

// =============================================================================
// Payment Breakdown & Denominations
// =============================================================================

/// Direction of a discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    Balanced,
    /// More counted than expected.
    Overage,
    /// Less counted than expected.
    Shortage,
}

impl DiscrepancyKind {
    pub fn of(difference: Money) -> Self {
        if difference.is_positive() {
            DiscrepancyKind::Overage
        } else if difference.is_negative() {
            DiscrepancyKind::Shortage
        } else {
            DiscrepancyKind::Balanced
        }
    }
}

/// Theoretical vs actual for one payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentMethodBreakdown {
    pub payment_method_id: String,
    pub name: String,
    pub category: PaymentCategory,
    pub theoretical_amount: Money,
    pub theoretical_count: i64,
    pub actual_amount: Money,
    pub actual_count: i64,
    /// `actual_amount − theoretical_amount`.
    pub difference: Money,
    pub notes: Option<String>,
}

impl PaymentMethodBreakdown {
    pub fn discrepancy(&self) -> DiscrepancyKind {
        DiscrepancyKind::of(self.difference)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DenominationKind {
    Bill,
    Coin,
}

/// Count of one bill or coin value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Denomination {
    pub face_value: Money,
    pub kind: DenominationKind,
    pub quantity: i64,
}

impl Denomination {
    /// `face_value × quantity`.
    #[inline]
    pub fn subtotal(&self) -> Money {
        self.face_value.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Closure Status
// =============================================================================

/// Closure approval status.
///
/// ## Canonical Vocabulary
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Pending ──approve──► Approved   (terminal)                             │
/// │     │                                                                   │
/// │     └────reject────► Rejected    (terminal)                             │
/// │                                                                         │
/// │  Backend spellings accepted on ingestion:                              │
/// │    "pending"                          → Pending                         │
/// │    "approved" | "validated" | "closed" → Approved                       │
/// │    "rejected"                         → Rejected                        │
/// │    anything else                      → payload rejected                │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ClosureStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ClosureStatus {
    /// Approved and Rejected accept no further transition.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClosureStatus::Pending)
    }

    /// Maps any spelling the backend has used to the canonical set.
    pub fn from_backend(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(ClosureStatus::Pending),
            "approved" | "validated" | "closed" => Some(ClosureStatus::Approved),
            "rejected" => Some(ClosureStatus::Rejected),
            _ => None,
        }
    }

    /// The spelling sent in status patches.
    pub fn as_backend_str(&self) -> &'static str {
        match self {
            ClosureStatus::Pending => "pending",
            ClosureStatus::Approved => "approved",
            ClosureStatus::Rejected => "rejected",
        }
    }
}

// =============================================================================
// Cash Closure
// =============================================================================

/// A persisted reconciliation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashClosure {
    pub id: String,
    pub closure_number: String,
    pub period: ClosurePeriod,
    pub cashier_name: String,
    pub theoretical: TheoreticalTotals,
    pub metrics: ClosureMetrics,
    pub payment_breakdowns: Vec<PaymentMethodBreakdown>,
    pub denominations: Vec<Denomination>,
    pub actual_total: Money,
    /// `actual_total − theoretical.net`.
    pub difference: Money,
    pub difference_percentage: Percentage,
    pub notes: Option<String>,
    pub status: ClosureStatus,
    pub supervisor_name: Option<String>,
    #[ts(as = "Option<String>")]
    pub approval_timestamp: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub signature: Option<String>,
}

/// Closure creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewClosure {
    pub period: ClosurePeriod,
    pub cashier_name: String,
    pub theoretical: TheoreticalTotals,
    pub metrics: ClosureMetrics,
    pub actual_total: Money,
    pub difference: Money,
    pub difference_percentage: Percentage,
    pub notes: Option<String>,
    pub payment_breakdowns: Vec<PaymentMethodBreakdown>,
    /// Only denominations with `quantity > 0`.
    pub denominations: Vec<Denomination>,
}

/// Single atomic status change sent to Closure Persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusPatch {
    pub status: ClosureStatus,
    pub supervisor_name: String,
    pub signature: Option<String>,
    pub rejection_reason: Option<String>,
    #[ts(as = "String")]
    pub decided_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, price_cents: i64, stock: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: id.to_string(),
            name: format!("Product {}", id),
            unit_price: Money::from_cents(price_cents),
            available_stock: stock,
        }
    }

    #[test]
    fn test_cart_line_total() {
        let line = CartLine::from_product(&product("a", 2550, 10), 3);
        assert_eq!(line.line_total(), Money::from_cents(7650));
        assert_eq!(line.stock_snapshot, 10);
    }

    #[test]
    fn test_denomination_subtotal() {
        let q100 = Denomination {
            face_value: Money::from_major(100),
            kind: DenominationKind::Bill,
            quantity: 3,
        };
        assert_eq!(q100.subtotal(), Money::from_major(300));
    }

    #[test]
    fn test_theoretical_net_is_derived() {
        let totals = TheoreticalTotals::new(Money::from_major(1200), Money::from_major(200));
        assert_eq!(totals.net, Money::from_major(1000));
    }

    #[test]
    fn test_discrepancy_kind() {
        assert_eq!(DiscrepancyKind::of(Money::from_cents(1)), DiscrepancyKind::Overage);
        assert_eq!(DiscrepancyKind::of(Money::from_cents(-1)), DiscrepancyKind::Shortage);
        assert_eq!(DiscrepancyKind::of(Money::zero()), DiscrepancyKind::Balanced);
    }

    #[test]
    fn test_closure_status_vocabulary() {
        assert_eq!(ClosureStatus::from_backend("Pending"), Some(ClosureStatus::Pending));
        assert_eq!(ClosureStatus::from_backend("validated"), Some(ClosureStatus::Approved));
        assert_eq!(ClosureStatus::from_backend("CLOSED"), Some(ClosureStatus::Approved));
        assert_eq!(ClosureStatus::from_backend("rejected"), Some(ClosureStatus::Rejected));
        assert_eq!(ClosureStatus::from_backend("archived"), None);
        assert!(!ClosureStatus::Pending.is_terminal());
        assert!(ClosureStatus::Approved.is_terminal());
        assert!(ClosureStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_percentage_display() {
        assert_eq!(Percentage::from_bps(-500).to_string(), "-5.00%");
        assert_eq!(Percentage::from_bps(1234).to_string(), "12.34%");
        assert_eq!(Percentage::from_bps(-5).to_string(), "-0.05%");
    }
}
