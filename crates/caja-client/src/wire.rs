//! # Wire Formats
//!
//! One deserializer per backend payload, plus the request bodies sent to
//! the backend.
//!
//! ## Ingestion Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Boundary Normalization                           │
//! │                                                                         │
//! │  Envelope       { "data": X }  ──►  X        (bare X accepted too)     │
//! │                                                                         │
//! │  Money          1000.5 | "1000.50"  ──►  Money (cents)                 │
//! │                 JSON numbers round half away from zero to cents;       │
//! │                 strings must have at most two decimals                 │
//! │  Counts         40 | "40"  ──►  i64   (fractions rejected)             │
//! │  Ids            17 | "cc-17"  ──►  String                              │
//! │                                                                         │
//! │  FAIL-CLOSED DEFAULTS                                                   │
//! │  ─────────────────────                                                  │
//! │  missing / unparseable required field   → payload rejected             │
//! │  admin "valid" missing                  → false                        │
//! │  integrity "valid" missing              → false                        │
//! │  negativeCount ≠ listed negatives       → payload rejected             │
//! │  reported net ≠ sales − returns         → payload rejected             │
//! │  reported difference ≠ actual − net     → payload rejected             │
//! │  unknown closure status                 → payload rejected             │
//! │  unknown denomination kind              → payload rejected             │
//! │  unknown payment category               → Other (never cash)           │
//! │  role missing                           → payload rejected             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing number-or-string ever crosses into caja-core.

use std::collections::HashMap;

use caja_core::{
    CashClosure, ClosureMetrics, ClosurePeriod, ClosureStatus, Denomination, DenominationKind,
    Money, NegativeStockProduct, NewClosure, PaymentCategory, PaymentMethod,
    PaymentMethodBreakdown, Percentage, PersistedSale, SaleDraft, StatusPatch,
    StockIntegrityReport, TheoreticalPaymentLine, TheoreticalSnapshot, TheoreticalTotals,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

use crate::error::{ClientError, ClientResult};

// =============================================================================
// Envelope
// =============================================================================

/// Keys that may sit next to `data` in a response envelope.
const ENVELOPE_KEYS: [&str; 4] = ["data", "success", "message", "meta"];

/// Strips a `{ "data": ... }` envelope. Anything else is returned as is.
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map)
            if map.contains_key("data")
                && map.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str())) =>
        {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(payload: &str, body: Value) -> ClientResult<T> {
    serde_json::from_value(body)
        .map_err(|e| ClientError::InvalidResponse(format!("{}: {}", payload, e)))
}

fn reject(payload: &str, reason: impl std::fmt::Display) -> ClientError {
    ClientError::InvalidResponse(format!("{}: {}", payload, reason))
}

// =============================================================================
// Number-or-String Fields
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(Number),
    Str(String),
}

fn money<'de, D: Deserializer<'de>>(d: D) -> Result<Money, D::Error> {
    let parsed = match NumOrStr::deserialize(d)? {
        NumOrStr::Num(n) => Money::parse_decimal_rounded(&n.to_string()),
        NumOrStr::Str(s) => Money::parse_decimal(&s),
    };
    parsed.map_err(D::Error::custom)
}

/// For figures the backend derives by division (average ticket).
fn derived_money<'de, D: Deserializer<'de>>(d: D) -> Result<Money, D::Error> {
    let raw = match NumOrStr::deserialize(d)? {
        NumOrStr::Num(n) => n.to_string(),
        NumOrStr::Str(s) => s,
    };
    Money::parse_decimal_rounded(&raw).map_err(D::Error::custom)
}

fn opt_money<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Money>, D::Error> {
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "money")] Money);
    Ok(Option::<Wrap>::deserialize(d)?.map(|Wrap(m)| m))
}

fn opt_derived_money<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Money>, D::Error> {
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "derived_money")] Money);
    Ok(Option::<Wrap>::deserialize(d)?.map(|Wrap(m)| m))
}

fn count<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    match NumOrStr::deserialize(d)? {
        NumOrStr::Num(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64))
            .ok_or_else(|| D::Error::custom(format!("'{}' is not a whole number", n))),
        NumOrStr::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("'{}' is not a whole number", s))),
    }
}

fn opt_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "count")] i64);
    Ok(Option::<Wrap>::deserialize(d)?.map(|Wrap(n)| n))
}

fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let raw = match NumOrStr::deserialize(d)? {
        NumOrStr::Num(n) => n.to_string(),
        NumOrStr::Str(s) => s.trim().to_string(),
    };
    if raw.is_empty() {
        return Err(D::Error::custom("empty identifier"));
    }
    Ok(raw)
}

/// Maps any backend spelling to a payment category. Unknown spellings are
/// `Other`, which never takes cash handling.
pub fn payment_category(raw: &str) -> PaymentCategory {
    match raw.trim().to_ascii_lowercase().as_str() {
        "cash" | "efectivo" => PaymentCategory::Cash,
        "card" | "credit_card" | "debit_card" | "tarjeta" => PaymentCategory::Card,
        "transfer" | "bank_transfer" | "transferencia" => PaymentCategory::Transfer,
        _ => PaymentCategory::Other,
    }
}

fn denomination_kind(raw: &str) -> Option<DenominationKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "bill" | "billete" => Some(DenominationKind::Bill),
        "coin" | "moneda" => Some(DenominationKind::Coin),
        _ => None,
    }
}

// =============================================================================
// Theoretical Totals
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TheoreticalDto {
    #[serde(deserialize_with = "money")]
    sales: Money,
    #[serde(deserialize_with = "money")]
    returns: Money,
    #[serde(default, deserialize_with = "opt_money")]
    net: Option<Money>,
    #[serde(deserialize_with = "count")]
    transactions: i64,
    #[serde(deserialize_with = "count")]
    customers: i64,
    #[serde(deserialize_with = "derived_money")]
    average_ticket: Money,
    payment_breakdown: Vec<TheoreticalLineDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TheoreticalLineDto {
    #[serde(deserialize_with = "id")]
    payment_method_id: String,
    name: String,
    #[serde(default)]
    category: String,
    #[serde(deserialize_with = "money")]
    amount: Money,
    #[serde(deserialize_with = "count")]
    count: i64,
}

/// `GET /api/cash-closures/theoretical`
pub fn theoretical_snapshot(body: Value) -> ClientResult<TheoreticalSnapshot> {
    const PAYLOAD: &str = "theoretical totals";
    let dto: TheoreticalDto = decode(PAYLOAD, body)?;

    let totals = TheoreticalTotals::new(dto.sales, dto.returns);
    if let Some(net) = dto.net.filter(|n| *n != totals.net) {
        return Err(reject(
            PAYLOAD,
            format!(
                "net {} disagrees with sales {} − returns {}",
                net, dto.sales, dto.returns
            ),
        ));
    }
    if dto.transactions < 0 || dto.customers < 0 {
        return Err(reject(PAYLOAD, "negative transaction or customer count"));
    }

    let mut payment_breakdown = Vec::with_capacity(dto.payment_breakdown.len());
    for line in dto.payment_breakdown {
        if payment_breakdown
            .iter()
            .any(|l: &TheoreticalPaymentLine| l.method.id == line.payment_method_id)
        {
            return Err(reject(
                PAYLOAD,
                format!("duplicate payment method {}", line.payment_method_id),
            ));
        }
        payment_breakdown.push(TheoreticalPaymentLine {
            method: PaymentMethod {
                category: payment_category(&line.category),
                id: line.payment_method_id,
                name: line.name,
            },
            amount: line.amount,
            count: line.count,
        });
    }

    Ok(TheoreticalSnapshot {
        totals,
        metrics: ClosureMetrics {
            transactions: dto.transactions,
            customers: dto.customers,
            average_ticket: dto.average_ticket,
        },
        payment_breakdown,
    })
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntegrityDto {
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default, alias = "negativeProducts")]
    products: Vec<IntegrityProductDto>,
    #[serde(default, deserialize_with = "opt_count")]
    negative_count: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntegrityProductDto {
    #[serde(deserialize_with = "id")]
    id: String,
    name: String,
    #[serde(deserialize_with = "count")]
    current_stock: i64,
}

/// `GET /api/inventory/integrity`
///
/// Every listed product with stock below zero blocks. The payload is
/// rejected when the blocking products cannot be named: `valid: false` (or
/// missing) with none listed, or a `negativeCount` that disagrees with the
/// list.
pub fn stock_integrity(body: Value) -> ClientResult<StockIntegrityReport> {
    const PAYLOAD: &str = "stock integrity";
    let dto: IntegrityDto = decode(PAYLOAD, body)?;

    let negative_products: Vec<NegativeStockProduct> = dto
        .products
        .into_iter()
        .filter(|p| p.current_stock < 0)
        .map(|p| NegativeStockProduct {
            id: p.id,
            name: p.name,
            current_stock: p.current_stock,
        })
        .collect();

    if let Some(reported) = dto.negative_count {
        if reported != negative_products.len() as i64 {
            return Err(reject(
                PAYLOAD,
                format!(
                    "negativeCount {} disagrees with {} listed product(s)",
                    reported,
                    negative_products.len()
                ),
            ));
        }
    }
    if !dto.valid.unwrap_or(false) && negative_products.is_empty() {
        return Err(reject(
            PAYLOAD,
            "reported invalid without listing products",
        ));
    }

    Ok(StockIntegrityReport { negative_products })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityDto {
    #[serde(deserialize_with = "id")]
    product_id: String,
    #[serde(deserialize_with = "count")]
    available_stock: i64,
}

/// `POST /api/inventory/availability`
pub fn available_stock(body: Value) -> ClientResult<HashMap<String, i64>> {
    const PAYLOAD: &str = "available stock";
    let items: Vec<AvailabilityDto> = decode(PAYLOAD, body)?;

    let mut stock = HashMap::with_capacity(items.len());
    for item in items {
        if stock.insert(item.product_id.clone(), item.available_stock).is_some() {
            return Err(reject(PAYLOAD, format!("duplicate product {}", item.product_id)));
        }
    }
    Ok(stock)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest<'a> {
    pub product_ids: &'a [String],
}

// =============================================================================
// Auth & Roles
// =============================================================================

/// Never logged: carries the credential.
#[derive(Serialize)]
pub struct AdminCredentialRequest<'a> {
    pub identity: &'a str,
    pub credential: &'a str,
}

#[derive(Deserialize)]
struct AdminValidationDto {
    #[serde(default)]
    valid: Option<bool>,
}

/// `POST /api/auth/validate-admin`. Missing `valid` means not valid.
pub fn admin_validation(body: Value) -> ClientResult<bool> {
    let dto: AdminValidationDto = decode("admin validation", body)?;
    Ok(dto.valid.unwrap_or(false))
}

#[derive(Deserialize)]
struct RoleDto {
    role: String,
}

/// Roles that may not approve or reject closures.
const SELLER_ROLES: [&str; 2] = ["seller", "vendedor"];

/// `GET /api/users/{id}/role`. True for any non-empty role other than
/// seller.
pub fn non_seller_role(body: Value) -> ClientResult<bool> {
    let dto: RoleDto = decode("user role", body)?;
    let role = dto.role.trim().to_ascii_lowercase();
    Ok(!role.is_empty() && !SELLER_ROLES.contains(&role.as_str()))
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleBody {
    pub session_id: String,
    pub cashier_id: String,
    pub cashier_name: String,
    pub customer_name: String,
    pub customer_tax_id: Option<String>,
    pub customer_email: Option<String>,
    pub payment_method_id: String,
    pub payment_category: PaymentCategory,
    pub items: Vec<SaleItemBody>,
    pub total: String,
    pub amount_received: Option<String>,
    pub change: Option<String>,
    pub authorized_override_product_ids: Vec<String>,
    pub override_authorizations: Vec<OverrideBody>,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemBody {
    pub product_id: String,
    pub name: String,
    pub unit_price: String,
    pub quantity: i64,
    pub line_total: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideBody {
    pub product_id: String,
    pub authorized_by: String,
    pub authorized_at: String,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl From<&SaleDraft> for SaleBody {
    fn from(draft: &SaleDraft) -> Self {
        SaleBody {
            session_id: draft.session_id.clone(),
            cashier_id: draft.cashier_id.clone(),
            cashier_name: draft.cashier_name.clone(),
            customer_name: draft.customer.name.clone(),
            customer_tax_id: draft.customer.tax_id.clone(),
            customer_email: draft.customer.email.clone(),
            payment_method_id: draft.payment_method_id.clone(),
            payment_category: draft.payment_category,
            items: draft
                .lines
                .iter()
                .map(|l| SaleItemBody {
                    product_id: l.product_id.clone(),
                    name: l.name.clone(),
                    unit_price: l.unit_price.to_string(),
                    quantity: l.quantity,
                    line_total: l.line_total.to_string(),
                })
                .collect(),
            total: draft.total.to_string(),
            amount_received: draft.amount_received.map(|m| m.to_string()),
            change: draft.change.map(|m| m.to_string()),
            authorized_override_product_ids: draft.authorized_override_product_ids.clone(),
            override_authorizations: draft
                .override_grants
                .iter()
                .map(|g| OverrideBody {
                    product_id: g.product_id.clone(),
                    authorized_by: g.granted_by.clone(),
                    authorized_at: timestamp(g.granted_at),
                })
                .collect(),
            notes: draft.notes.clone(),
            created_at: timestamp(draft.created_at),
        }
    }
}

#[derive(Deserialize)]
struct PersistedSaleDto {
    #[serde(deserialize_with = "id")]
    id: String,
    #[serde(default)]
    status: Option<String>,
}

/// `POST /api/sales`. A missing status is recorded as "created".
pub fn persisted_sale(body: Value) -> ClientResult<PersistedSale> {
    let dto: PersistedSaleDto = decode("created sale", body)?;
    Ok(PersistedSale {
        id: dto.id,
        status: dto
            .status
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "created".to_string()),
    })
}

// =============================================================================
// Closures
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureBody {
    pub period_start: String,
    pub period_end: String,
    pub cashier_name: String,
    pub theoretical_total: String,
    pub theoretical_sales: String,
    pub theoretical_returns: String,
    pub actual_total: String,
    pub difference: String,
    pub difference_percentage: String,
    pub total_transactions: i64,
    pub total_customers: i64,
    pub average_ticket: String,
    pub notes: Option<String>,
    pub payment_breakdowns: Vec<BreakdownBody>,
    pub denominations: Vec<DenominationBody>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownBody {
    pub payment_method_id: String,
    pub name: String,
    pub category: PaymentCategory,
    pub theoretical_amount: String,
    pub theoretical_count: i64,
    pub actual_amount: String,
    pub actual_count: i64,
    pub difference: String,
    pub notes: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenominationBody {
    pub face_value: String,
    pub kind: DenominationKind,
    pub quantity: i64,
    pub subtotal: String,
}

/// "-5.00" for -500 bps.
fn percent(p: Percentage) -> String {
    let rendered = p.to_string();
    rendered.trim_end_matches('%').to_string()
}

impl From<&NewClosure> for ClosureBody {
    fn from(c: &NewClosure) -> Self {
        ClosureBody {
            period_start: timestamp(c.period.start),
            period_end: timestamp(c.period.end),
            cashier_name: c.cashier_name.clone(),
            theoretical_total: c.theoretical.net.to_string(),
            theoretical_sales: c.theoretical.sales.to_string(),
            theoretical_returns: c.theoretical.returns.to_string(),
            actual_total: c.actual_total.to_string(),
            difference: c.difference.to_string(),
            difference_percentage: percent(c.difference_percentage),
            total_transactions: c.metrics.transactions,
            total_customers: c.metrics.customers,
            average_ticket: c.metrics.average_ticket.to_string(),
            notes: c.notes.clone(),
            payment_breakdowns: c
                .payment_breakdowns
                .iter()
                .map(|b| BreakdownBody {
                    payment_method_id: b.payment_method_id.clone(),
                    name: b.name.clone(),
                    category: b.category,
                    theoretical_amount: b.theoretical_amount.to_string(),
                    theoretical_count: b.theoretical_count,
                    actual_amount: b.actual_amount.to_string(),
                    actual_count: b.actual_count,
                    difference: b.difference.to_string(),
                    notes: b.notes.clone(),
                })
                .collect(),
            denominations: c
                .denominations
                .iter()
                .filter(|d| d.quantity > 0)
                .map(|d| DenominationBody {
                    face_value: d.face_value.to_string(),
                    kind: d.kind,
                    quantity: d.quantity,
                    subtotal: d.subtotal().to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub status: &'static str,
    pub supervisor_name: String,
    pub signature: Option<String>,
    pub rejection_reason: Option<String>,
    pub approval_timestamp: String,
}

impl From<&StatusPatch> for StatusBody {
    fn from(p: &StatusPatch) -> Self {
        StatusBody {
            status: p.status.as_backend_str(),
            supervisor_name: p.supervisor_name.clone(),
            signature: p.signature.clone(),
            rejection_reason: p.rejection_reason.clone(),
            approval_timestamp: timestamp(p.decided_at),
        }
    }
}

#[derive(Serialize)]
pub struct PeriodQuery {
    pub start: String,
    pub end: String,
}

impl From<&ClosurePeriod> for PeriodQuery {
    fn from(p: &ClosurePeriod) -> Self {
        PeriodQuery {
            start: timestamp(p.start),
            end: timestamp(p.end),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CashClosureDto {
    #[serde(deserialize_with = "id")]
    id: String,
    #[serde(deserialize_with = "id")]
    closure_number: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    cashier_name: String,
    #[serde(deserialize_with = "money")]
    theoretical_sales: Money,
    #[serde(deserialize_with = "money")]
    theoretical_returns: Money,
    #[serde(default, deserialize_with = "opt_money")]
    theoretical_total: Option<Money>,
    #[serde(default, deserialize_with = "opt_count")]
    total_transactions: Option<i64>,
    #[serde(default, deserialize_with = "opt_count")]
    total_customers: Option<i64>,
    #[serde(default, deserialize_with = "opt_derived_money")]
    average_ticket: Option<Money>,
    #[serde(deserialize_with = "money")]
    actual_total: Money,
    #[serde(default, deserialize_with = "opt_money")]
    difference: Option<Money>,
    #[serde(default)]
    notes: Option<String>,
    status: String,
    #[serde(default)]
    supervisor_name: Option<String>,
    #[serde(default)]
    approval_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    rejection_reason: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    payment_breakdowns: Vec<BreakdownDto>,
    #[serde(default)]
    denominations: Vec<DenominationDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BreakdownDto {
    #[serde(deserialize_with = "id")]
    payment_method_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: String,
    #[serde(deserialize_with = "money")]
    theoretical_amount: Money,
    #[serde(default, deserialize_with = "opt_count")]
    theoretical_count: Option<i64>,
    #[serde(deserialize_with = "money")]
    actual_amount: Money,
    #[serde(default, deserialize_with = "opt_count")]
    actual_count: Option<i64>,
    #[serde(default, deserialize_with = "opt_money")]
    difference: Option<Money>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DenominationDto {
    #[serde(deserialize_with = "money")]
    face_value: Money,
    kind: String,
    #[serde(deserialize_with = "count")]
    quantity: i64,
}

/// `POST /api/cash-closures` and `PATCH /api/cash-closures/{id}/status`.
///
/// Derived figures (net, differences, percentage) are recomputed from the
/// reported sales, returns and actuals; a reported value that disagrees
/// rejects the payload.
pub fn cash_closure(body: Value) -> ClientResult<CashClosure> {
    const PAYLOAD: &str = "cash closure";
    let dto: CashClosureDto = decode(PAYLOAD, body)?;

    if dto.period_start >= dto.period_end {
        return Err(reject(PAYLOAD, "period start is not before end"));
    }

    let status = ClosureStatus::from_backend(&dto.status)
        .ok_or_else(|| reject(PAYLOAD, format!("unknown status '{}'", dto.status)))?;

    let theoretical = TheoreticalTotals::new(dto.theoretical_sales, dto.theoretical_returns);
    if let Some(net) = dto.theoretical_total.filter(|n| *n != theoretical.net) {
        return Err(reject(
            PAYLOAD,
            format!("theoretical total {} disagrees with sales − returns {}", net, theoretical.net),
        ));
    }

    let difference = dto.actual_total - theoretical.net;
    if let Some(reported) = dto.difference.filter(|d| *d != difference) {
        return Err(reject(
            PAYLOAD,
            format!("difference {} disagrees with actual − net {}", reported, difference),
        ));
    }

    let mut payment_breakdowns = Vec::with_capacity(dto.payment_breakdowns.len());
    for b in dto.payment_breakdowns {
        let diff = b.actual_amount - b.theoretical_amount;
        if b.difference.is_some_and(|d| d != diff) {
            return Err(reject(
                PAYLOAD,
                format!("difference for {} disagrees with actual − theoretical", b.payment_method_id),
            ));
        }
        payment_breakdowns.push(PaymentMethodBreakdown {
            name: if b.name.is_empty() { b.payment_method_id.clone() } else { b.name },
            payment_method_id: b.payment_method_id,
            category: payment_category(&b.category),
            theoretical_amount: b.theoretical_amount,
            theoretical_count: b.theoretical_count.unwrap_or(0),
            actual_amount: b.actual_amount,
            actual_count: b.actual_count.unwrap_or(0),
            difference: diff,
            notes: b.notes,
        });
    }

    let mut denominations = Vec::with_capacity(dto.denominations.len());
    for d in dto.denominations {
        let kind = denomination_kind(&d.kind)
            .ok_or_else(|| reject(PAYLOAD, format!("unknown denomination kind '{}'", d.kind)))?;
        if d.quantity < 0 || !d.face_value.is_positive() {
            return Err(reject(PAYLOAD, "invalid denomination entry"));
        }
        denominations.push(Denomination {
            face_value: d.face_value,
            kind,
            quantity: d.quantity,
        });
    }

    Ok(CashClosure {
        id: dto.id,
        closure_number: dto.closure_number,
        period: ClosurePeriod {
            start: dto.period_start,
            end: dto.period_end,
        },
        cashier_name: dto.cashier_name,
        theoretical,
        metrics: ClosureMetrics {
            transactions: dto.total_transactions.unwrap_or(0),
            customers: dto.total_customers.unwrap_or(0),
            average_ticket: dto.average_ticket.unwrap_or_default(),
        },
        payment_breakdowns,
        denominations,
        actual_total: dto.actual_total,
        difference,
        difference_percentage: difference.percentage_of(theoretical.net),
        notes: dto.notes,
        status,
        supervisor_name: dto.supervisor_name,
        approval_timestamp: dto.approval_timestamp,
        rejection_reason: dto.rejection_reason,
        signature: dto.signature,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
