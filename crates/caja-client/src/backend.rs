//! # REST Backend
//!
//! Implements every caja-core collaborator trait over HTTP/JSON.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Trait                 Method & path                         Payload   │
//! │  ───────────────────   ───────────────────────────────────   ───────── │
//! │  SalesAggregation      GET   /api/cash-closures/theoretical  wire::    │
//! │  InventoryService      GET   /api/inventory/integrity        one fn    │
//! │                        POST  /api/inventory/availability     per       │
//! │  AuthValidator         POST  /api/auth/validate-admin        payload   │
//! │  SalePersistence       POST  /api/sales                                │
//! │  ClosurePersistence    POST  /api/cash-closures                        │
//! │                        PATCH /api/cash-closures/{id}/status            │
//! │  RolePermission        GET   /api/users/{id}/role                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failures are handed back verbatim as [`CollaboratorError`]. Nothing here
//! retries.

use std::collections::HashMap;

use async_trait::async_trait;
use caja_core::collaborators::{
    AuthValidator, ClosurePersistence, CollaboratorError, CollaboratorResult, InventoryService,
    RolePermission, SalePersistence, SalesAggregation,
};
use caja_core::{
    CashClosure, ClosurePeriod, NewClosure, OperatorSession, PersistedSale, SaleDraft,
    StatusPatch, StockIntegrityReport, TheoreticalSnapshot,
};
use tracing::{debug, error};
use urlencoding::encode;

use crate::config::BackendConfig;
use crate::error::{ClientError, ClientResult};
use crate::http::HttpClient;
use crate::wire::{
    self, AdminCredentialRequest, AvailabilityRequest, ClosureBody, PeriodQuery, SaleBody,
    StatusBody,
};

/// The back-office REST backend.
#[derive(Debug, Clone)]
pub struct RestBackend {
    http: HttpClient,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    pub fn from_client(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

/// Logs a failed call and converts it for the trait boundary.
fn collaborator_error(operation: &'static str, err: ClientError) -> CollaboratorError {
    let err = CollaboratorError::from(err);
    error!(operation, error = %err, ambiguous = err.is_ambiguous(), "Backend call failed");
    err
}

// =============================================================================
// Calls
// =============================================================================

impl RestBackend {
    async fn fetch_theoretical(&self, period: &ClosurePeriod) -> ClientResult<TheoreticalSnapshot> {
        let body = self
            .http
            .get_with_query("/api/cash-closures/theoretical", &PeriodQuery::from(period))
            .await?;
        wire::theoretical_snapshot(body)
    }

    async fn fetch_integrity(&self) -> ClientResult<StockIntegrityReport> {
        let body = self.http.get("/api/inventory/integrity").await?;
        wire::stock_integrity(body)
    }

    async fn fetch_availability(&self, product_ids: &[String]) -> ClientResult<HashMap<String, i64>> {
        let body = self
            .http
            .post("/api/inventory/availability", &AvailabilityRequest { product_ids })
            .await?;
        wire::available_stock(body)
    }

    async fn post_admin_credential(&self, identity: &str, credential: &str) -> ClientResult<bool> {
        let request = AdminCredentialRequest {
            identity,
            credential,
        };
        let body = self.http.post("/api/auth/validate-admin", &request).await?;
        wire::admin_validation(body)
    }

    async fn post_sale(&self, draft: &SaleDraft) -> ClientResult<PersistedSale> {
        let body = self.http.post("/api/sales", &SaleBody::from(draft)).await?;
        wire::persisted_sale(body)
    }

    async fn post_closure(&self, payload: &NewClosure) -> ClientResult<CashClosure> {
        let body = self
            .http
            .post("/api/cash-closures", &ClosureBody::from(payload))
            .await?;
        wire::cash_closure(body)
    }

    async fn patch_status(&self, closure_id: &str, patch: &StatusPatch) -> ClientResult<CashClosure> {
        let path = format!("/api/cash-closures/{}/status", encode(closure_id));
        let body = self.http.patch(&path, &StatusBody::from(patch)).await?;
        wire::cash_closure(body)
    }

    async fn fetch_role(&self, user_id: &str) -> ClientResult<bool> {
        let path = format!("/api/users/{}/role", encode(user_id));
        let body = self.http.get(&path).await?;
        wire::non_seller_role(body)
    }
}

// =============================================================================
// Collaborator Traits
// =============================================================================

#[async_trait]
impl SalesAggregation for RestBackend {
    async fn theoretical_totals(
        &self,
        period: &ClosurePeriod,
    ) -> CollaboratorResult<TheoreticalSnapshot> {
        debug!(start = %period.start, end = %period.end, "Fetching theoretical totals");
        self.fetch_theoretical(period)
            .await
            .map_err(|e| collaborator_error("theoretical_totals", e))
    }
}

#[async_trait]
impl InventoryService for RestBackend {
    async fn stock_integrity(&self) -> CollaboratorResult<StockIntegrityReport> {
        self.fetch_integrity()
            .await
            .map_err(|e| collaborator_error("stock_integrity", e))
    }

    async fn available_stock(
        &self,
        product_ids: &[String],
    ) -> CollaboratorResult<HashMap<String, i64>> {
        debug!(products = product_ids.len(), "Fetching available stock");
        self.fetch_availability(product_ids)
            .await
            .map_err(|e| collaborator_error("available_stock", e))
    }
}

#[async_trait]
impl AuthValidator for RestBackend {
    async fn validate(&self, identity: &str, credential: &str) -> CollaboratorResult<bool> {
        debug!(identity, "Validating administrator credential");
        match self.post_admin_credential(identity, credential).await {
            // 401 means our own API token was refused; 403 refuses the admin.
            Err(ClientError::Forbidden(_)) => Ok(false),
            other => other.map_err(|e| collaborator_error("validate_admin", e)),
        }
    }
}

#[async_trait]
impl SalePersistence for RestBackend {
    async fn create_sale(&self, draft: &SaleDraft) -> CollaboratorResult<PersistedSale> {
        self.post_sale(draft)
            .await
            .map_err(|e| collaborator_error("create_sale", e))
    }
}

#[async_trait]
impl ClosurePersistence for RestBackend {
    async fn create_closure(&self, payload: &NewClosure) -> CollaboratorResult<CashClosure> {
        self.post_closure(payload)
            .await
            .map_err(|e| collaborator_error("create_closure", e))
    }

    async fn update_status(
        &self,
        closure_id: &str,
        patch: &StatusPatch,
    ) -> CollaboratorResult<CashClosure> {
        self.patch_status(closure_id, patch)
            .await
            .map_err(|e| collaborator_error("update_status", e))
    }
}

#[async_trait]
impl RolePermission for RestBackend {
    async fn is_non_seller(&self, session: &OperatorSession) -> CollaboratorResult<bool> {
        self.fetch_role(&session.user_id)
            .await
            .map_err(|e| collaborator_error("role_check", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments_are_encoded() {
        assert_eq!(encode("cc-17"), "cc-17");
        assert_eq!(encode("a/b c"), "a%2Fb%20c");
        assert_eq!(encode("ñ"), "%C3%B1");
    }

    // Nothing listens on port 9; every call must surface as Unavailable
    // rather than a default answer.
    fn unreachable_backend() -> RestBackend {
        let mut config = BackendConfig::default();
        config.backend.base_url = "http://127.0.0.1:9".to_string();
        config.backend.request_timeout_secs = 2;
        RestBackend::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_closed() {
        let backend = unreachable_backend();

        let integrity = backend.stock_integrity().await;
        assert!(matches!(integrity, Err(CollaboratorError::Unavailable(_))));

        let auth = backend.validate("admin", "secret").await;
        assert!(matches!(auth, Err(CollaboratorError::Unavailable(_))));
    }
}
