//! # caja-client: REST Adapter for the Caja Back Office
//!
//! Connects caja-core to the back-office backend.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   backoffice.toml ─┐                                                    │
//! │   CAJA_* env ──────┼──► BackendConfig ──► GatePolicy / ClosurePolicy    │
//! │   defaults ────────┘          │                 (plain values → core)   │
//! │                               ▼                                         │
//! │                         HttpClient (reqwest, bearer token)              │
//! │                               │                                         │
//! │                               ▼                                         │
//! │   JSON body ──► unwrap_envelope ──► wire::<payload>() ──► domain type  │
//! │                                                                         │
//! │   RestBackend: impl SalesAggregation, InventoryService, AuthValidator, │
//! │                SalePersistence, ClosurePersistence, RolePermission     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use caja_client::{BackendConfig, RestBackend};
//! use caja_core::CashClosureCalculator;
//!
//! # fn main() -> Result<(), caja_client::ClientError> {
//! let config = BackendConfig::load(None)?;
//! let backend = Arc::new(RestBackend::new(&config)?);
//! let calculator = CashClosureCalculator::new(
//!     backend.clone(),
//!     backend.clone(),
//!     backend,
//!     config.closure_policy(),
//! );
//! # let _ = calculator;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod telemetry;
pub mod wire;

pub use backend::RestBackend;
pub use config::BackendConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpClient;
pub use telemetry::init_tracing;
