//! # Back Office Configuration
//!
//! Loads backend, gate, closure and store settings.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAJA_BACKEND_URL=https://api.tienda.gt                             │
//! │     CAJA_AUTH_TIMEOUT_SECS=20                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/backoffice/backoffice.toml (Linux)                       │
//! │     ~/Library/Application Support/com.caja.backoffice/... (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost backend, 30 s credential timeout, Quetzal catalog        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # backoffice.toml
//! [backend]
//! base_url = "https://api.tienda.gt"
//! request_timeout_secs = 15
//!
//! [gate]
//! auth_timeout_secs = 30
//!
//! [closure]
//! cash_count_policy = "informational"  # informational | require_match
//!
//! [[closure.denominations]]
//! face_value_cents = 20000
//! kind = "bill"
//!
//! [store]
//! name = "Tienda Central"
//! terminal_id = "caja-01"
//! ```
//!
//! caja-core never sees this type; it receives [`GatePolicy`] and
//! [`ClosurePolicy`] built from it.

use std::path::PathBuf;
use std::time::Duration;

use caja_core::closure::{quetzal_denominations, DenominationSpec};
use caja_core::{CashCountPolicy, ClosurePolicy, DenominationKind, GatePolicy, Money};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};

/// Config file name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "backoffice.toml";

// =============================================================================
// Backend Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the REST backend (http or https).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Bearer token sent on every request.
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            api_token: None,
        }
    }
}

// =============================================================================
// Gate Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSettings {
    /// Bound on the administrator credential check (seconds).
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,
}

fn default_auth_timeout() -> u64 {
    30
}

impl Default for GateSettings {
    fn default() -> Self {
        GateSettings {
            auth_timeout_secs: default_auth_timeout(),
        }
    }
}

// =============================================================================
// Closure Settings
// =============================================================================

/// One catalog entry as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenominationEntry {
    pub face_value_cents: i64,
    pub kind: DenominationKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureSettings {
    #[serde(default)]
    pub cash_count_policy: CashCountPolicy,

    #[serde(default = "default_denominations")]
    pub denominations: Vec<DenominationEntry>,
}

fn default_denominations() -> Vec<DenominationEntry> {
    quetzal_denominations()
        .into_iter()
        .map(|spec| DenominationEntry {
            face_value_cents: spec.face_value.cents(),
            kind: spec.kind,
        })
        .collect()
}

impl Default for ClosureSettings {
    fn default() -> Self {
        ClosureSettings {
            cash_count_policy: CashCountPolicy::default(),
            denominations: default_denominations(),
        }
    }
}

// =============================================================================
// Store Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_name")]
    pub name: String,

    /// Identifies this terminal in logs.
    #[serde(default = "default_terminal_id")]
    pub terminal_id: String,
}

fn default_store_name() -> String {
    "Caja".to_string()
}

fn default_terminal_id() -> String {
    "caja-01".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: default_store_name(),
            terminal_id: default_terminal_id(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete back-office configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub gate: GateSettings,

    #[serde(default)]
    pub closure: ClosureSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

impl BackendConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (backoffice.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading back-office config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load back-office config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_toml_str(contents: &str) -> ClientResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        let url = &self.backend.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ClientError::InvalidUrl(format!(
                "Backend URL must start with http:// or https://, got: {}",
                url
            )));
        }

        if self.backend.request_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.gate.auth_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "auth_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.closure.denominations.is_empty() {
            return Err(ClientError::InvalidConfig(
                "denomination catalog must not be empty".into(),
            ));
        }

        let mut seen = Vec::with_capacity(self.closure.denominations.len());
        for entry in &self.closure.denominations {
            if entry.face_value_cents <= 0 {
                return Err(ClientError::InvalidConfig(format!(
                    "denomination face value must be positive, got {}",
                    entry.face_value_cents
                )));
            }
            if seen.contains(entry) {
                return Err(ClientError::InvalidConfig(format!(
                    "duplicate denomination: {} {:?}",
                    Money::from_cents(entry.face_value_cents),
                    entry.kind
                )));
            }
            seen.push(*entry);
        }

        Ok(())
    }

    /// Applies `CAJA_*` overrides. `lookup` is `std::env::var` in
    /// production.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CAJA_BACKEND_URL") {
            debug!(url = %url, "Overriding backend URL from environment");
            self.backend.base_url = url;
        }

        if let Some(token) = lookup("CAJA_API_TOKEN") {
            self.backend.api_token = Some(token);
        }

        if let Some(secs) = lookup("CAJA_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.backend.request_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid CAJA_REQUEST_TIMEOUT_SECS"),
            }
        }

        if let Some(secs) = lookup("CAJA_AUTH_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => {
                    debug!(secs = s, "Overriding credential timeout from environment");
                    self.gate.auth_timeout_secs = s;
                }
                Err(_) => warn!(value = %secs, "Ignoring invalid CAJA_AUTH_TIMEOUT_SECS"),
            }
        }

        if let Some(policy) = lookup("CAJA_CASH_COUNT_POLICY") {
            match policy.to_lowercase().replace('-', "_").as_str() {
                "informational" => self.closure.cash_count_policy = CashCountPolicy::Informational,
                "require_match" => self.closure.cash_count_policy = CashCountPolicy::RequireMatch,
                _ => warn!(policy = %policy, "Unknown cash count policy in environment"),
            }
        }

        if let Some(id) = lookup("CAJA_TERMINAL_ID") {
            self.store.terminal_id = id;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "caja", "backoffice")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Core Policies
    // =========================================================================

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy {
            auth_timeout: Duration::from_secs(self.gate.auth_timeout_secs),
        }
    }

    pub fn closure_policy(&self) -> ClosurePolicy {
        ClosurePolicy {
            cash_count: self.closure.cash_count_policy,
            denominations: self
                .closure
                .denominations
                .iter()
                .map(|e| DenominationSpec {
                    face_value: Money::from_cents(e.face_value_cents),
                    kind: e.kind,
                })
                .collect(),
        }
    }
}
