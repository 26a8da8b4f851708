//! # closure-precheck
//!
//! Runs the inventory integrity pre-check and prints the theoretical totals
//! for a period, without creating a closure.
//!
//! ```text
//! closure-precheck [START END]      RFC3339, default: the last 24 hours
//!
//! CAJA_OPERATOR_ID     required, the user running the check
//! CAJA_OPERATOR_NAME   optional, defaults to CAJA_OPERATOR_ID
//!
//! exit 0  clear to close
//! exit 2  blocked by negative stock (every product listed)
//! exit 1  configuration, validation or backend failure
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use caja_client::{init_tracing, BackendConfig, RestBackend};
use caja_core::{CashClosureCalculator, ClosurePeriod, CoreError, OperatorSession};
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

fn parse_period(args: &[String]) -> Result<ClosurePeriod, String> {
    match args {
        [] => {
            let end = Utc::now();
            Ok(ClosurePeriod {
                start: end - Duration::hours(24),
                end,
            })
        }
        [start, end] => Ok(ClosurePeriod {
            start: parse_instant(start)?,
            end: parse_instant(end)?,
        }),
        _ => Err("usage: closure-precheck [START END]".to_string()),
    }
}

fn operator_from(lookup: impl Fn(&str) -> Option<String>) -> Result<OperatorSession, String> {
    let user_id = lookup("CAJA_OPERATOR_ID")
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| "CAJA_OPERATOR_ID must name the operator running the check".to_string())?;
    let display_name = lookup("CAJA_OPERATOR_NAME")
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| user_id.clone());
    Ok(OperatorSession::new(user_id, display_name))
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("'{}' is not an RFC3339 timestamp: {}", raw, e))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let period = match parse_period(&args) {
        Ok(period) => period,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let operator = match operator_from(|key| std::env::var(key).ok()) {
        Ok(operator) => operator,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let config = match BackendConfig::load(None) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration rejected");
            return ExitCode::FAILURE;
        }
    };
    let backend = match RestBackend::new(&config) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            error!(error = %e, "Backend client could not be built");
            return ExitCode::FAILURE;
        }
    };

    let calculator = CashClosureCalculator::new(
        backend.clone(),
        backend.clone(),
        backend,
        config.closure_policy(),
    );

    info!(
        store = %config.store.name,
        terminal = %config.store.terminal_id,
        operator = %operator.user_id,
        "Running closure pre-check"
    );

    match calculator.start(period, &operator).await {
        Ok(worksheet) => {
            let snapshot = worksheet.theoretical();
            println!("Inventory integrity: OK");
            println!("Store:  {} / {}", config.store.name, config.store.terminal_id);
            println!("Period: {} → {}", period.start, period.end);
            println!("  Sales:        {:>12}", snapshot.totals.sales.to_string());
            println!("  Returns:      {:>12}", snapshot.totals.returns.to_string());
            println!("  Net:          {:>12}", snapshot.totals.net.to_string());
            println!("  Transactions: {:>12}", snapshot.metrics.transactions);
            println!("  Customers:    {:>12}", snapshot.metrics.customers);
            println!("  Avg. ticket:  {:>12}", snapshot.metrics.average_ticket.to_string());
            for line in &snapshot.payment_breakdown {
                println!(
                    "  {:<20} {:>12} ({} tx)",
                    line.method.name,
                    line.amount.to_string(),
                    line.count
                );
            }
            ExitCode::SUCCESS
        }
        Err(CoreError::IntegrityBlocked { products }) => {
            println!("Closure blocked: {} product(s) with negative stock", products.len());
            for product in &products {
                println!("  {} {:<30} {}", product.id, product.name, product.current_stock);
            }
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, category = ?e.category(), "Pre-check failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn test_operator_comes_from_environment() {
        let operator = operator_from(env(&[
            ("CAJA_OPERATOR_ID", "u-42"),
            ("CAJA_OPERATOR_NAME", "María López"),
            ("CAJA_TERMINAL_ID", "caja-07"),
        ]))
        .unwrap();
        assert_eq!(operator.user_id, "u-42");
        assert_eq!(operator.display_name, "María López");
    }

    #[test]
    fn test_operator_name_defaults_to_id() {
        let operator = operator_from(env(&[("CAJA_OPERATOR_ID", "u-42")])).unwrap();
        assert_eq!(operator.display_name, "u-42");
    }

    #[test]
    fn test_missing_operator_is_refused() {
        assert!(operator_from(env(&[])).is_err());
        assert!(operator_from(env(&[("CAJA_OPERATOR_ID", "  ")])).is_err());
        assert!(operator_from(env(&[("CAJA_OPERATOR_NAME", "Ana")])).is_err());
    }

    #[test]
    fn test_period_arguments() {
        let period = parse_period(&[
            "2026-10-01T08:00:00Z".to_string(),
            "2026-10-01T20:00:00Z".to_string(),
        ])
        .unwrap();
        assert_eq!(period.end - period.start, Duration::hours(12));
        assert!(parse_period(&["2026-10-01".to_string()]).is_err());
    }
}
