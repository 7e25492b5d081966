//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::config::AppConfig;
use crate::market::{HttpMarketData, MarketData, portfolio_items};
use alm_core::{
    AlmError, AlmStore, Database, NewUser, PortfolioSummary, Role, SarimaOrder, SeasonalOrder,
    UserId, forecast_series, hash_password, total_allocation, validate_registration,
    validate_steps,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// How often the server sweeps expired market data from the cache.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
///
/// `host` and `port` override the configured bind address.
pub async fn cmd_server(
    db_path: &Path,
    backend: &str,
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), AlmError> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let mut db = open_database(db_path, backend)?;
    let seeded = db.initialize_stocks()?;
    if seeded > 0 {
        tracing::info!(count = seeded, "Seeded stock catalog");
    }

    println!("ALM Service Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Backend:  {}", backend);
    println!("  Database: {}", db_path.display());
    println!();
    println!("Endpoints:");
    println!("  GET  /docs                 - Interactive API documentation");
    println!("  POST /api/v1/auth/login    - Log in");
    println!("  GET  /api/v1/portfolio/:id - Portfolio with market metrics");
    println!("  POST /api/v1/forecast/sarima - SARIMA forecast");
    println!("  GET  /health               - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let market = Arc::new(HttpMarketData::new(config.market.clone()));
    spawn_cache_sweeper(Arc::clone(&market));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(db, market, config);
    api::run_server(&addr, state).await
}

fn spawn_cache_sweeper(market: Arc<HttpMarketData>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = market.cleanup_cache().await;
            if removed > 0 {
                tracing::debug!(removed, "Expired market data evicted");
            }
        }
    });
}

// =============================================================================
// STORE COMMANDS
// =============================================================================

/// Create a fresh database and seed the stock catalog.
pub fn cmd_init(db_path: &Path, backend: &str, force: bool) -> Result<(), AlmError> {
    if backend == "redb" && db_path.exists() {
        if !force {
            return Err(AlmError::Conflict(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path).map_err(|e| {
            AlmError::Io(format!("Cannot remove '{}': {}", db_path.display(), e))
        })?;
    }

    let mut db = open_database(db_path, backend)?;
    let seeded = db.initialize_stocks()?;

    if db.is_persistent() {
        println!("Initialized new redb database at {}", db_path.display());
    } else {
        println!("Initialized in-memory database (nothing is persisted)");
    }
    println!("Seeded {} stocks", seeded);
    Ok(())
}

/// Seed the stock catalog of an existing database.
pub fn cmd_seed(db_path: &Path, backend: &str, json_mode: bool) -> Result<(), AlmError> {
    let mut db = open_database(db_path, backend)?;
    let inserted = db.initialize_stocks()?;
    let total = db.all_stocks()?.len();

    if json_mode {
        let output = serde_json::json!({ "inserted": inserted, "total": total });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        return Ok(());
    }

    if inserted == 0 {
        println!("Stock catalog already populated ({} stocks)", total);
    } else {
        println!("Inserted {} stocks", inserted);
    }
    Ok(())
}

/// Create a user account.
pub fn cmd_create_user(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    email: &str,
    name: &str,
    password: &str,
    admin: bool,
) -> Result<(), AlmError> {
    validate_registration(email, name, password)?;

    let mut db = open_database(db_path, backend)?;
    let role = if admin { Role::Admin } else { Role::User };
    let id = db.create_user(NewUser {
        email: email.to_string(),
        name: name.to_string(),
        password_hash: hash_password(password),
        role,
    })?;

    if json_mode {
        let output = serde_json::json!({ "user_id": id.0, "email": email, "role": role });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
    } else {
        println!("Created {} {} ({})", role, id, email);
    }
    Ok(())
}

// =============================================================================
// MARKET COMMANDS
// =============================================================================

/// Print a portfolio with live market metrics.
pub async fn cmd_portfolio(
    db_path: &Path,
    backend: &str,
    config: AppConfig,
    json_mode: bool,
    user: Option<u64>,
) -> Result<(), AlmError> {
    let db = RwLock::new(open_database(db_path, backend)?);
    let market = HttpMarketData::new(config.market);
    let items = portfolio_items(&db, &market, user.map(UserId)).await?;

    if items.is_empty() {
        return Err(AlmError::NotFound(
            "No portfolio entries with market data".to_string(),
        ));
    }

    let summary = PortfolioSummary::from_items(user.unwrap_or(0), &items);

    if json_mode {
        let output = serde_json::json!({
            "user_id": user,
            "portfolio": items,
            "total_allocation": total_allocation(&items),
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        return Ok(());
    }

    match user {
        Some(id) => println!("Portfolio of user {}", id),
        None => println!("Catalog portfolio (mock allocations)"),
    }
    println!("==================");
    println!(
        "{:<10} {:>7} {:>10} {:>9} {:>9}",
        "Ticker", "Alloc", "Price", "Return", "Vol"
    );
    for item in &items {
        println!(
            "{:<10} {:>6.1}% {:>10.2} {:>8.2}% {:>8.2}%",
            item.ticker,
            item.allocation * 100.0,
            item.current_price,
            item.historical_annual_return * 100.0,
            item.historical_annual_volatility * 100.0,
        );
    }
    println!();
    println!("Total allocation:    {:.4}", summary.total_allocation);
    println!("Weighted return:     {:.4}", summary.weighted_annual_return);
    println!("Weighted volatility: {:.4}", summary.weighted_annual_volatility);
    println!("Fully allocated:     {}", summary.is_fully_allocated);
    Ok(())
}

/// Fetch a year of prices and forecast `steps` days.
///
/// `steps` is bounded like the HTTP forecast request.
pub async fn cmd_forecast(
    config: AppConfig,
    json_mode: bool,
    ticker: &str,
    steps: usize,
) -> Result<(), AlmError> {
    validate_steps(steps)?;
    let market = HttpMarketData::new(config.market);
    let history = market
        .history(ticker)
        .await
        .ok_or_else(|| AlmError::NotFound(format!("No price history for {}", ticker)))?;

    let outcome = forecast_series(
        &history,
        steps,
        SarimaOrder::default(),
        SeasonalOrder::default(),
        &mut rand::rng(),
    )?;
    if let Some(reason) = &outcome.fallback_reason {
        tracing::warn!(ticker, reason = %reason, "SARIMA failed, using moving-average fallback");
    }

    if json_mode {
        let output = serde_json::json!({
            "ticker": ticker,
            "forecast_dates": outcome.dates,
            "forecast_values": outcome.values,
            "metrics": outcome.metrics,
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        return Ok(());
    }

    println!("Forecast for {} ({:?})", ticker, outcome.method);
    println!("==================");
    for (date, value) in outcome.dates.iter().zip(&outcome.values) {
        println!("{}  {:>12.4}", date, value);
    }
    println!();
    println!("Last price:    {:.4}", outcome.metrics.last_price);
    println!("Mean forecast: {:.4}", outcome.metrics.mean_forecast);
    if let (Some(aic), Some(bic)) = (outcome.metrics.aic, outcome.metrics.bic) {
        println!("AIC / BIC:     {:.2} / {:.2}", aic, bic);
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the database for the selected backend.
pub fn open_database(db_path: &Path, backend: &str) -> Result<Database, AlmError> {
    match backend {
        "redb" => Database::with_redb(db_path),
        "memory" => Ok(Database::in_memory()),
        other => Err(AlmError::InvalidInput(format!(
            "Unknown backend '{}' (expected redb or memory)",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_database_rejects_unknown_backend() {
        let err = open_database(Path::new("unused"), "file").expect_err("unknown backend");
        assert!(matches!(err, AlmError::InvalidInput(_)));
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("alm.redb");

        cmd_init(&path, "redb", false).expect("first init");
        assert!(cmd_init(&path, "redb", false).is_err());
        cmd_init(&path, "redb", true).expect("forced init");

        let db = open_database(&path, "redb").expect("open");
        assert!(!db.all_stocks().expect("stocks").is_empty());
    }

    #[tokio::test]
    async fn forecast_rejects_horizon_before_fetching() {
        let mut config = AppConfig::default();
        config.market.brapi_base_url = "http://127.0.0.1:9".to_string();

        for steps in [0, 31, usize::MAX] {
            let err = cmd_forecast(config.clone(), true, "PETR4.SA", steps)
                .await
                .expect_err("out of range");
            assert!(matches!(err, AlmError::InvalidInput(_)), "steps = {steps}");
        }
    }

    #[test]
    fn create_user_persists_role() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("alm.redb");

        cmd_create_user(&path, "redb", true, "root@alm.com", "Root", "secret123", true)
            .expect("create");
        let db = open_database(&path, "redb").expect("open");
        let user = db
            .user_by_email("root@alm.com")
            .expect("lookup")
            .expect("user exists");
        assert_eq!(user.role, Role::Admin);
    }
}
