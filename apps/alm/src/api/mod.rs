//! # ALM HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /` - Welcome message
//! - `GET /health` - Health check
//! - `GET /docs` - Swagger UI (`GET /openapi.json` for the raw document)
//! - `POST /api/v1/auth/login` - Log in, receive access and refresh tokens
//! - `POST /api/v1/auth/register` - Register a user
//! - `POST /api/v1/auth/refresh` - Exchange a refresh token
//! - `GET /api/v1/auth/me` - Current user (Bearer access token)
//! - `GET /api/v1/auth/users/{user_id}` - Public user record
//! - `GET /api/v1/portfolio/{user_id}` - Portfolio with market metrics
//! - `PUT /api/v1/portfolio/{user_id}/allocation` - Set a ticker allocation
//! - `DELETE /api/v1/portfolio/{user_id}/stock/{ticker}` - Remove a ticker
//! - `GET /api/v1/portfolio/{user_id}/summary` - Weighted portfolio metrics
//! - `POST /api/v1/forecast/sarima` - SARIMA price forecast
//!
//! ## Security Configuration
//!
//! - `ALM_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all
//!   (default: local frontend dev servers)
//! - `ALM_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `ALM_JWT_SECRET_KEY`: Token signing secret

mod auth;
mod docs;
mod error;
mod handlers;
mod middleware;
mod types;

pub use auth::{Claims, CurrentUser, TokenService, TokenType};
pub use docs::openapi_document;
pub use error::{ApiError, ErrorResponse};
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    AllocationResponse, AllocationUpdate, ForecastRequest, ForecastResponse, HealthResponse,
    LoginRequest, LoginResponse, PortfolioResponse, RefreshRequest, RefreshResponse,
    RegisterRequest, RegisterResponse, RemoveStockResponse, RootResponse, UserJson,
};

use crate::config::AppConfig;
use crate::market::MarketData;
use alm_core::{AlmError, Database};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request bodies above this size are rejected.
const MAX_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<RwLock<Database>>,
    pub market: Arc<dyn MarketData>,
    pub tokens: Arc<TokenService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(db: Database, market: Arc<dyn MarketData>, config: AppConfig) -> Self {
        Self {
            db: Arc::new(RwLock::new(db)),
            market,
            tokens: Arc::new(TokenService::from_config(&config.auth)),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build the CORS layer from the configured origins.
///
/// - `Some("*")`: any origin (development only)
/// - `Some(list)`: comma-separated origins
/// - `None`: the local frontend dev servers
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (ALM_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in ALM_CORS_ORIGINS, using frontend defaults"
                );
                build_frontend_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                    .allow_credentials(true)
            }
        }
        None => build_frontend_cors(),
    }
}

/// Origins of the Vite and React dev servers.
fn build_frontend_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:5173",
        "http://127.0.0.1:5173",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login_handler))
        .route("/register", post(handlers::register_handler))
        .route("/refresh", post(handlers::refresh_handler))
        .route("/me", get(handlers::me_handler))
        .route("/users/{user_id}", get(handlers::user_handler))
}

fn portfolio_routes() -> Router<AppState> {
    Router::new()
        .route("/{user_id}", get(handlers::portfolio_handler))
        .route("/{user_id}/allocation", put(handlers::update_allocation_handler))
        .route("/{user_id}/stock/{ticker}", delete(handlers::remove_stock_handler))
        .route("/{user_id}/summary", get(handlers::summary_handler))
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - global quota (if enabled)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(state.config.http.cors_origins.as_deref());

    let rate_limit = state.config.http.rate_limit;
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let mut router = Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_handler))
        .route("/docs", get(docs::docs_handler))
        .route("/openapi.json", get(docs::openapi_handler))
        .nest("/api/v1/auth", auth_routes())
        .nest("/api/v1/portfolio", portfolio_routes())
        .route("/api/v1/forecast/sarima", post(handlers::sarima_handler));

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and serve until Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), AlmError> {
    if state.config.auth.uses_default_secret() {
        tracing::warn!(
            "⚠️  Using the built-in JWT secret. Set ALM_JWT_SECRET_KEY before exposing the service."
        );
    }
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AlmError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("ALM HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AlmError::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
