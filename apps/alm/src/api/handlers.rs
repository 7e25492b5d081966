//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    auth::{CurrentUser, TokenType},
    error::ApiError,
    types::{
        AllocationResponse, AllocationUpdate, ForecastRequest, ForecastResponse, HealthResponse,
        LoginRequest, LoginResponse, PortfolioResponse, RefreshRequest, RefreshResponse,
        RegisterRequest, RegisterResponse, RemoveStockResponse, RootResponse, UserJson,
    },
};
use crate::market::portfolio_items;
use alm_core::{
    AlmError, AlmStore, NewUser, PortfolioSummary, PublicUser, Role, UserId, forecast_series,
    hash_password, total_allocation, validate_password, validate_registration, verify_password,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

const INVALID_CREDENTIALS: &str = "Email ou senha inválidos";
const USER_NOT_FOUND: &str = "Usuário não encontrado";

// =============================================================================
// SERVICE HANDLERS
// =============================================================================

/// Welcome message.
pub async fn root_handler() -> impl IntoResponse {
    Json(RootResponse::default())
}

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// AUTH HANDLERS
// =============================================================================

/// Authenticate and issue tokens. Creates the default portfolio on first login.
pub async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload?;
    validate_password(&request.password)?;

    let mut db = state.db.write().await;
    let Some(user) = db.user_by_email(&request.email)? else {
        tracing::warn!(event = "auth_failure", reason = "unknown_email", "Login rejected");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };
    if !verify_password(&request.password, &user.password_hash) {
        tracing::warn!(
            event = "auth_failure",
            reason = "wrong_password",
            user_id = user.id.0,
            "Login rejected"
        );
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let token = state.tokens.issue(&user, TokenType::Access)?;
    let refresh_token = state.tokens.issue(&user, TokenType::Refresh)?;

    if db.holdings(user.id)?.is_empty() {
        db.create_default_portfolio(user.id)?;
        tracing::info!(user_id = user.id.0, "Created default portfolio");
    }

    tracing::info!(user_id = user.id.0, "User logged in");
    Ok(Json(LoginResponse {
        user: UserJson::from(&user),
        token,
        refresh_token,
        message: "Login realizado com sucesso".to_string(),
    }))
}

/// Register a regular user.
pub async fn register_handler(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(request) = payload?;
    validate_registration(&request.email, &request.name, &request.password)?;

    let mut db = state.db.write().await;
    if db.user_by_email(&request.email)?.is_some() {
        return Err(ApiError::bad_request("Email já cadastrado"));
    }

    let id = db
        .create_user(NewUser {
            email: request.email.clone(),
            name: request.name,
            password_hash: hash_password(&request.password),
            role: Role::User,
        })
        .map_err(|e| match e {
            AlmError::Conflict(_) => ApiError::bad_request("Email já cadastrado"),
            other => ApiError::from(other),
        })?;

    tracing::info!(user_id = id.0, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Usuário criado com sucesso".to_string(),
            user_id: id.0,
            email: request.email,
        }),
    ))
}

/// Exchange a refresh token for a new access token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let Json(request) = payload?;
    let claims = state.tokens.verify(&request.refresh_token, TokenType::Refresh)?;

    let db = state.db.read().await;
    let user = db
        .user_by_id(UserId(claims.user_id))?
        .ok_or_else(|| ApiError::unauthorized("Token inválido"))?;

    Ok(Json(RefreshResponse {
        token: state.tokens.issue(&user, TokenType::Access)?,
    }))
}

/// The user behind the access token.
pub async fn me_handler(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<Json<UserJson>, ApiError> {
    let db = state.db.read().await;
    let user = db
        .user_by_id(UserId(claims.user_id))?
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;
    Ok(Json(UserJson::from(&user)))
}

/// Public fields of a user.
pub async fn user_handler(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<Json<PublicUser>, ApiError> {
    let db = state.db.read().await;
    db.user_by_id(UserId(user_id))?
        .map(|u| Json(u.to_public()))
        .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))
}

// =============================================================================
// PORTFOLIO HANDLERS
// =============================================================================

/// Portfolio of a user with live market metrics.
pub async fn portfolio_handler(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<Json<PortfolioResponse>, ApiError> {
    let items = portfolio_items(&state.db, state.market.as_ref(), Some(UserId(user_id))).await?;
    if items.is_empty() {
        return Err(ApiError::not_found(
            "Portfólio não encontrado ou usuário sem alocações",
        ));
    }

    Ok(Json(PortfolioResponse {
        user_id,
        total_allocation: total_allocation(&items),
        portfolio: items,
    }))
}

/// Set the allocation of one ticker.
pub async fn update_allocation_handler(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
    payload: Result<Json<AllocationUpdate>, JsonRejection>,
) -> Result<Json<AllocationResponse>, ApiError> {
    let Json(update) = payload?;
    update.validate().map_err(ApiError::unprocessable)?;

    let mut db = state.db.write().await;
    db.initialize_stocks()?;
    if db.stock(&update.stock_ticker)?.is_none() {
        return Err(ApiError::not_found(format!(
            "Ação '{}' não encontrada",
            update.stock_ticker
        )));
    }
    db.update_allocation(UserId(user_id), &update.stock_ticker, update.allocation)?;

    tracing::info!(
        user_id,
        ticker = %update.stock_ticker,
        allocation = update.allocation,
        "Allocation updated"
    );
    Ok(Json(AllocationResponse {
        message: "Alocação atualizada com sucesso".to_string(),
        user_id,
        stock_ticker: update.stock_ticker,
        new_allocation: update.allocation,
    }))
}

/// Remove a ticker from a portfolio.
pub async fn remove_stock_handler(
    State(state): State<AppState>,
    Path((user_id, ticker)): Path<(u64, String)>,
) -> Result<Json<RemoveStockResponse>, ApiError> {
    let removed = state
        .db
        .write()
        .await
        .remove_from_portfolio(UserId(user_id), &ticker)?;
    if !removed {
        return Err(ApiError::not_found(format!(
            "Ação '{ticker}' não encontrada no portfólio do usuário"
        )));
    }

    Ok(Json(RemoveStockResponse {
        message: format!("Ação '{ticker}' removida do portfólio"),
        user_id,
        stock_ticker: ticker,
    }))
}

/// Allocation-weighted metrics of a portfolio.
pub async fn summary_handler(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<Json<PortfolioSummary>, ApiError> {
    let items = portfolio_items(&state.db, state.market.as_ref(), Some(UserId(user_id))).await?;
    if items.is_empty() {
        return Err(ApiError::not_found("Portfólio não encontrado"));
    }
    Ok(Json(PortfolioSummary::from_items(user_id, &items)))
}

// =============================================================================
// FORECAST HANDLER
// =============================================================================

/// SARIMA forecast of a ticker's closing price.
pub async fn sarima_handler(
    State(state): State<AppState>,
    payload: Result<Json<ForecastRequest>, JsonRejection>,
) -> Result<Json<ForecastResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate().map_err(ApiError::unprocessable)?;

    let history = state
        .market
        .history(&request.ticker)
        .await
        .filter(|h| !h.is_empty())
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "Não foi possível obter dados históricos para {}",
                request.ticker
            ))
        })?
        .tail(request.days);

    let outcome = forecast_series(
        &history,
        request.n_steps,
        request.sarima_order(),
        request.seasonal(),
        &mut rand::rng(),
    )?;

    if let Some(reason) = &outcome.fallback_reason {
        tracing::warn!(
            ticker = %request.ticker,
            reason = %reason,
            "SARIMA failed, using moving-average fallback"
        );
    }

    Ok(Json(ForecastResponse {
        ticker: request.ticker,
        forecast_dates: outcome.dates,
        forecast_values: outcome.values,
        plot_base64: None,
        metrics: Some(outcome.metrics),
    }))
}
