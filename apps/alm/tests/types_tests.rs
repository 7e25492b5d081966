//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use alm::api::{
    AllocationUpdate, ErrorResponse, ForecastRequest, ForecastResponse, HealthResponse,
    LoginResponse, RootResponse, UserJson,
};
use alm_core::{ForecastMethod, ForecastMetrics, Role, User, UserId};
use chrono::{TimeZone, Utc};

// =============================================================================
// SERVICE RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "healthy");
    assert!(!health.version.is_empty());
}

#[test]
fn test_root_response_serialization() {
    let json = serde_json::to_string(&RootResponse::default()).unwrap();
    assert_eq!(
        json,
        r#"{"message":"Welcome to ALM xLSTM Inference Service"}"#
    );
}

#[test]
fn test_error_response_shape() {
    let json = serde_json::to_string(&ErrorResponse {
        detail: "Portfólio não encontrado".to_string(),
    })
    .unwrap();
    assert_eq!(json, r#"{"detail":"Portfólio não encontrado"}"#);
}

// =============================================================================
// AUTH TYPE TESTS
// =============================================================================

fn sample_user() -> User {
    User {
        id: UserId(42),
        email: "demo@alm.com".to_string(),
        name: "Demo".to_string(),
        password_hash: "hash".to_string(),
        role: Role::Admin,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

#[test]
fn test_user_json_from_user() {
    let json = UserJson::from(&sample_user());

    assert_eq!(json.id, "42");
    assert_eq!(json.role, "admin");
    assert_eq!(json.created_at.as_deref(), Some("2024-05-01T12:00:00+00:00"));
}

#[test]
fn test_user_json_field_names() {
    let value = serde_json::to_value(UserJson::from(&sample_user())).unwrap();

    assert!(value.get("createdAt").is_some());
    assert!(value.get("created_at").is_none());
    assert!(value.get("password_hash").is_none());
}

#[test]
fn test_login_response_field_names() {
    let response = LoginResponse {
        user: UserJson::from(&sample_user()),
        token: "a".to_string(),
        refresh_token: "r".to_string(),
        message: "Login realizado com sucesso".to_string(),
    };
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["refresh_token"], "r");
    assert_eq!(value["user"]["id"], "42");
}

// =============================================================================
// PORTFOLIO TYPE TESTS
// =============================================================================

#[test]
fn test_allocation_update_bounds() {
    let update = |allocation| AllocationUpdate {
        stock_ticker: "PETR4.SA".to_string(),
        allocation,
    };

    assert!(update(0.0).validate().is_ok());
    assert!(update(1.0).validate().is_ok());
    assert!(update(-0.01).validate().is_err());
    assert!(update(1.01).validate().is_err());
    assert!(update(f64::NAN).validate().is_err());
}

// =============================================================================
// FORECAST TYPE TESTS
// =============================================================================

#[test]
fn test_forecast_request_defaults() {
    let request: ForecastRequest = serde_json::from_str(r#"{"ticker":"PETR4.SA"}"#).unwrap();

    assert_eq!(request.n_steps, 7);
    assert_eq!(request.days, 365);
    assert!(request.order.is_none());
    assert!(request.seasonal_order.is_none());
    assert!(request.validate().is_ok());
}

#[test]
fn test_forecast_request_orders_as_arrays() {
    let request: ForecastRequest = serde_json::from_str(
        r#"{"ticker":"BTC-USD","n_steps":30,"order":[1,1,1],"seasonal_order":[0,1,1,7],"days":730}"#,
    )
    .unwrap();

    assert_eq!(request.order, Some((1, 1, 1)));
    assert_eq!(request.seasonal_order, Some((0, 1, 1, 7)));
    assert!(request.validate().is_ok());
}

#[test]
fn test_forecast_request_validation() {
    let base: ForecastRequest = serde_json::from_str(r#"{"ticker":"PETR4.SA"}"#).unwrap();

    let too_many_steps = ForecastRequest {
        n_steps: 31,
        ..base.clone()
    };
    let too_few_days = ForecastRequest {
        days: 29,
        ..base.clone()
    };
    let blank_ticker = ForecastRequest {
        ticker: "  ".to_string(),
        ..base
    };

    assert!(too_many_steps.validate().is_err());
    assert!(too_few_days.validate().is_err());
    assert!(blank_ticker.validate().is_err());
}

#[test]
fn test_forecast_request_order_bounds() {
    let base: ForecastRequest = serde_json::from_str(r#"{"ticker":"PETR4.SA"}"#).unwrap();

    let at_limit = ForecastRequest {
        order: Some((5, 5, 5)),
        seasonal_order: Some((5, 5, 5, 730)),
        ..base.clone()
    };
    let huge_d = ForecastRequest {
        order: Some((0, 100_000_000_000_000_000, 0)),
        ..base.clone()
    };
    let huge_period = ForecastRequest {
        seasonal_order: Some((2, 0, 0, usize::MAX / 2 + 1)),
        ..base
    };

    assert!(at_limit.validate().is_ok());
    assert!(huge_d.validate().unwrap_err().starts_with("order component d"));
    assert!(huge_period.validate().unwrap_err().starts_with("seasonal period"));
}

#[test]
fn test_forecast_response_fallback_metrics() {
    let response = ForecastResponse {
        ticker: "PETR4.SA".to_string(),
        forecast_dates: vec!["2024-06-03".to_string()],
        forecast_values: vec![38.1],
        plot_base64: None,
        metrics: Some(ForecastMetrics {
            aic: None,
            bic: None,
            last_price: 38.0,
            mean_forecast: 38.1,
            std_forecast: None,
            method: Some(ForecastMethod::MovingAverageFallback),
        }),
    };
    let value = serde_json::to_value(&response).unwrap();

    assert!(value["plot_base64"].is_null());
    assert_eq!(value["metrics"]["method"], "moving_average_fallback");
    assert!(value["metrics"].get("aic").is_none());
}
