//! # Interactive API Documentation
//!
//! `GET /docs` serves Swagger UI, which renders `GET /openapi.json`.

use axum::{Json, response::Html};
use serde_json::{Map, Value, json};

const SWAGGER_UI: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>ALM - xLSTM - Service - Swagger UI</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
  </script>
</body>
</html>
"##;

/// Swagger UI page.
pub async fn docs_handler() -> Html<&'static str> {
    Html(SWAGGER_UI)
}

/// OpenAPI document.
pub async fn openapi_handler() -> Json<Value> {
    Json(openapi_document())
}

fn json_body(schema: Value) -> Value {
    json!({ "content": { "application/json": { "schema": schema } } })
}

fn response(description: &str) -> Value {
    json!({ "description": description, "content": { "application/json": { "schema": { "type": "object" } } } })
}

fn error(description: &str) -> Value {
    json!({ "description": description, "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Error" } } } })
}

fn user_id_param() -> Value {
    json!({ "name": "user_id", "in": "path", "required": true, "schema": { "type": "integer", "format": "int64" } })
}

fn auth_paths() -> Vec<(&'static str, Value)> {
    vec![
        ("/api/v1/auth/login", json!({ "post": {
            "tags": ["auth"], "summary": "Log in and receive tokens",
            "requestBody": json_body(json!({ "$ref": "#/components/schemas/LoginRequest" })),
            "responses": { "200": response("Tokens and user"), "401": error("Invalid credentials"), "422": error("Validation error") }
        } })),
        ("/api/v1/auth/register", json!({ "post": {
            "tags": ["auth"], "summary": "Register a user",
            "requestBody": json_body(json!({ "$ref": "#/components/schemas/RegisterRequest" })),
            "responses": { "201": response("User created"), "400": error("Email already registered"), "422": error("Validation error") }
        } })),
        ("/api/v1/auth/refresh", json!({ "post": {
            "tags": ["auth"], "summary": "Exchange a refresh token",
            "requestBody": json_body(json!({ "$ref": "#/components/schemas/RefreshRequest" })),
            "responses": { "200": response("New access token"), "401": error("Invalid token") }
        } })),
        ("/api/v1/auth/me", json!({ "get": {
            "tags": ["auth"], "summary": "Current user",
            "security": [{ "bearerAuth": [] }],
            "responses": { "200": response("Current user"), "401": error("Not authenticated"), "404": error("User not found") }
        } })),
        ("/api/v1/auth/users/{user_id}", json!({ "get": {
            "tags": ["auth"], "summary": "Public user record",
            "parameters": [user_id_param()],
            "responses": { "200": response("User"), "404": error("User not found") }
        } })),
    ]
}

fn portfolio_paths() -> Vec<(&'static str, Value)> {
    let ticker_param = json!({ "name": "ticker", "in": "path", "required": true, "schema": { "type": "string" } });
    vec![
        ("/api/v1/portfolio/{user_id}", json!({ "get": {
            "tags": ["portfolio"], "summary": "Portfolio with market metrics",
            "parameters": [user_id_param()],
            "responses": { "200": response("Portfolio"), "404": error("Empty portfolio") }
        } })),
        ("/api/v1/portfolio/{user_id}/allocation", json!({ "put": {
            "tags": ["portfolio"], "summary": "Set the allocation of a ticker",
            "parameters": [user_id_param()],
            "requestBody": json_body(json!({ "$ref": "#/components/schemas/AllocationUpdate" })),
            "responses": { "200": response("Allocation updated"), "404": error("Unknown stock"), "422": error("Allocation out of range") }
        } })),
        ("/api/v1/portfolio/{user_id}/stock/{ticker}", json!({ "delete": {
            "tags": ["portfolio"], "summary": "Remove a ticker from a portfolio",
            "parameters": [user_id_param(), ticker_param],
            "responses": { "200": response("Removed"), "404": error("Ticker not held") }
        } })),
        ("/api/v1/portfolio/{user_id}/summary", json!({ "get": {
            "tags": ["portfolio"], "summary": "Allocation-weighted portfolio metrics",
            "parameters": [user_id_param()],
            "responses": { "200": response("Summary"), "404": error("Empty portfolio") }
        } })),
    ]
}

fn schemas() -> Value {
    let mut schemas = Map::new();
    schemas.insert(
        "Error".into(),
        json!({ "type": "object", "properties": { "detail": { "type": "string" } } }),
    );
    schemas.insert(
        "LoginRequest".into(),
        json!({ "type": "object", "required": ["email", "password"], "properties": {
            "email": { "type": "string" }, "password": { "type": "string", "minLength": 6 } } }),
    );
    schemas.insert(
        "RegisterRequest".into(),
        json!({ "type": "object", "required": ["email", "name", "password"], "properties": {
            "email": { "type": "string" },
            "name": { "type": "string", "minLength": 2, "maxLength": 100 },
            "password": { "type": "string", "minLength": 6 } } }),
    );
    schemas.insert(
        "RefreshRequest".into(),
        json!({ "type": "object", "required": ["refresh_token"], "properties": {
            "refresh_token": { "type": "string" } } }),
    );
    schemas.insert(
        "AllocationUpdate".into(),
        json!({ "type": "object", "required": ["stock_ticker", "allocation"], "properties": {
            "stock_ticker": { "type": "string", "example": "PETR4.SA" },
            "allocation": { "type": "number", "minimum": 0, "maximum": 1 } } }),
    );
    schemas.insert(
        "ForecastRequest".into(),
        json!({ "type": "object", "required": ["ticker"], "properties": {
            "ticker": { "type": "string", "example": "PETR4.SA" },
            "n_steps": { "type": "integer", "default": 7, "minimum": 1, "maximum": 30 },
            "order": { "type": "array", "items": { "type": "integer", "minimum": 0, "maximum": 5 }, "minItems": 3, "maxItems": 3 },
            "seasonal_order": { "type": "array", "items": { "type": "integer" }, "minItems": 4, "maxItems": 4 },
            "days": { "type": "integer", "default": 365, "minimum": 30, "maximum": 730 } } }),
    );
    Value::Object(schemas)
}

/// OpenAPI 3 description of every route.
#[must_use]
pub fn openapi_document() -> Value {
    let mut paths = Map::new();
    paths.insert(
        "/".into(),
        json!({ "get": { "summary": "Welcome message", "responses": { "200": response("Welcome") } } }),
    );
    paths.insert(
        "/health".into(),
        json!({ "get": { "summary": "Health check", "responses": { "200": response("Service is healthy") } } }),
    );
    for (path, item) in auth_paths().into_iter().chain(portfolio_paths()) {
        paths.insert(path.into(), item);
    }
    paths.insert(
        "/api/v1/forecast/sarima".into(),
        json!({ "post": {
            "tags": ["forecast"], "summary": "SARIMA price forecast",
            "requestBody": json_body(json!({ "$ref": "#/components/schemas/ForecastRequest" })),
            "responses": { "200": response("Forecast"), "404": error("No price history"), "422": error("Validation error") }
        } }),
    );

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "ALM - xLSTM - Service",
            "description": "Asset Liability Management: authentication, portfolios, market data and SARIMA forecasts",
            "version": env!("CARGO_PKG_VERSION")
        },
        "paths": Value::Object(paths),
        "components": {
            "securitySchemes": { "bearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" } },
            "schemas": schemas()
        }
    })
}
