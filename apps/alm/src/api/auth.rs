//! # Authentication Module
//!
//! HS256 JSON Web Tokens for the ALM HTTP API.
//!
//! Login issues an access token and a refresh token. Both carry
//! `{user_id, email, role, exp, iat, type}`; `type` keeps a refresh token
//! from being accepted where an access token is expected.
//!
//! ## Usage
//!
//! ```text
//! Authorization: Bearer <access-token>
//! ```

use super::{AppState, error::ApiError};
use crate::config::AuthConfig;
use alm_core::User;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// CLAIMS
// =============================================================================

/// Purpose of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

// =============================================================================
// TOKEN SERVICE
// =============================================================================

/// Issues and verifies tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.jwt_secret_key,
            Duration::minutes(config.access_token_expire_minutes),
            Duration::days(config.refresh_token_expire_days),
        )
    }

    /// Sign a token of the given type for a user.
    pub fn issue(&self, user: &User, token_type: TokenType) -> Result<String, ApiError> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            user_id: user.id.0,
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            token_type,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "Token signing failed");
            ApiError::internal("Erro ao gerar token")
        })
    }

    /// Verify signature, expiry and type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, ApiError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => "Token expirado",
                _ => "Token inválido",
            };
            tracing::warn!(
                event = "auth_failure",
                reason,
                "Token rejected"
            );
            ApiError::unauthorized(reason)
        })?;

        if data.claims.token_type != expected {
            tracing::warn!(
                event = "auth_failure",
                reason = "wrong_token_type",
                "Token rejected"
            );
            return Err(ApiError::unauthorized("Tipo de token inválido"));
        }
        Ok(data.claims)
    }
}

// =============================================================================
// EXTRACTOR
// =============================================================================

/// Claims of a verified access token from `Authorization: Bearer`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            return Err(ApiError::unauthorized("Not authenticated"));
        };

        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
        state.tokens.verify(token.trim(), TokenType::Access).map(Self)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alm_core::{Role, UserId};

    fn user() -> User {
        User {
            id: UserId(1),
            email: "demo@alm.com".to_string(),
            name: "Demo".to_string(),
            password_hash: String::new(),
            role: Role::User,
            created_at: Utc::now(),
        }
    }

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::minutes(30), Duration::days(7))
    }

    #[test]
    fn access_token_round_trips() {
        let tokens = service();
        let token = tokens.issue(&user(), TokenType::Access).expect("issue");
        let claims = tokens.verify(&token, TokenType::Access).expect("verify");

        assert_eq!(claims.user_id, 1);
        assert_eq!(claims.email, "demo@alm.com");
        assert_eq!(claims.role, "user");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let tokens = service();
        let token = tokens.issue(&user(), TokenType::Refresh).expect("issue");
        assert!(tokens.verify(&token, TokenType::Access).is_err());
        assert!(tokens.verify(&token, TokenType::Refresh).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new("test-secret", Duration::hours(-2), Duration::days(7));
        let token = tokens.issue(&user(), TokenType::Access).expect("issue");
        let err = tokens.verify(&token, TokenType::Access).expect_err("expired");
        assert_eq!(err.detail, "Token expirado");
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let other = TokenService::new("other-secret", Duration::minutes(30), Duration::days(7));
        let token = other.issue(&user(), TokenType::Access).expect("issue");
        assert!(service().verify(&token, TokenType::Access).is_err());
    }

    #[test]
    fn claims_use_type_field() {
        let json = serde_json::to_value(Claims {
            user_id: 1,
            email: "a@b.c".to_string(),
            role: "admin".to_string(),
            exp: 2,
            iat: 1,
            token_type: TokenType::Refresh,
        })
        .expect("json");
        assert_eq!(json["type"], "refresh");
    }
}
