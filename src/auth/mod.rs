pub mod password;

use axum::http::{header, HeaderMap, StatusCode};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::models::{Resource, User};
use crate::error::AppError;
use crate::middleware::response::{ApiResponse, ApiResult};

pub const TOKEN_COOKIE: &str = "jwt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(id: Uuid, expiry_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
        }
    }

    /// Claims for `user`, never dated before its last password change
    pub fn for_user(user: &User, expiry_hours: u64) -> Self {
        let mut claims = Self::new(user.id, expiry_hours);
        if let Some(valid_from) = user.tokens_valid_from() {
            claims.iat = claims.iat.max(valid_from);
        }
        claims
    }
}

pub fn sign_token(claims: &Claims, secret: &str) -> Result<String, AppError> {
    if secret.is_empty() {
        return Err(AppError::unexpected(anyhow::anyhow!("JWT secret not configured")));
    }
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(AppError::unexpected)
}

/// Decode and check signature and expiry
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// `Set-Cookie` value carrying the token
pub fn token_cookie(token: &str, config: &AppConfig) -> String {
    let expires = Utc::now() + Duration::days(config.security.jwt_cookie_expiry_days as i64);
    let mut cookie = format!(
        "{}={}; Path=/; Expires={}; HttpOnly; SameSite=Lax",
        TOKEN_COOKIE,
        token,
        expires.format("%a, %d %b %Y %H:%M:%S GMT")
    );
    if config.environment.is_production_like() {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Token from `Authorization: Bearer ...`, falling back to the `jwt` cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Issue a token for `user` as body field and cookie
pub fn send_token(user: &User, status: StatusCode, config: &AppConfig) -> ApiResult {
    let claims = Claims::for_user(user, config.security.jwt_expiry_hours);
    let token = sign_token(&claims, &config.security.jwt_secret)?;
    let cookie = token_cookie(&token, config);

    Ok(ApiResponse::with_status(status)
        .with_cookie(cookie)
        .with_token(token)
        .with_data(User::NAME, user.to_public(None)?))
}
