// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{client::Actor, config::Config, error::AppError};

/// Roles allowed to work the moderation queue.
pub const MODERATOR_ROLES: [&str; 2] = ["admin", "moderator"];

/// JWT Claims structure. Tokens are issued by the external auth service.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// User's role (e.g., 'user', 'moderator', 'admin').
    pub role: String,
    /// Display name shown on provisional comments.
    #[serde(default)]
    pub name: Option<String>,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// The raw bearer token of the current request, forwarded to the comment server.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl Claims {
    pub fn actor(&self, token: Option<&BearerToken>) -> Actor {
        Actor {
            user_id: self.sub.clone(),
            display_name: self.name.clone(),
            token: token.map(|t| t.0.clone()),
        }
    }

    pub fn is_moderator(&self) -> bool {
        MODERATOR_ROLES.contains(&self.role.as_str())
    }
}

/// Signs a JWT with the same claims layout the auth service uses.
/// Handy for local runs and tests.
pub fn sign_jwt(
    user_id: &str,
    name: Option<&str>,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: user_id.to_owned(),
        role: role.to_owned(),
        name: name.map(str::to_owned),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: Authentication.
///
/// Intercepts requests, validates the 'Authorization: Bearer <token>' header.
/// If valid, injects `Claims` and the raw `BearerToken` into the request extensions.
/// If invalid, returns 401 Unauthorized.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token.to_string(),
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    match verify_jwt(&token, &config.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            req.extensions_mut().insert(BearerToken(token));
            Ok(next.run(req).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Axum Middleware: Moderator Authorization.
///
/// Must be used AFTER `auth_middleware`. Checks that the injected `Claims`
/// carry a moderator or admin role. If not, returns 403 Forbidden.
pub async fn moderator_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !claims.is_moderator() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
