//! Password hashing, access tokens and the authenticated-user extractor.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{User, UserRole};
use crate::server::AppState;

const INVALID_CREDENTIALS: &str = "Could not validate credentials";

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User email.
    pub sub: String,
    pub user_id: i64,
    pub role: UserRole,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// Hash a password into a PHC string.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))
}

/// Check a password against a stored PHC string.
#[must_use]
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        warn!("Stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Issue an HS256 access token for `user`.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn create_access_token(user: &User, secret: &str, expire_minutes: i64) -> ApiResult<String> {
    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        role: user.role,
        exp: (Utc::now() + Duration::minutes(expire_minutes)).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::internal(format!("Failed to issue token: {e}")))
}

/// Validate signature and expiry.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] for any invalid token.
pub fn decode_access_token(token: &str, secret: &str) -> ApiResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!(error = %e, "Rejected access token");
        ApiError::unauthorized(INVALID_CREDENTIALS)
    })
}

/// Token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The active user behind the request's bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl std::ops::Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
        let claims = decode_access_token(token, &state.config.secret_key)?;

        let user = db::find_user(&state.db, claims.user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;
        if !user.is_active {
            return Err(ApiError::unauthorized("Inactive user"));
        }
        Ok(Self(user))
    }
}

/// Reject non-admins.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] unless the user is an admin.
pub fn require_admin(user: &User) -> ApiResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only administrators can perform this action"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 42,
            email: "ana@example.com".into(),
            name: "Ana".into(),
            password_hash: String::new(),
            role: UserRole::Planning,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("s3nha-forte").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3nha-forte", &hash));
        assert!(!verify_password("errada", &hash));
        assert!(!verify_password("s3nha-forte", "not-a-hash"));
    }

    #[test]
    fn test_token_claims() {
        let token = create_access_token(&user(), "secret", 60).unwrap();
        let claims = decode_access_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "ana@example.com");
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.role, UserRole::Planning);
    }

    #[test]
    fn test_token_rejects_wrong_secret_and_expiry() {
        let token = create_access_token(&user(), "secret", 60).unwrap();
        assert!(matches!(
            decode_access_token(&token, "other"),
            Err(ApiError::Unauthorized(_))
        ));

        let expired = create_access_token(&user(), "secret", -10).unwrap();
        assert!(decode_access_token(&expired, "secret").is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn test_require_admin() {
        let mut u = user();
        assert!(matches!(require_admin(&u), Err(ApiError::Forbidden(_))));
        u.role = UserRole::Admin;
        assert!(require_admin(&u).is_ok());
    }
}
