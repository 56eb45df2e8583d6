//! JWT auth extractor for the record and calculation routes.
//!
//! Tokens are issued elsewhere; this service only verifies them. The
//! `Authorization: Bearer <token>` header must carry an HS256 token signed
//! with the configured secret, with an unexpired `exp` and a numeric `id`
//! claim naming the owning user.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub exp: u64,
}

/// Authenticated user, as established by a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation).map(|data| data.claims)
}

fn extract_auth_user(state: &AppState, parts: &Parts) -> Option<AuthUser> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let token = auth_header.strip_prefix("Bearer ")?;
    match decode_token(token.trim(), &state.jwt_secret) {
        Ok(claims) => Some(AuthUser { user_id: claims.id }),
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            None
        }
    }
}

/// Axum extractor that requires an authenticated user.
///
/// Returns 401 if no valid JWT is present.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_user = extract_auth_user(state, parts).ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "Authentication required"})),
            )
                .into_response()
        })?;

        Ok(RequireAuth(auth_user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(id: i64, exp: u64, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &Claims { id, exp },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> u64 {
        (chrono::Utc::now().timestamp() + 3600) as u64
    }

    #[test]
    fn valid_token_yields_user_id() {
        let t = token(42, far_future(), "s3cret");
        assert_eq!(decode_token(&t, "s3cret").unwrap().id, 42);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let t = token(42, far_future(), "s3cret");
        assert!(decode_token(&t, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let t = token(42, 1_000, "s3cret");
        assert!(decode_token(&t, "s3cret").is_err());
    }
}
