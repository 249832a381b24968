//! Bearer JWT verification for the /v1 API.
//!
//! A request without an `Authorization` header proceeds anonymously. A
//! request with one must carry a token signed with the configured HS256
//! key; anything else is rejected with 401 before reaching a handler.

use crate::SharedState;
use crate::error::ApiError;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use tracing::{debug, warn};

/// The verified caller, if any. Inserted into every /v1 request.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<VerifiedToken>);

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    /// The raw token, forwarded to the ATS as the session credential.
    pub token: String,
    pub user_id: Option<String>,
}

impl Caller {
    /// Who owns the sessions this caller creates: the user id, or the raw
    /// token when the token names no user.
    pub fn identity(&self) -> Option<&str> {
        self.0
            .as_ref()
            .map(|v| v.user_id.as_deref().unwrap_or(&v.token))
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    #[serde(rename = "https://hasura.io/jwt/claims")]
    hasura: Option<HasuraClaims>,
}

#[derive(Debug, Deserialize)]
struct HasuraClaims {
    #[serde(rename = "x-hasura-user-id")]
    user_id: Option<String>,
}

/// Verify `token` against `key`. `exp` is checked when present but not required.
pub fn verify(token: &str, key: &DecodingKey) -> Result<VerifiedToken, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token has expired".to_string(),
        _ => format!("Invalid token: {e}"),
    })?;

    let user_id = data
        .claims
        .sub
        .or_else(|| data.claims.hasura.and_then(|h| h.user_id));
    Ok(VerifiedToken {
        token: token.to_string(),
        user_id,
    })
}

pub async fn auth_middleware(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim().to_string());

    let caller = match header {
        None => Caller(None),
        Some(token) => {
            let Some(key) = &state.jwt_key else {
                warn!("Bearer token presented but no JWT signing key is configured");
                return ApiError::Unauthorized("Token verification is not configured".into())
                    .into_response();
            };
            match verify(&token, key) {
                Ok(verified) => {
                    debug!(user_id = ?verified.user_id, "Bearer token verified");
                    Caller(Some(verified))
                }
                Err(reason) => {
                    warn!(%reason, "Rejected bearer token");
                    return ApiError::Unauthorized(reason).into_response();
                }
            }
        }
    };

    req.extensions_mut().insert(caller);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};
    use serde_json::json;

    const KEY: &[u8] = b"test-signing-key";

    fn token(claims: serde_json::Value, key: &[u8]) -> String {
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(key)).unwrap()
    }

    #[test]
    fn sub_becomes_user_id() {
        let jwt = token(json!({ "sub": "u-42", "exp": get_current_timestamp() + 600 }), KEY);
        let verified = verify(&jwt, &DecodingKey::from_secret(KEY)).unwrap();
        assert_eq!(verified.user_id.as_deref(), Some("u-42"));
        assert_eq!(verified.token, jwt);
    }

    #[test]
    fn hasura_claim_is_the_fallback_user_id() {
        let jwt = token(
            json!({ "https://hasura.io/jwt/claims": { "x-hasura-user-id": "u-7" } }),
            KEY,
        );
        let verified = verify(&jwt, &DecodingKey::from_secret(KEY)).unwrap();
        assert_eq!(verified.user_id.as_deref(), Some("u-7"));
    }

    #[test]
    fn identity_prefers_user_id() {
        let caller = Caller(Some(VerifiedToken {
            token: "jwt".into(),
            user_id: Some("u-1".into()),
        }));
        assert_eq!(caller.identity(), Some("u-1"));

        let no_user = Caller(Some(VerifiedToken {
            token: "jwt".into(),
            user_id: None,
        }));
        assert_eq!(no_user.identity(), Some("jwt"));
        assert_eq!(Caller(None).identity(), None);
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = token(json!({ "sub": "u-1", "exp": get_current_timestamp() - 3_600 }), KEY);
        let err = verify(&jwt, &DecodingKey::from_secret(KEY)).unwrap_err();
        assert_eq!(err, "Token has expired");
    }

    #[test]
    fn wrong_key_is_rejected() {
        let jwt = token(json!({ "sub": "u-1" }), b"someone-else");
        let err = verify(&jwt, &DecodingKey::from_secret(KEY)).unwrap_err();
        assert!(err.starts_with("Invalid token"));
    }
}
