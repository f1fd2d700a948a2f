// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the request caller.
//!
//! ```rust,ignore
//! async fn handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! ## Authentication Modes
//!
//! - **Production** (`CLERK_JWKS_URL` set): signature, expiry, issuer and
//!   audience are verified against the Clerk JWKS.
//! - **Development** (no JWKS): the token is decoded without signature
//!   verification; only expiry is checked.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, decode_header, Validation};

use super::claims::ClerkClaims;
use super::{AuthError, AuthenticatedUser, JwksManager};
use crate::state::{AppState, AuthConfig};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Any authenticated caller.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // A caller resolved earlier in the stack (or injected by tests)
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = bearer_token(parts)?;
        let user = verify_jwt(token, &state.auth_config).await?;
        tracing::debug!(user_id = %user.user_id, role = %user.role, "caller authenticated");
        Ok(Auth(user))
    }
}

/// Caller with the admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.user_id, path = %parts.uri.path(), "admin route refused");
            return Err(AuthError::InsufficientPermissions);
        }
        Ok(AdminOnly(user))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

async fn verify_jwt(token: &str, auth_config: &AuthConfig) -> Result<AuthenticatedUser, AuthError> {
    match &auth_config.jwks {
        Some(jwks) => verify_jwt_production(token, jwks, auth_config).await,
        None => verify_jwt_development(token),
    }
}

async fn verify_jwt_production(
    token: &str,
    jwks: &JwksManager,
    auth_config: &AuthConfig,
) -> Result<AuthenticatedUser, AuthError> {
    let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

    let (decoding_key, algorithm) = match &header.kid {
        Some(kid) => jwks.get_decoding_key(kid).await?,
        None => jwks.get_any_decoding_key().await?,
    };

    let mut validation = Validation::new(algorithm);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    if let Some(issuer) = &auth_config.issuer {
        validation.set_issuer(&[issuer]);
    }
    match &auth_config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let token_data = decode::<ClerkClaims>(token, &decoding_key, &validation)?;
    Ok(AuthenticatedUser::from_claims(token_data.claims))
}

/// Development-only decoding. Never enable without a JWKS in production.
fn verify_jwt_development(token: &str) -> Result<AuthenticatedUser, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<ClerkClaims>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = token_data.claims;

    let now = chrono::Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    Ok(AuthenticatedUser::from_claims(claims))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::state::tests::test_state;
    use axum::http::Request;

    /// Unsigned development token for `user_id`.
    pub(crate) fn dev_jwt(user_id: &str, role: Option<&str>, exp: i64) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let header = r#"{"alg":"RS256","typ":"JWT"}"#;
        let mut claims = serde_json::json!({
            "sub": user_id,
            "iat": 1609459200,
            "exp": exp,
            "iss": "test",
            "sid": "sess_123",
        });
        if let Some(role) = role {
            claims["publicMetadata"] = serde_json::json!({ "role": role });
        }

        format!(
            "{}.{}.fake_signature",
            URL_SAFE_NO_PAD.encode(header.as_bytes()),
            URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes())
        )
    }

    fn parts(authorization: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/v1/account");
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn requires_auth_header() {
        let (state, _temp) = test_state();
        let result = Auth::from_request_parts(&mut parts(None), &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));

        let result =
            Auth::from_request_parts(&mut parts(Some("Basic abc".into())), &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn development_token_resolves_user_and_role() {
        let (state, _temp) = test_state();
        let token = dev_jwt("user_123", Some("admin"), 9999999999);

        let Auth(user) = Auth::from_request_parts(&mut parts(Some(format!("Bearer {token}"))), &state)
            .await
            .unwrap();
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn expired_development_token_is_rejected() {
        let (state, _temp) = test_state();
        let token = dev_jwt("user_123", None, 1000);

        let result =
            Auth::from_request_parts(&mut parts(Some(format!("Bearer {token}"))), &state).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let (state, _temp) = test_state();
        let result =
            Auth::from_request_parts(&mut parts(Some("Bearer not.a.jwt".into())), &state).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn admin_only_rejects_users() {
        let (state, _temp) = test_state();
        let mut request = parts(None);
        request
            .extensions
            .insert(AuthenticatedUser::new("user_123", Role::User));

        let result = AdminOnly::from_request_parts(&mut request, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }
}
