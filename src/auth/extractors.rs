use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use super::{jwt::JwtKeys, repo_types::User};
use crate::{errors::AppError, state::AppState};

/// The authenticated caller, loaded from the credential store.
///
/// Requires `Authorization: Bearer <access token>`. A valid token whose
/// subject has since been deleted is rejected like any other bad token.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let user_id = access_subject(&parts.headers, &keys)?;

        let found = User::find_by_id(&state.db, user_id).await?;
        require_user(user_id, found).map(CurrentUser)
    }
}

/// A token whose subject has no row any more is a 401, not a 404.
pub(crate) fn require_user(user_id: Uuid, found: Option<User>) -> Result<User, AppError> {
    found.ok_or_else(|| {
        warn!(%user_id, "token subject no longer exists");
        AppError::unauthorized("User not found")
    })
}

/// Pulls the bearer token out of the headers and returns its subject if it
/// is a valid access token.
pub(crate) fn access_subject(headers: &HeaderMap, keys: &JwtKeys) -> Result<Uuid, AppError> {
    let auth = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing access token"))?;

    let token = auth
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing access token"))?;

    let claims = keys.verify_access(token).map_err(|e| {
        warn!(error = %e, "access token rejected");
        AppError::unauthorized("Invalid access token")
    })?;
    Ok(claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use axum::http::HeaderValue;

    fn keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "test".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 14,
        })
    }

    fn headers_with(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(auth).unwrap(),
        );
        h
    }

    #[test]
    fn accepts_bearer_access_token() {
        let keys = keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).unwrap();
        let sub = access_subject(&headers_with(&format!("Bearer {token}")), &keys).unwrap();
        assert_eq!(sub, user_id);
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let err = access_subject(&HeaderMap::new(), &keys()).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn other_schemes_are_unauthorized() {
        let keys = keys();
        let token = keys.sign_access(Uuid::new_v4()).unwrap();
        for value in [format!("Basic {token}"), token.clone(), "Bearer ".to_string()] {
            let err = access_subject(&headers_with(&value), &keys).unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)));
        }
    }

    #[test]
    fn deleted_subject_is_unauthorized() {
        let err = require_user(Uuid::new_v4(), None).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "User not found"));
    }

    #[test]
    fn existing_subject_passes_through() {
        let user_id = Uuid::new_v4();
        let user = User {
            id: user_id,
            email: "ada@example.com".into(),
            full_name: "Ada".into(),
            password_hash: "$argon2id$stub".into(),
            created_at: time::OffsetDateTime::now_utc(),
        };
        assert_eq!(require_user(user_id, Some(user)).unwrap().id, user_id);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let keys = keys();
        let token = keys.sign_refresh(Uuid::new_v4()).unwrap();
        let err = access_subject(&headers_with(&format!("Bearer {token}")), &keys).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
