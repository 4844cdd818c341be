use axum::{
    extract::{FromRef, State},
    http::HeaderName,
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::{CookieJar, WithRejection};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, OkResponse, PublicUser, RegisterRequest},
        extractors::CurrentUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::is_unique_violation,
        repo_types::User,
        services::{
            expired_refresh_cookie, refresh_cookie, validate_login, validate_register,
            ACCESS_TOKEN_HEADER, REFRESH_COOKIE,
        },
    },
    errors::AppError,
    state::AppState,
};

type AccessHeader = [(HeaderName, String); 1];

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/account", delete(delete_account))
}

/// Signs a fresh access/refresh pair and attaches them to the response:
/// access token in the header, refresh token in the cookie jar.
fn issue_session(
    state: &AppState,
    jar: CookieJar,
    user: &User,
) -> Result<(CookieJar, AccessHeader), AppError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        AppError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(user.id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        AppError::Internal(e)
    })?;

    let jar = jar.add(refresh_cookie(
        refresh_token,
        keys.refresh_ttl,
        state.config.cookie_secure,
    ));
    Ok((jar, [(ACCESS_TOKEN_HEADER, access_token)]))
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(mut payload), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<(CookieJar, AccessHeader, Json<PublicUser>), AppError> {
    if let Err(e) = validate_register(&mut payload) {
        warn!(email = %payload.email, error = %e, "invalid registration");
        return Err(e);
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict("Email already in use".into()));
    }

    let hash = hash_password(&payload.password)?;

    let user = match User::create(&state.db, &payload.email, &payload.full_name, &hash).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "email registered concurrently");
            return Err(AppError::Conflict("Email already in use".into()));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(e.into());
        }
    };

    let (jar, header) = issue_session(&state, jar, &user)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((jar, header, Json(user.into())))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(mut payload), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<(CookieJar, AccessHeader, Json<PublicUser>), AppError> {
    validate_login(&mut payload)?;

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::unauthorized("Invalid credentials"));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let (jar, header) = issue_session(&state, jar, &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok((jar, header, Json(user.into())))
}

/// Mints a new access token from the refresh cookie. The refresh token itself
/// is left untouched and stays valid until its own expiry.
#[instrument(skip(state, jar))]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(AccessHeader, Json<OkResponse>), AppError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing refresh token"))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        AppError::unauthorized("Invalid refresh token")
    })?;

    let access_token = keys.sign_access(claims.sub)?;
    info!(user_id = %claims.sub, "access token refreshed");
    Ok(([(ACCESS_TOKEN_HEADER, access_token)], Json(OkResponse::ok())))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<OkResponse>) {
    (jar.remove(expired_refresh_cookie()), Json(OkResponse::ok()))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

pub async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<OkResponse>), AppError> {
    User::delete(&state.db, user.id).await?;
    info!(user_id = %user.id, "account deleted");
    Ok((jar.remove(expired_refresh_cookie()), Json(OkResponse::ok())))
}
