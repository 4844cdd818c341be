use std::time::Duration;

use axum::http::HeaderName;
use axum_extra::extract::cookie::{Cookie, SameSite};
use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::dto::{LoginRequest, RegisterRequest};
use crate::errors::AppError;

/// Response header carrying a freshly minted access token.
pub const ACCESS_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-access-token");
pub const REFRESH_COOKIE: &str = "refresh_token";
const REFRESH_COOKIE_PATH: &str = "/";

const NAME_MAX: usize = 200;
const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 128;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        return Err(AppError::bad_input("Password too short"));
    }
    if len > PASSWORD_MAX {
        return Err(AppError::bad_input("Password too long"));
    }
    Ok(())
}

/// Normalizes email and name in place, then validates every field.
pub(crate) fn validate_register(req: &mut RegisterRequest) -> Result<(), AppError> {
    req.email = normalize_email(&req.email);
    req.full_name = req.full_name.trim().to_string();

    if !is_valid_email(&req.email) {
        return Err(AppError::bad_input("Invalid email"));
    }
    let name_len = req.full_name.chars().count();
    if name_len == 0 || name_len > NAME_MAX {
        return Err(AppError::bad_input("Full name must be 1-200 characters"));
    }
    check_password(&req.password)
}

pub(crate) fn validate_login(req: &mut LoginRequest) -> Result<(), AppError> {
    req.email = normalize_email(&req.email);
    if !is_valid_email(&req.email) {
        return Err(AppError::bad_input("Invalid email"));
    }
    check_password(&req.password)
}

/// HTTP-only, SameSite=Lax cookie holding the refresh token.
pub(crate) fn refresh_cookie(token: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(REFRESH_COOKIE_PATH)
        .max_age(time::Duration::seconds(ttl.as_secs() as i64))
        .build()
}

pub(crate) fn expired_refresh_cookie() -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, ""))
        .path(REFRESH_COOKIE_PATH)
        .build()
}
