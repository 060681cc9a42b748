use axum::http::HeaderMap;
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde::Serialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::AppState,
    models::{Role, User},
    utils::verify_token,
};

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
        }
    }
}

fn bearer_or_cookie(headers: &HeaderMap, cookies: &Cookies) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }
    cookies.get(AUTH_COOKIE).map(|cookie| cookie.value().to_string())
}

/// Resolves the caller from a bearer token (or the `auth_token` cookie).
/// Unknown, inactive or unverifiable callers yield `Ok(None)`; a failed user
/// lookup is an error.
pub async fn get_current_user(
    headers: &HeaderMap,
    cookies: &Cookies,
    state: &AppState,
) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = bearer_or_cookie(headers, cookies) else {
        return Ok(None);
    };

    let claims = match verify_token(&token, &state.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            log::debug!("Rejected auth token: {}", e);
            return Ok(None);
        }
    };
    let Some(user_id) = claims.user_id() else {
        return Ok(None);
    };

    let user = state.sales.store().find_user(user_id).await?;

    Ok(user.filter(|user| user.is_active).map(CurrentUser::from))
}
