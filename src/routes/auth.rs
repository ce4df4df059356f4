use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;

use crate::auth::middleware::{AuthUser, COOKIE_NAME};
use crate::error::AppError;
use crate::models::user::{LoginRequest, UserResponse};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<UserResponse>), AppError> {
    let username = body.username.trim();

    if username != state.config.admin_username || body.password != state.config.admin_password {
        return Err(AppError::InvalidCredentials);
    }

    let token = state.sessions.create(username);
    let cookie = build_auth_cookie(token);

    Ok((
        jar.add(cookie),
        Json(UserResponse {
            username: username.to_string(),
            is_admin: true,
        }),
    ))
}

async fn logout(State(state): State<AppState>, jar: CookieJar) -> CookieJar {
    if let Some(cookie) = jar.get(COOKIE_NAME) {
        state.sessions.remove(cookie.value());
    }
    jar.remove(Cookie::build(COOKIE_NAME).path("/"))
}

async fn me(auth: AuthUser) -> Json<UserResponse> {
    Json(UserResponse {
        username: auth.username,
        is_admin: true,
    })
}

fn build_auth_cookie(token: String) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(24))
        .build()
}
