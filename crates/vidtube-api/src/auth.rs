use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use bytes::Bytes;
use serde_json::json;
use tracing::info;

use vidtube_types::api::{LoginRequest, LoginResponse, RefreshRequest, TokenPairResponse};

use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::response::{non_blank, parse_json, respond};
use crate::session::{TokenPair, rotate_session, verify_password};
use crate::state::{AppState, run_db};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

// -- Cookie helpers --

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .path("/")
        .build()
}

fn set_session_cookies(jar: CookieJar, pair: &TokenPair, secure: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, pair.access_token.clone(), secure))
        .add(session_cookie(REFRESH_COOKIE, pair.refresh_token.clone(), secure))
}

/// Expire both cookies, whether or not the request carried them.
fn clear_session_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    let mut access = session_cookie(ACCESS_COOKIE, String::new(), secure);
    access.make_removal();
    let mut refresh = session_cookie(REFRESH_COOKIE, String::new(), secure);
    refresh.make_removal();
    jar.add(access).add(refresh)
}

// -- Handlers --

/// POST /users/login: username or email plus password.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> ApiResult<Response> {
    let req: LoginRequest = parse_json(&body)?;

    let username = non_blank(req.username.as_deref()).map(str::to_lowercase);
    let email = non_blank(req.email.as_deref()).map(str::to_lowercase);
    if username.is_none() && email.is_none() {
        return Err(ApiError::invalid("Email or username is required"));
    }
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::invalid("Password is required"))?;

    let user = run_db(&state, move |db| {
        db.find_user_by_username_or_email(username.as_deref(), email.as_deref())
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(&password, &user.password) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let pair = rotate_session(&state, &user.id).await?;
    info!("User {} logged in", user.username);

    let jar = set_session_cookies(jar, &pair, state.settings.secure_cookies);
    let body = LoginResponse {
        user: user.into(),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    };
    Ok((jar, respond(StatusCode::OK, body, "User logged in successfully")).into_response())
}

/// POST /users/logout: drops the stored refresh token and the cookies.
pub async fn logout(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    jar: CookieJar,
) -> ApiResult<Response> {
    let id = user.id.clone();
    run_db(&state, move |db| db.set_refresh_token(&id, None)).await?;
    info!("User {} logged out", user.username);

    let jar = clear_session_cookies(jar, state.settings.secure_cookies);
    Ok((jar, respond(StatusCode::OK, json!({}), "User logged out successfully")).into_response())
}

/// POST /users/refresh-token: exchanges the current refresh token (cookie or
/// body) for a new pair. The presented token must be the one stored on the
/// user, so each refresh token works exactly once.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> ApiResult<Response> {
    let from_cookie = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let incoming = match from_cookie {
        Some(token) => token,
        None => parse_json::<RefreshRequest>(&body)?
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?,
    };

    let claims = state.sessions.verify_refresh(&incoming)?;

    let user = run_db(&state, move |db| db.get_user_by_id(&claims.sub))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    if user.refresh_token.as_deref() != Some(incoming.as_str()) {
        return Err(ApiError::unauthorized("Refresh token expired or used"));
    }

    // Conditional swap: of two requests racing with the same token, only one
    // finds it still stored.
    let pair = state.sessions.issue_pair(&user)?;
    let token = pair.refresh_token.clone();
    let swapped = run_db(&state, move |db| {
        db.replace_refresh_token(&user.id, &incoming, &token)
    })
    .await?;
    if !swapped {
        return Err(ApiError::unauthorized("Refresh token expired or used"));
    }

    let jar = set_session_cookies(jar, &pair, state.settings.secure_cookies);
    let body = TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    };
    Ok((jar, respond(StatusCode::OK, body, "Access token refreshed")).into_response())
}
