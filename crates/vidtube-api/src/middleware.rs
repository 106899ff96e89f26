use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use vidtube_types::models::PublicUser;

use crate::auth::ACCESS_COOKIE;
use crate::error::{ApiError, ApiResult};
use crate::state::{AdminRoutePolicy, AppState, run_db};

/// The authenticated caller, inserted as a request extension by
/// [`require_auth`]. Loaded fresh from the database on every request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

/// Access token from the `accessToken` cookie, else from
/// `Authorization: Bearer <token>`.
fn access_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> ApiResult<CurrentUser> {
    let token = access_token(headers).ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;
    let claims = state.sessions.verify_access(&token)?;

    let user = run_db(state, move |db| db.get_user_by_id(&claims.sub))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    Ok(CurrentUser(user.into()))
}

/// Reject the request unless it carries a valid access token.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Gate for the administrative user routes, driven by
/// [`AdminRoutePolicy`].
pub async fn admin_gate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match state.settings.admin_routes {
        AdminRoutePolicy::Open => {}
        AdminRoutePolicy::Authenticated => {
            let user = authenticate(&state, req.headers()).await?;
            req.extensions_mut().insert(user);
        }
        AdminRoutePolicy::Disabled => return Err(ApiError::not_found("Route not found")),
    }
    Ok(next.run(req).await)
}
