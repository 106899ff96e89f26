use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use vidtube_db::Database;
use vidtube_media::MediaAssets;

use crate::error::{ApiError, ApiResult};
use crate::session::SessionManager;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub media: MediaAssets,
    pub sessions: SessionManager,
    pub settings: ApiSettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Where multipart file fields are spooled before upload.
    pub temp_dir: PathBuf,
    pub admin_routes: AdminRoutePolicy,
    /// Mark session cookies `Secure`. Only worth turning off for plain-HTTP
    /// local development.
    pub secure_cookies: bool,
}

/// Who may call the administrative user routes (`DELETE /users/delete`,
/// `GET /users/getAll`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminRoutePolicy {
    /// No authentication at all.
    Open,
    /// Any authenticated user.
    Authenticated,
    /// Routes answer 404.
    Disabled,
}

impl FromStr for AdminRoutePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(AdminRoutePolicy::Open),
            "authenticated" => Ok(AdminRoutePolicy::Authenticated),
            "disabled" => Ok(AdminRoutePolicy::Disabled),
            other => Err(format!(
                "unknown admin route policy '{other}' (expected open, authenticated or disabled)"
            )),
        }
    }
}

/// Run a blocking DB call off the async runtime.
///
/// UNIQUE constraint failures come back as `Conflict`; everything else is an
/// infrastructure error.
pub async fn run_db<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
        .map_err(|e| {
            if vidtube_db::is_unique_violation(&e) {
                ApiError::conflict("User with email or username already exists")
            } else {
                ApiError::Infra(e)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_policy_parses_case_insensitively() {
        assert_eq!("Open".parse::<AdminRoutePolicy>(), Ok(AdminRoutePolicy::Open));
        assert_eq!(" authenticated ".parse::<AdminRoutePolicy>(), Ok(AdminRoutePolicy::Authenticated));
        assert_eq!("DISABLED".parse::<AdminRoutePolicy>(), Ok(AdminRoutePolicy::Disabled));
        assert!("admins-only".parse::<AdminRoutePolicy>().is_err());
    }
}
