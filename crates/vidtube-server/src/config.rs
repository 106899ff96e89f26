use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use vidtube_api::session::TokenSettings;
use vidtube_api::state::{AdminRoutePolicy, ApiSettings};
use vidtube_media::CloudinaryConfig;
use vidtube_media::cloudinary::DEFAULT_API_BASE;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-access-token-secret",
    "your-refresh-token-secret",
];

/// Everything the server reads from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Exact origin allowed to send credentials. `None` means permissive CORS.
    pub cors_origin: Option<String>,
    pub body_limit_bytes: usize,
    pub tokens: TokenSettings,
    pub cloudinary: CloudinaryConfig,
    pub api: ApiSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{key} must be set"));

        let port = parsed(var("VIDTUBE_PORT"), "VIDTUBE_PORT", 8000u16)?;
        let access_ttl = parsed(var("ACCESS_TOKEN_EXPIRY_SECS"), "ACCESS_TOKEN_EXPIRY_SECS", 86_400u64)?;
        let refresh_ttl = parsed(var("REFRESH_TOKEN_EXPIRY_SECS"), "REFRESH_TOKEN_EXPIRY_SECS", 864_000u64)?;
        let cloudinary_timeout = parsed(var("CLOUDINARY_TIMEOUT_SECS"), "CLOUDINARY_TIMEOUT_SECS", 60u64)?;
        let body_limit_mb = parsed(var("VIDTUBE_BODY_LIMIT_MB"), "VIDTUBE_BODY_LIMIT_MB", 512usize)?;
        let secure_cookies = parsed(var("VIDTUBE_SECURE_COOKIES"), "VIDTUBE_SECURE_COOKIES", true)?;
        let admin_routes = match var("VIDTUBE_ADMIN_ROUTES") {
            Some(v) => v.parse::<AdminRoutePolicy>().map_err(|e| anyhow!("VIDTUBE_ADMIN_ROUTES: {e}"))?,
            None => AdminRoutePolicy::Authenticated,
        };

        Ok(Self {
            host: var("VIDTUBE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("VIDTUBE_DB_PATH").unwrap_or_else(|| "vidtube.db".into()).into(),
            cors_origin: var("CORS_ORIGIN"),
            body_limit_bytes: body_limit_mb * 1024 * 1024,
            tokens: TokenSettings {
                access_secret: var("ACCESS_TOKEN_SECRET").unwrap_or_default(),
                access_ttl: Duration::from_secs(access_ttl),
                refresh_secret: var("REFRESH_TOKEN_SECRET").unwrap_or_default(),
                refresh_ttl: Duration::from_secs(refresh_ttl),
            },
            cloudinary: CloudinaryConfig {
                cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
                api_base: var("CLOUDINARY_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
                timeout: Duration::from_secs(cloudinary_timeout),
            },
            api: ApiSettings {
                temp_dir: var("VIDTUBE_TEMP_DIR").unwrap_or_else(|| "./public/temp".into()).into(),
                admin_routes,
                secure_cookies,
            },
        })
    }

    /// Names of the JWT secret variables that are unset or still a placeholder.
    pub fn weak_secrets(&self) -> Vec<&'static str> {
        let weak = |s: &str| s.is_empty() || PLACEHOLDER_SECRETS.contains(&s);
        let mut names = Vec::new();
        if weak(&self.tokens.access_secret) {
            names.push("ACCESS_TOKEN_SECRET");
        }
        if weak(&self.tokens.refresh_secret) {
            names.push("REFRESH_TOKEN_SECRET");
        }
        names
    }
}

fn parsed<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v.parse().with_context(|| format!("{key} has an invalid value '{v}'")),
        None => Ok(default),
    }
}
