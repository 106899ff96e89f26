use std::time::Duration;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use vidtube_db::models::UserRow;
use vidtube_types::api::{AccessClaims, RefreshClaims};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, run_db};

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
}

pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Mints and verifies the access/refresh token pair. Access and refresh
/// tokens are signed with different secrets so one can never stand in for
/// the other.
pub struct SessionManager {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl SessionManager {
    pub fn new(settings: &TokenSettings) -> anyhow::Result<Self> {
        Ok(Self {
            access_encoding: EncodingKey::from_secret(settings.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(settings.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(settings.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(settings.refresh_secret.as_bytes()),
            access_ttl: chrono::Duration::from_std(settings.access_ttl)?,
            refresh_ttl: chrono::Duration::from_std(settings.refresh_ttl)?,
        })
    }

    pub fn issue_pair(&self, user: &UserRow) -> anyhow::Result<TokenPair> {
        let now = chrono::Utc::now();

        let access = AccessClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            fullname: user.fullname.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.access_ttl).timestamp() as usize,
        };
        let refresh = RefreshClaims {
            sub: user.id.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.refresh_ttl).timestamp() as usize,
        };

        Ok(TokenPair {
            access_token: encode(&Header::default(), &access, &self.access_encoding)?,
            refresh_token: encode(&Header::default(), &refresh, &self.refresh_encoding)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> ApiResult<AccessClaims> {
        decode::<AccessClaims>(token, &self.access_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected access token: {}", e);
                ApiError::unauthorized("Invalid access token")
            })
    }

    pub fn verify_refresh(&self, token: &str) -> ApiResult<RefreshClaims> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected refresh token: {}", e);
                ApiError::unauthorized("Invalid refresh token")
            })
    }
}

/// Mint a fresh pair for `user_id` and store its refresh token, replacing
/// whatever session the user had before.
pub async fn rotate_session(state: &AppState, user_id: &str) -> ApiResult<TokenPair> {
    let id = user_id.to_string();
    let user = run_db(state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    let pair = state.sessions.issue_pair(&user)?;

    let token = pair.refresh_token.clone();
    run_db(state, move |db| db.set_refresh_token(&user.id, Some(&token))).await?;

    Ok(pair)
}

/// Argon2id PHC string for `password`.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::warn!("Stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
