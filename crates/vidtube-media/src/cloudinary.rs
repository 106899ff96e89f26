use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::store::{MediaStore, ResourceKind, UploadedAsset};

pub const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
    pub timeout: Duration,
}

/// Cloudinary upload API client. Every call is signed with the account
/// secret; nothing is cached between calls.
pub struct CloudinaryStore {
    config: CloudinaryConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    url: Option<String>,
    secure_url: Option<String>,
    resource_type: String,
    duration: Option<f64>,
    bytes: Option<u64>,
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build Cloudinary HTTP client")?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, resource: &str, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            resource,
            action
        )
    }

    async fn read_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            bail!("Cloudinary returned {}: {}", status, message);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(&self, path: &Path) -> Result<UploadedAsset> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(&[("timestamp", timestamp.as_str())], &self.config.api_secret);

        let form = Form::new()
            .part("file", Part::bytes(data).file_name(file_name))
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let resp = self
            .http
            .post(self.endpoint("auto", "upload"))
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = Self::read_json(resp).await?;

        let resource_kind = ResourceKind::parse(&uploaded.resource_type).ok_or_else(|| {
            anyhow!("Unknown resource type from Cloudinary: {}", uploaded.resource_type)
        })?;
        let url = uploaded
            .secure_url
            .or(uploaded.url)
            .ok_or_else(|| anyhow!("Cloudinary response carried no URL"))?;

        debug!("Uploaded {} to Cloudinary as {}", path.display(), uploaded.public_id);
        Ok(UploadedAsset {
            public_id: uploaded.public_id,
            url,
            resource_kind,
            duration: uploaded.duration,
            bytes: uploaded.bytes,
            format: uploaded.format,
        })
    }

    async fn destroy(&self, public_id: &str, kind: ResourceKind) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            &self.config.api_secret,
        );

        let resp = self
            .http
            .post(self.endpoint(kind.as_str(), "destroy"))
            .form(&[
                ("public_id", public_id),
                ("api_key", self.config.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;
        let destroyed: DestroyResponse = Self::read_json(resp).await?;

        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => bail!("Cloudinary refused to destroy {}: {}", public_id, other),
        }
    }
}

/// Cloudinary request signature: parameters sorted by name, joined as
/// `k=v&k=v`, secret appended, SHA-1, lowercase hex.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
