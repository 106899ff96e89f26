use std::fmt;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Provider resource class. Deletes must name the class the asset was
/// stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Video,
    Raw,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Image => "image",
            ResourceKind::Video => "video",
            ResourceKind::Raw => "raw",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(ResourceKind::Image),
            "video" => Some(ResourceKind::Video),
            "raw" => Some(ResourceKind::Raw),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the provider reports back for a stored asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub public_id: String,
    pub url: String,
    pub resource_kind: ResourceKind,
    /// Seconds, only reported for audio/video.
    pub duration: Option<f64>,
    pub bytes: Option<u64>,
    pub format: Option<String>,
}

/// Remote object store holding user media.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Push a local file, letting the provider detect its resource kind.
    async fn upload(&self, path: &Path) -> Result<UploadedAsset>;

    async fn destroy(&self, public_id: &str, kind: ResourceKind) -> Result<()>;
}
