use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::public_id::asset_ref_from_url;
use crate::store::{MediaStore, ResourceKind, UploadedAsset};

/// Best-effort asset lifecycle on top of a [`MediaStore`].
///
/// Nothing here returns an error: a failed upload comes back as `None`, a
/// failed delete as `false`, and the cause is logged. Callers decide what a
/// missing asset means for their request.
#[derive(Clone)]
pub struct MediaAssets {
    store: Arc<dyn MediaStore>,
}

impl MediaAssets {
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self { store }
    }

    /// Push a local file to the store. The local file is removed whatever the
    /// outcome.
    pub async fn upload(&self, local_path: Option<&Path>) -> Option<UploadedAsset> {
        let Some(path) = local_path else {
            error!("No local file path provided for upload");
            return None;
        };

        let result = self.store.upload(path).await;

        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove local file {}: {}", path.display(), e);
            }
        }

        match result {
            Ok(asset) => Some(asset),
            Err(e) => {
                error!("Error uploading {} to media store: {:#}", path.display(), e);
                None
            }
        }
    }

    /// Remove an asset by public id. Returns whether the store confirmed it.
    pub async fn delete(&self, public_id: Option<&str>, kind: ResourceKind) -> bool {
        let Some(public_id) = public_id.filter(|id| !id.is_empty()) else {
            error!("No public id provided for deletion");
            return false;
        };

        match self.store.destroy(public_id, kind).await {
            Ok(()) => {
                info!("Deleted {} {} from media store", kind, public_id);
                true
            }
            Err(e) => {
                error!("Error deleting {} {} from media store: {:#}", kind, public_id, e);
                false
            }
        }
    }

    /// Remove the asset behind a stored delivery URL. The kind encoded in the
    /// URL wins over `fallback`.
    pub async fn delete_by_url(&self, url: Option<&str>, fallback: ResourceKind) -> bool {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return false;
        };

        match asset_ref_from_url(url) {
            Some(asset) => {
                self.delete(Some(&asset.public_id), asset.kind.unwrap_or(fallback))
                    .await
            }
            None => {
                warn!("Cannot derive public id from asset URL {}", url);
                false
            }
        }
    }

    /// Compensating deletion for assets whose owning record never made it to
    /// the database. Every asset gets exactly one delete attempt.
    pub async fn compensate(&self, uploaded: &[&UploadedAsset]) {
        for asset in uploaded {
            if !self.delete(Some(&asset.public_id), asset.resource_kind).await {
                warn!("Compensating delete failed, asset {} may be orphaned", asset.public_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use anyhow::{Result, bail};
    use async_trait::async_trait;

    #[derive(Default)]
    struct Recorder {
        fail_uploads: bool,
        fail_deletes: bool,
        deleted: Mutex<Vec<(String, ResourceKind)>>,
    }

    #[async_trait]
    impl MediaStore for Recorder {
        async fn upload(&self, path: &Path) -> Result<UploadedAsset> {
            if self.fail_uploads {
                bail!("rejected");
            }
            Ok(UploadedAsset {
                public_id: path.file_stem().unwrap().to_string_lossy().into_owned(),
                url: "https://res.cloudinary.com/demo/image/upload/v1/x.png".into(),
                resource_kind: ResourceKind::Image,
                duration: None,
                bytes: None,
                format: None,
            })
        }

        async fn destroy(&self, public_id: &str, kind: ResourceKind) -> Result<()> {
            self.deleted.lock().unwrap().push((public_id.to_string(), kind));
            if self.fail_deletes {
                bail!("destroy failed");
            }
            Ok(())
        }
    }

    fn local_file(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"data").unwrap();
        path
    }

    #[tokio::test]
    async fn upload_removes_local_file_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "ok.png");
        let assets = MediaAssets::new(Arc::new(Recorder::default()));

        let asset = assets.upload(Some(&path)).await.unwrap();
        assert_eq!(asset.public_id, "ok");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn upload_removes_local_file_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "bad.png");
        let assets = MediaAssets::new(Arc::new(Recorder { fail_uploads: true, ..Default::default() }));

        assert!(assets.upload(Some(&path)).await.is_none());
        assert!(!path.exists());
        assert!(assets.upload(None).await.is_none());
    }

    #[tokio::test]
    async fn delete_without_id_is_a_noop() {
        let store = Arc::new(Recorder::default());
        let assets = MediaAssets::new(store.clone());

        assert!(!assets.delete(None, ResourceKind::Image).await);
        assert!(!assets.delete(Some(""), ResourceKind::Image).await);
        assert!(!assets.delete_by_url(Some("garbage"), ResourceKind::Image).await);
        assert!(store.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_by_url_uses_kind_from_url() {
        let store = Arc::new(Recorder::default());
        let assets = MediaAssets::new(store.clone());

        let url = "https://res.cloudinary.com/demo/video/upload/v3/clips/a.mp4";
        assert!(assets.delete_by_url(Some(url), ResourceKind::Image).await);
        assert_eq!(
            *store.deleted.lock().unwrap(),
            vec![("clips/a".to_string(), ResourceKind::Video)]
        );
    }

    #[tokio::test]
    async fn compensation_attempts_every_asset_even_when_deletes_fail() {
        let store = Arc::new(Recorder { fail_deletes: true, ..Default::default() });
        let assets = MediaAssets::new(store.clone());

        let a = UploadedAsset {
            public_id: "a".into(),
            url: "u".into(),
            resource_kind: ResourceKind::Video,
            duration: Some(3.0),
            bytes: None,
            format: None,
        };
        let b = UploadedAsset { public_id: "b".into(), resource_kind: ResourceKind::Image, ..a.clone() };

        assets.compensate(&[&a, &b]).await;
        let deleted = store.deleted.lock().unwrap();
        assert_eq!(deleted.len(), 2);
        assert_eq!(deleted[0].0, "a");
        assert_eq!(deleted[1], ("b".to_string(), ResourceKind::Image));
    }
}
