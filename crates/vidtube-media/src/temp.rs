use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

/// An uploaded file spooled to local disk before it is pushed to the media
/// store. The file is removed when the handle drops, so requests rejected
/// before the upload step don't leave anything behind.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Write `data` under `dir` with a random name, keeping the extension of
    /// `original_name` so the provider can sniff the type.
    pub async fn write(dir: &Path, original_name: Option<&str>, data: &[u8]) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let mut name = Uuid::new_v4().to_string();
        if let Some(ext) = original_name.and_then(safe_extension) {
            name.push('.');
            name.push_str(&ext);
        }

        let path = dir.join(name);
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        debug!("Spooled {} bytes to {}", data.len(), path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        // Usually already gone: the upload step removes it.
        let _ = std::fs::remove_file(&self.path);
    }
}

fn safe_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 10 || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
