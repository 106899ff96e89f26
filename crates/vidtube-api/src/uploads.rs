use std::collections::HashMap;
use std::path::Path;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartRejection;
use vidtube_media::TempFile;

use crate::error::{ApiError, ApiResult};
use crate::response::non_blank;

/// A multipart form with its file fields spooled to the temp directory.
/// Dropping the form removes any file that was never uploaded.
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, TempFile>,
}

impl MultipartForm {
    /// Read every part of `multipart`. Only the names in `file_fields` are
    /// accepted as files, at most one each; empty files count as absent.
    pub async fn read(
        multipart: Result<Multipart, MultipartRejection>,
        temp_dir: &Path,
        file_fields: &[&str],
    ) -> ApiResult<Self> {
        let mut multipart =
            multipart.map_err(|e| ApiError::invalid(format!("Expected a multipart form: {e}")))?;

        let mut fields = HashMap::new();
        let mut files = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::invalid(format!("Multipart error: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if field.file_name().is_none() && !file_fields.contains(&name.as_str()) {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::invalid(format!("Read error: {e}")))?;
                fields.insert(name, text);
                continue;
            }

            if !file_fields.contains(&name.as_str()) || files.contains_key(&name) {
                return Err(ApiError::invalid(format!("Unexpected file field: {name}")));
            }

            let original_name = field.file_name().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::invalid(format!("Read error: {e}")))?;
            if data.is_empty() {
                continue;
            }

            let temp = TempFile::write(temp_dir, original_name.as_deref(), &data).await?;
            files.insert(name, temp);
        }

        Ok(Self { fields, files })
    }

    /// Trimmed text field, `None` when missing or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        non_blank(self.fields.get(name).map(String::as_str))
    }

    /// Untrimmed text field, `None` when missing or blank. For values such as
    /// passwords where surrounding whitespace is significant.
    pub fn raw_text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<TempFile> {
        self.files.remove(name)
    }
}
