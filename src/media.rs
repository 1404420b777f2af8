use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Uploaded images on local disk, addressed by a relative key such as
/// `{user_id}/{millis}.jpg`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a key to a file under the root. Absolute keys and `..` are refused.
    pub fn resolve(&self, key: &str) -> Option<PathBuf> {
        let rel = Path::new(key);
        if key.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(rel))
    }

    pub async fn save(&self, key: &str, data: &[u8]) -> AppResult<()> {
        let path = self
            .resolve(key)
            .ok_or_else(|| AppError::BadRequest("Invalid media key".into()))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        tracing::debug!(key, bytes = data.len(), "Stored media");
        Ok(())
    }

    /// Removing a file that is already gone is not an error.
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let Some(path) = self.resolve(key) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read(&self, key: &str) -> AppResult<Vec<u8>> {
        let path = self.resolve(key).ok_or(AppError::NotFound)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub fn url_for(key: &str) -> String {
        format!("/media/{}", key)
    }
}

/// Picks a file extension for an upload from its declared name, then its
/// content type.
pub fn extension_for(file_name: Option<&str>, content_type: &str) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .or_else(|| {
            mime_guess::get_mime_extensions_str(content_type)
                .and_then(|exts| exts.first())
                .map(|ext| ext.to_string())
        })
        .unwrap_or_else(|| "bin".to_string())
}

/// A file part from a multipart upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub data: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

impl Upload {
    pub fn ensure_image(&self, max_bytes: usize) -> AppResult<()> {
        if !self.content_type.starts_with("image/") {
            return Err(AppError::BadRequest("Upload must be an image".into()));
        }
        if self.data.len() > max_bytes {
            return Err(AppError::BadRequest(format!(
                "Image must be at most {} MB",
                max_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }

    pub fn extension(&self) -> String {
        extension_for(self.file_name.as_deref(), &self.content_type)
    }
}

/// Text fields plus at most one file part, keyed by field name.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<Upload>,
}

impl UploadForm {
    /// Drains the multipart body. Empty file parts count as no file.
    pub async fn read(multipart: &mut Multipart, file_field: &str) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == file_field {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await?;
                if !data.is_empty() {
                    form.file = Some(Upload {
                        data,
                        content_type,
                        file_name,
                    });
                }
            } else {
                form.fields.insert(name, field.text().await?);
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// GET /media/{*key}
pub async fn serve(
    State(state): State<AppState>,
    UrlPath(key): UrlPath<String>,
) -> AppResult<Response> {
    let data = state.media.read(&key).await?;
    let mime = mime_guess::from_path(&key).first_or_octet_stream();

    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_escapes() {
        let store = MediaStore::new("/srv/media");
        assert_eq!(
            store.resolve("u1/123.jpg"),
            Some(PathBuf::from("/srv/media/u1/123.jpg"))
        );
        assert!(store.resolve("../etc/passwd").is_none());
        assert!(store.resolve("u1/../../x").is_none());
        assert!(store.resolve("/etc/passwd").is_none());
        assert!(store.resolve("").is_none());
    }

    #[tokio::test]
    async fn save_read_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path());

        store.save("u1/1.png", b"png-bytes").await.unwrap();
        assert_eq!(store.read("u1/1.png").await.unwrap(), b"png-bytes");

        store.delete("u1/1.png").await.unwrap();
        assert!(matches!(
            store.read("u1/1.png").await,
            Err(AppError::NotFound)
        ));
        // second delete is a no-op
        store.delete("u1/1.png").await.unwrap();
    }

    #[test]
    fn extension_prefers_file_name() {
        assert_eq!(extension_for(Some("Photo.JPG"), "image/png"), "jpg");
        assert_eq!(extension_for(None, "image/png"), "png");
        assert_eq!(extension_for(Some("noext"), "application/x-unknown-thing"), "bin");
    }

    #[test]
    fn only_small_images_pass() {
        let upload = |content_type: &str, len: usize| Upload {
            data: Bytes::from(vec![0u8; len]),
            content_type: content_type.to_string(),
            file_name: None,
        };
        assert!(upload("image/jpeg", 10).ensure_image(100).is_ok());
        assert!(upload("text/plain", 10).ensure_image(100).is_err());
        assert!(upload("image/png", 101).ensure_image(100).is_err());
    }

    #[test]
    fn public_url() {
        assert_eq!(MediaStore::url_for("u1/5.webp"), "/media/u1/5.webp");
    }
}
