//! Storage of uploaded binary assets.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::RwLock;
use url::Url;
use uuid::Uuid;

use crate::error::ServerError;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error("invalid blob path `{0}`")]
    Path(String),
}

/// Object storage addressed by public URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `path` and return the URL they are served from.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError>;

    /// Delete the object served from `url`.
    async fn delete(&self, url: &str) -> Result<(), BlobError>;
}

/// Delete a superseded object. Failures are logged and swallowed.
pub async fn release(store: &dyn BlobStore, url: &str) {
    if let Err(err) = store.delete(url).await {
        tracing::warn!(error = %err, %url, "failed to release blob");
    }
}

fn sanitize(path: &str) -> Result<PathBuf, BlobError> {
    let path = Path::new(path);
    if path.components().all(|c| matches!(c, Component::Normal(_))) {
        Ok(path.to_path_buf())
    } else {
        Err(BlobError::Path(path.display().to_string()))
    }
}

/// Blob store writing into a local directory, served under a public URL.
pub struct DiskBlobStore {
    root: PathBuf,
    public_url: Url,
}

impl DiskBlobStore {
    /// Create a new [`DiskBlobStore`]. `public_url` must end with `/`.
    pub fn new(root: impl Into<PathBuf>, public_url: Url) -> Self {
        Self {
            root: root.into(),
            public_url,
        }
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
        let relative = sanitize(path)?;
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        tracing::debug!(%path, %content_type, "blob stored");
        Ok(self.public_url.join(path)?.to_string())
    }

    async fn delete(&self, url: &str) -> Result<(), BlobError> {
        let Some(path) = url.strip_prefix(self.public_url.as_str()) else {
            return Err(BlobError::Path(url.to_owned()));
        };

        match tokio::fs::remove_file(self.root.join(sanitize(path)?)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Blob store keeping objects in memory.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    const BASE_URL: &'static str = "memory://blobs/";

    pub async fn contains(&self, url: &str) -> bool {
        self.objects.read().await.contains_key(url)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
        sanitize(path)?;
        let url = format!("{}{path}", Self::BASE_URL);
        self.objects
            .write()
            .await
            .insert(url.clone(), (bytes, content_type.to_owned()));
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), BlobError> {
        self.objects.write().await.remove(url);
        Ok(())
    }
}

/// Asset decoded from a JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Upload {
    /// Decode `data:<mime>;base64,<payload>` or bare base64.
    pub fn decode(field: &'static str, input: &str, max_size: usize) -> Result<Self, ServerError> {
        let input = input.trim();
        let (content_type, payload) = match input.strip_prefix("data:") {
            Some(rest) => {
                let Some((meta, payload)) = rest.split_once(',') else {
                    return Err(ServerError::field(field, "data_url", "Malformed data URL."));
                };
                let Some(mime) = meta.strip_suffix(";base64") else {
                    return Err(ServerError::field(field, "data_url", "Data URL must be base64 encoded."));
                };
                let mime = if mime.is_empty() { DEFAULT_CONTENT_TYPE } else { mime };
                (mime.to_owned(), payload)
            },
            None => (DEFAULT_CONTENT_TYPE.to_owned(), input),
        };

        // Reject before allocating when the payload cannot fit.
        if payload.len() / 4 * 3 > max_size + 2 {
            return Err(too_large(field));
        }

        let bytes = STANDARD
            .decode(payload)
            .map_err(|_| ServerError::field(field, "base64", "File must be base64 encoded."))?;
        if bytes.is_empty() {
            return Err(ServerError::field(field, "length", "File cannot be empty."));
        }
        if bytes.len() > max_size {
            return Err(too_large(field));
        }

        Ok(Self {
            bytes,
            content_type,
        })
    }

    /// File extension matching the content type.
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "application/pdf" => "pdf",
            _ => "bin",
        }
    }

    /// Store the asset under `{prefix}/{owner}/{random}.{ext}`.
    pub async fn store(
        self,
        blob: &dyn BlobStore,
        prefix: &str,
        owner: Uuid,
    ) -> Result<String, BlobError> {
        let path = format!("{prefix}/{owner}/{}.{}", Uuid::new_v4(), self.extension());
        blob.put(&path, self.bytes, &self.content_type).await
    }
}

fn too_large(field: &'static str) -> ServerError {
    ServerError::field(field, "size", "File is too large.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_url() {
        let upload = Upload::decode("logo", "data:image/png;base64,aGVsbG8=", 1024).unwrap();
        assert_eq!(upload.bytes, b"hello");
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(upload.extension(), "png");

        let upload = Upload::decode("file", "aGVsbG8=", 1024).unwrap();
        assert_eq!(upload.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(upload.extension(), "bin");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        for input in ["data:image/png,aGVsbG8=", "data:image/png;base64", "not base64!", ""] {
            assert!(
                matches!(Upload::decode("file", input, 1024), Err(ServerError::Validation(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn test_decode_size_limit() {
        let payload = STANDARD.encode(vec![0u8; 64]);
        assert!(Upload::decode("file", &payload, 64).is_ok());
        assert!(matches!(
            Upload::decode("file", &payload, 63),
            Err(ServerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_disk_store_roundtrip() {
        let root = std::env::temp_dir().join(format!("hireboard-{}", Uuid::new_v4()));
        let store = DiskBlobStore::new(&root, Url::parse("http://localhost:8888/uploads/").unwrap());

        let url = store
            .put("logos/a/b.png", b"png".to_vec(), "image/png")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:8888/uploads/logos/a/b.png");
        assert!(root.join("logos/a/b.png").is_file());

        store.delete(&url).await.unwrap();
        assert!(!root.join("logos/a/b.png").exists());
        // Deleting twice is fine.
        store.delete(&url).await.unwrap();

        assert!(store.put("../escape", vec![1], "text/plain").await.is_err());
        let _ = tokio::fs::remove_dir_all(root).await;
    }

    #[tokio::test]
    async fn test_release_swallows_errors() {
        let store = DiskBlobStore::new("uploads", Url::parse("http://localhost/uploads/").unwrap());
        release(&store, "http://elsewhere/file.png").await;
    }
}
