//! src/services/blob_store.rs
//!
//! BlobStore: design images on local disk, sharded beneath
//! `base_path/{shard}/{shard}/{key}`. Writes go to a temp file that is
//! fsynced and renamed into place so a reader never sees a partial image.

use super::{StoreError, StoreResult};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_BLOB_KEY_LEN: usize = 1024;

/// URL prefix under which the service serves blobs.
pub const BLOB_ROUTE_PREFIX: &str = "/blobs/";

/// Result of a successful store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub key: String,
    pub locator: String,
    pub size_bytes: i64,
    pub etag: String,
}

#[derive(Clone)]
pub struct BlobStore {
    /// Base directory on disk where image payloads are stored.
    pub base_path: PathBuf,
}

impl BlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Rejects keys that are empty, absolute, contain `..`, or carry control
    /// characters or backslashes.
    fn ensure_key_safe(key: &str) -> StoreResult<()> {
        if key.is_empty() || key.len() > MAX_BLOB_KEY_LEN {
            return Err(StoreError::InvalidBlobKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(StoreError::InvalidBlobKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StoreError::InvalidBlobKey);
        }
        Ok(())
    }

    /// Two-level shard directories from MD5(key), keeping directories small.
    fn shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Locator clients use to fetch the blob stored under `key`.
    pub fn locator(key: &str) -> String {
        format!("{}{}", BLOB_ROUTE_PREFIX, key)
    }

    /// Build a fresh key for an uploaded file, e.g. `designs/1727265600000_3f2a9c1e_logo.png`.
    pub fn design_key(file_name: &str) -> String {
        let sanitized: String = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let sanitized = sanitized.trim_matches('.');
        let sanitized = if sanitized.is_empty() {
            "image"
        } else {
            sanitized
        };
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "designs/{}_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            &suffix[..8],
            sanitized.replace("..", "_")
        )
    }

    /// Stream a payload to disk under `key`, replacing any previous payload.
    pub async fn store<S>(&self, key: &str, stream: S) -> StoreResult<StoredBlob>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        Self::ensure_key_safe(key)?;

        let file_path = self.blob_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "blob path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StoreError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        debug!("stored blob {} ({} bytes)", key, size_bytes);

        Ok(StoredBlob {
            key: key.to_string(),
            locator: Self::locator(key),
            size_bytes,
            etag: format!("{:x}", digest.compute()),
        })
    }

    /// Store an in-memory payload.
    pub async fn store_bytes(&self, key: &str, bytes: Bytes) -> StoreResult<StoredBlob> {
        self.store(key, stream::once(async move { Ok::<_, io::Error>(bytes) }))
            .await
    }

    /// Open a stored blob for streaming out.
    pub async fn open(&self, key: &str) -> StoreResult<File> {
        Self::ensure_key_safe(key)?;
        File::open(self.blob_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::BlobNotFound(key.to_string())
            } else {
                StoreError::Io(err)
            }
        })
    }

    /// Remove a blob and prune its now-empty shard directories.
    ///
    /// Returns `false` when nothing was stored under `key`.
    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        Self::ensure_key_safe(key)?;
        let file_path = self.blob_path(key);
        let removed = match fs::remove_file(&file_path).await {
            Ok(_) => {
                debug!("removed blob {}", file_path.display());
                true
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("blob {} already missing", file_path.display());
                false
            }
            Err(err) => return Err(StoreError::Io(err)),
        };

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(removed)
    }

    /// Walk up from `start` removing empty directories until `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Best guess at an image MIME type from the key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}
