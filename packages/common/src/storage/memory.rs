use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;

use super::error::StorageError;
use super::hash::ContentHash;
use super::traits::{BlobStore, BoxReader};
use crate::config::StorageAppConfig;

/// In-process content-addressed blob store.
///
/// Identical content is stored once. When a public base URL is configured,
/// every stored blob gets a direct locator `{base}/{hex hash}`.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<ContentHash, Arc<[u8]>>>,
    max_size: u64,
    public_base_url: Option<String>,
}

impl MemoryBlobStore {
    pub fn new(config: &StorageAppConfig) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            max_size: config.max_blob_bytes,
            public_base_url: config
                .public_base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new(&StorageAppConfig::default())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_stream(&self, mut reader: BoxReader) -> Result<ContentHash, StorageError> {
        let mut data = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            if data.len() as u64 > self.max_size {
                return Err(StorageError::SizeLimitExceeded {
                    actual: data.len() as u64,
                    limit: self.max_size,
                });
            }
        }

        let hash = ContentHash::compute(&data);
        self.blobs
            .write()
            .await
            .entry(hash)
            .or_insert_with(|| Arc::from(data));
        Ok(hash)
    }

    async fn get(&self, hash: &ContentHash) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .await
            .get(hash)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| StorageError::NotFound(hash.to_hex()))
    }

    fn locator(&self, hash: &ContentHash) -> Option<String> {
        self.public_base_url
            .as_ref()
            .map(|base| format!("{base}/{}", hash.to_hex()))
    }
}
