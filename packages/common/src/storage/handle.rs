use std::io::Cursor;
use std::sync::Arc;

use tracing::debug;

use super::error::StorageError;
use super::hash::ContentHash;
use super::progress::{ProgressReader, ProgressSink};
use super::traits::{BlobStore, BoxReader};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    /// Bytes read locally, not yet handed to the content store.
    Staged(Arc<[u8]>),
    /// Already persisted in a content store.
    Stored {
        hash: ContentHash,
        locator: Option<String>,
    },
    /// Known only by a direct URL.
    Url(String),
}

/// Opaque reference to document bytes accepted by the submission API.
///
/// Cloning is cheap; staged bytes are shared. The optional progress
/// decorator is invoked while the bytes are streamed into a [`BlobStore`].
#[derive(Debug, Clone)]
pub struct ContentHandle {
    source: Source,
    file_name: Option<String>,
    content_type: Option<String>,
    progress: Option<ProgressSink>,
}

impl ContentHandle {
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::with_source(Source::Staged(bytes.into()))
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self::with_source(Source::Url(url.into()))
    }

    pub fn stored(hash: ContentHash, locator: Option<String>) -> Self {
        Self::with_source(Source::Stored { hash, locator })
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            file_name: None,
            content_type: None,
            progress: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Attach a sink that observes the transfer into a content store.
    pub fn with_upload_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Byte length, when the bytes are held locally.
    pub fn staged_len(&self) -> Option<u64> {
        match &self.source {
            Source::Staged(bytes) => Some(bytes.len() as u64),
            _ => None,
        }
    }

    pub fn is_staged(&self) -> bool {
        matches!(self.source, Source::Staged(_))
    }

    pub fn content_hash(&self) -> Option<ContentHash> {
        match &self.source {
            Source::Stored { hash, .. } => Some(*hash),
            _ => None,
        }
    }

    /// URL under which the bytes can be fetched without going through a store.
    pub fn direct_url(&self) -> Option<&str> {
        match &self.source {
            Source::Stored { locator, .. } => locator.as_deref(),
            Source::Url(url) => Some(url),
            Source::Staged(_) => None,
        }
    }

    /// Yield the bytes back, reading from `store` for persisted handles.
    pub async fn get_bytes(&self, store: &dyn BlobStore) -> Result<Vec<u8>, StorageError> {
        match &self.source {
            Source::Staged(bytes) => Ok(bytes.to_vec()),
            Source::Stored { hash, .. } => store.get(hash).await,
            Source::Url(url) => Err(StorageError::NotFound(url.clone())),
        }
    }

    /// Stream staged bytes into `store`, reporting progress to the attached
    /// sink, and return the stored handle. Handles that are not staged are
    /// returned as-is and report completion immediately.
    pub async fn persist(&self, store: &dyn BlobStore) -> Result<ContentHandle, StorageError> {
        let Source::Staged(bytes) = &self.source else {
            if let Some(sink) = &self.progress {
                sink.report(100);
            }
            return Ok(self.clone());
        };

        let total = bytes.len() as u64;
        let cursor = Cursor::new(bytes.clone());
        let reader: BoxReader = match &self.progress {
            Some(sink) => Box::new(ProgressReader::new(cursor, total, sink.clone())),
            None => Box::new(cursor),
        };
        let hash = store.put_stream(reader).await?;
        debug!(hash = %hash.short(), bytes = total, "Persisted staged content");

        Ok(ContentHandle {
            source: Source::Stored {
                hash,
                locator: store.locator(&hash),
            },
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            progress: None,
        })
    }
}

impl PartialEq for ContentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.file_name == other.file_name
            && self.content_type == other.content_type
    }
}
