//! Turning local files into content handles for the survey submission.

use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use common::config::StorageAppConfig;
use common::storage::{ContentHandle, ProgressSink};
use futures::future::join_all;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, instrument, warn};

use crate::error::IngestError;

/// Reads whole files into staged [`ContentHandle`]s.
#[derive(Debug, Clone)]
pub struct BlobIngestor {
    max_bytes: u64,
}

impl BlobIngestor {
    pub fn new(config: &StorageAppConfig) -> Self {
        Self {
            max_bytes: config.max_blob_bytes,
        }
    }

    /// Read all of `source` and wrap it in a handle. `progress`, when given,
    /// becomes the handle's upload decorator: it receives non-decreasing
    /// percentages ending at 100 while the bytes are persisted.
    ///
    /// Read failures are returned, never swallowed.
    pub async fn ingest<R>(
        &self,
        source: R,
        file_name: Option<&str>,
        progress: Option<ProgressSink>,
    ) -> Result<ContentHandle, IngestError>
    where
        R: AsyncRead + Unpin,
    {
        let mut bytes = Vec::new();
        source
            .take(self.max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .await?;
        let actual = bytes.len() as u64;
        if actual > self.max_bytes {
            return Err(IngestError::SizeLimitExceeded {
                actual,
                limit: self.max_bytes,
            });
        }

        let mut handle = ContentHandle::from_bytes(bytes);
        if let Some(name) = file_name {
            let content_type = mime_guess::from_path(name).first_or_octet_stream();
            handle = handle
                .with_file_name(name)
                .with_content_type(content_type.essence_str());
        }
        if let Some(sink) = progress {
            handle = handle.with_upload_progress(sink);
        }
        debug!(file_name, bytes = actual, "Ingested content");
        Ok(handle)
    }

    #[instrument(skip(self, path, progress), fields(path = %path.as_ref().display()))]
    pub async fn ingest_file(
        &self,
        path: impl AsRef<Path>,
        progress: Option<ProgressSink>,
    ) -> Result<ContentHandle, IngestError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let name = path.file_name().and_then(|n| n.to_str());
        self.ingest(file, name, progress).await
    }
}

/// Stable identity of a staged entry. Unaffected by removals of other
/// entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StagedId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum StagedStatus {
    Reading,
    Ready(ContentHandle),
}

/// Snapshot of one staged entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFile {
    pub id: StagedId,
    pub file_name: String,
    pub status: StagedStatus,
    /// Upload progress, 0..=100.
    pub progress: u8,
}

impl StagedFile {
    pub fn handle(&self) -> Option<&ContentHandle> {
        match &self.status {
            StagedStatus::Ready(handle) => Some(handle),
            StagedStatus::Reading => None,
        }
    }
}

struct Entry {
    id: StagedId,
    file_name: String,
    status: StagedStatus,
    progress: Arc<AtomicU8>,
}

impl Entry {
    fn snapshot(&self) -> StagedFile {
        StagedFile {
            id: self.id,
            file_name: self.file_name.clone(),
            status: self.status.clone(),
            progress: self.progress.load(Ordering::SeqCst),
        }
    }
}

/// Ordered list of files attached to a form, owned by that form until it is
/// submitted.
///
/// Ingestions may run concurrently. Each entry tracks its own progress by
/// [`StagedId`]. A failed ingestion removes its entry.
pub struct StagingArea {
    ingestor: BlobIngestor,
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl StagingArea {
    pub fn new(ingestor: BlobIngestor) -> Self {
        Self {
            ingestor,
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, file_name: &str) -> (StagedId, ProgressSink) {
        let id = StagedId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let progress = Arc::new(AtomicU8::new(0));
        let tracker = progress.clone();
        let sink = ProgressSink::new(move |percent| {
            tracker.fetch_max(percent, Ordering::SeqCst);
        });
        self.lock().push(Entry {
            id,
            file_name: file_name.to_string(),
            status: StagedStatus::Reading,
            progress,
        });
        (id, sink)
    }

    fn finish(
        &self,
        id: StagedId,
        result: Result<ContentHandle, IngestError>,
    ) -> Result<StagedId, IngestError> {
        let mut entries = self.lock();
        let position = entries.iter().position(|e| e.id == id);
        match (result, position) {
            (Ok(handle), Some(i)) => {
                entries[i].status = StagedStatus::Ready(handle);
                Ok(id)
            }
            (Ok(_), None) => {
                debug!(?id, "Entry removed while reading, dropping content");
                Ok(id)
            }
            (Err(e), position) => {
                if let Some(i) = position {
                    let entry = entries.remove(i);
                    warn!(file_name = %entry.file_name, error = %e, "Failed to process file");
                }
                Err(e)
            }
        }
    }

    /// Stage bytes from any reader under `file_name`.
    pub async fn add_reader<R>(&self, file_name: &str, source: R) -> Result<StagedId, IngestError>
    where
        R: AsyncRead + Unpin,
    {
        let (id, sink) = self.push(file_name);
        let result = self
            .ingestor
            .ingest(source, Some(file_name), Some(sink))
            .await;
        self.finish(id, result)
    }

    pub async fn add_file(&self, path: impl AsRef<Path>) -> Result<StagedId, IngestError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (id, sink) = self.push(&name);
        let result = self.ingestor.ingest_file(path, Some(sink)).await;
        self.finish(id, result)
    }

    /// Stage several files at once. Entries keep the order of `paths`.
    pub async fn add_files<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<Result<StagedId, IngestError>> {
        join_all(paths.iter().map(|path| self.add_file(path))).await
    }

    /// Remove the entry at `index`. Other entries keep their ids and handles.
    pub fn remove(&self, index: usize) -> Option<StagedFile> {
        let mut entries = self.lock();
        (index < entries.len()).then(|| entries.remove(index).snapshot())
    }

    pub fn remove_id(&self, id: StagedId) -> Option<StagedFile> {
        let mut entries = self.lock();
        let index = entries.iter().position(|e| e.id == id)?;
        Some(entries.remove(index).snapshot())
    }

    pub fn files(&self) -> Vec<StagedFile> {
        self.lock().iter().map(Entry::snapshot).collect()
    }

    pub fn progress(&self, id: StagedId) -> Option<u8> {
        self.lock()
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.progress.load(Ordering::SeqCst))
    }

    /// Handles of entries whose ingestion completed, in list order. Only
    /// these are forwarded on submission.
    pub fn ready_handles(&self) -> Vec<ContentHandle> {
        self.lock()
            .iter()
            .filter_map(|e| match &e.status {
                StagedStatus::Ready(handle) => Some(handle.clone()),
                StagedStatus::Reading => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every entry, e.g. after a successful submission.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
