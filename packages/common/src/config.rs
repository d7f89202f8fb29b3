use serde::Deserialize;

/// Content-storage configuration shared by ingestion and the in-memory store.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageAppConfig {
    /// Largest accepted document in bytes. Default: 10 MiB.
    #[serde(default = "default_max_blob_bytes")]
    pub max_blob_bytes: u64,
    /// Base URL under which stored blobs can be fetched directly, if any.
    /// Default: none.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_max_blob_bytes() -> u64 {
    10 * 1024 * 1024
}

impl Default for StorageAppConfig {
    fn default() -> Self {
        Self {
            max_blob_bytes: default_max_blob_bytes(),
            public_base_url: None,
        }
    }
}
