mod error;
mod handle;
mod hash;
mod memory;
mod progress;
mod traits;

pub use error::StorageError;
pub use handle::ContentHandle;
pub use hash::ContentHash;
pub use memory::MemoryBlobStore;
pub use progress::{ProgressReader, ProgressSink};
pub use traits::{BlobStore, BoxReader};
