use std::fmt;

use common::storage::StorageError;
use thiserror::Error;

use crate::cache::QueryKey;

/// Prefixes the remote runtime adds to rejection messages. Each is removed
/// once, in order, before a message is shown to a user.
const PROVIDER_PREFIXES: &[&str] = &["Uncaught Error: ", "Uncaught "];

/// Remove the known provider-added prefixes from a remote error message.
pub fn strip_provider_prefixes(message: &str) -> String {
    PROVIDER_PREFIXES
        .iter()
        .fold(message.to_string(), |msg, prefix| msg.replacen(prefix, "", 1))
}

/// A remote call was rejected or could not be completed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The raw message as delivered by the remote side.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The message with provider prefixes stripped, suitable for display.
    pub fn display_message(&self) -> String {
        strip_provider_prefixes(&self.message)
    }
}

/// One failed field of a locally validated form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Local validation failures, reported per field. Never sent over the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Record `message` for `field` when `value` is blank after trimming.
    pub fn require(&mut self, field: &'static str, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "validation failed ({})", parts.join("; "))
    }
}

/// Failures of the identity-provider collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider already holds a session for this client.
    #[error("session already established")]
    AlreadyEstablished,

    #[error("sign-in rejected: {0}")]
    Rejected(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a sign-in is already in progress")]
    InProgress,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The cache was flushed while this read was in flight.
    #[error("query result discarded")]
    Discarded,

    #[error("cached value for {0} has unexpected shape")]
    UnexpectedShape(QueryKey),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("file exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Umbrella error for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
