use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use common::Identity;
use tracing::{info, instrument, warn};

use crate::cache::QueryCache;
use crate::error::{ProviderError, SessionError};
use crate::identity::IdentityProvider;

/// Resets the in-flight flag when `establish` returns or is cancelled.
struct EstablishGuard<'a>(&'a AtomicBool);

impl Drop for EstablishGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Holds at most one active identity and mediates sign-in and sign-out.
///
/// All cached reads are identity-scoped, so the query cache is flushed
/// whenever the identity changes.
pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    cache: QueryCache,
    identity: RwLock<Option<Identity>>,
    establishing: AtomicBool,
    /// Incremented for every established session; 0 means none yet.
    session_seq: AtomicU64,
    /// Session number for which the profile-setup prompt was handed out.
    setup_claimed_for: AtomicU64,
    desync_retry_delay: Duration,
}

impl SessionStore {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        cache: QueryCache,
        desync_retry_delay: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            identity: RwLock::new(None),
            establishing: AtomicBool::new(false),
            session_seq: AtomicU64::new(0),
            setup_claimed_for: AtomicU64::new(0),
            desync_retry_delay,
        }
    }

    /// Sign in through the identity provider.
    ///
    /// Overlapping calls are rejected with [`SessionError::InProgress`]. If the
    /// provider reports an existing session that this store does not know
    /// about, the provider session is cleared and sign-in is retried once
    /// after the configured delay.
    #[instrument(skip(self))]
    pub async fn establish(&self) -> Result<Identity, SessionError> {
        if self
            .establishing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::InProgress);
        }
        let _guard = EstablishGuard(&self.establishing);

        let identity = match self.provider.establish_session().await {
            Ok(identity) => identity,
            Err(ProviderError::AlreadyEstablished) if self.current_identity().is_none() => {
                warn!(
                    delay_ms = self.desync_retry_delay.as_millis() as u64,
                    "Provider holds a session unknown locally, resetting before retry"
                );
                self.provider.clear_session().await?;
                tokio::time::sleep(self.desync_retry_delay).await;
                self.provider.establish_session().await?
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                return Err(e.into());
            }
        };

        self.adopt(identity.clone());
        Ok(identity)
    }

    /// Pick up a session the provider already holds, e.g. after a restart.
    pub fn resume(&self) -> Option<Identity> {
        if let Some(identity) = self.current_identity() {
            return Some(identity);
        }
        let identity = self.provider.current_identity()?;
        self.adopt(identity.clone());
        Some(identity)
    }

    fn adopt(&self, identity: Identity) {
        self.cache.clear();
        let seq = self.session_seq.fetch_add(1, Ordering::SeqCst) + 1;
        info!(identity = %identity, session = seq, "Session established");
        *self.write() = Some(identity);
    }

    /// Sign out. The local identity and every cached read are gone before the
    /// provider round trip starts.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), SessionError> {
        let previous = self.write().take();
        self.cache.clear();
        if let Some(identity) = previous {
            info!(identity = %identity, "Session cleared");
        }
        self.provider.clear_session().await?;
        Ok(())
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_identity().is_some()
    }

    pub fn is_establishing(&self) -> bool {
        self.establishing.load(Ordering::SeqCst)
    }

    /// Returns true exactly once per established session: the caller that
    /// gets `true` shows the profile-setup prompt.
    pub fn claim_profile_setup(&self) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        let seq = self.session_seq.load(Ordering::SeqCst);
        self.setup_claimed_for.swap(seq, Ordering::SeqCst) != seq
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Identity>> {
        self.identity
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
