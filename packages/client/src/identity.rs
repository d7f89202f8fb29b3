//! The identity-provider collaborator.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::Identity;

use crate::error::ProviderError;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the sign-in handshake. Rejects with
    /// [`ProviderError::AlreadyEstablished`] when the provider already holds a
    /// session.
    async fn establish_session(&self) -> Result<Identity, ProviderError>;

    async fn clear_session(&self) -> Result<(), ProviderError>;

    /// The provider's own view of the current identity.
    fn current_identity(&self) -> Option<Identity>;
}

#[derive(Default)]
struct ProviderState {
    current: Option<Identity>,
    scripted: VecDeque<ProviderError>,
}

/// Provider that issues a fixed identity and can be scripted to fail.
pub struct MemoryIdentityProvider {
    identity: Identity,
    state: Mutex<ProviderState>,
    establish_calls: AtomicUsize,
}

impl MemoryIdentityProvider {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            state: Mutex::new(ProviderState::default()),
            establish_calls: AtomicUsize::new(0),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Put the provider into a signed-in state without the client knowing,
    /// as after a page reload that lost local state.
    pub fn sign_in_behind_client(&self) {
        self.lock().current = Some(self.identity.clone());
    }

    /// Fail the next `establish_session` call with `error`.
    pub fn fail_next_establish(&self, error: ProviderError) {
        self.lock().scripted.push_back(error);
    }

    pub fn establish_calls(&self) -> usize {
        self.establish_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn establish_session(&self) -> Result<Identity, ProviderError> {
        self.establish_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let mut state = self.lock();
        if let Some(err) = state.scripted.pop_front() {
            return Err(err);
        }
        if state.current.is_some() {
            return Err(ProviderError::AlreadyEstablished);
        }
        state.current = Some(self.identity.clone());
        Ok(self.identity.clone())
    }

    async fn clear_session(&self) -> Result<(), ProviderError> {
        self.lock().current = None;
        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.lock().current.clone()
    }
}
