use std::sync::Arc;

use common::Identity;

use crate::backend::Backend;
use crate::cache::QueryCache;
use crate::config::AppConfig;
use crate::identity::IdentityProvider;
use crate::notify::{Notifier, TracingNotifier};
use crate::session::SessionStore;

/// Application context, built once at start-up and handed to every
/// component by reference. Clones share the same cache and session.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub backend: Arc<dyn Backend>,
    pub session: Arc<SessionStore>,
    pub cache: QueryCache,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        backend: Arc<dyn Backend>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self::with_notifier(config, backend, provider, Arc::new(TracingNotifier))
    }

    pub fn with_notifier(
        config: AppConfig,
        backend: Arc<dyn Backend>,
        provider: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let cache = QueryCache::new(config.query);
        let session = Arc::new(SessionStore::new(
            provider,
            cache.clone(),
            config.session.desync_retry_delay(),
        ));
        Self {
            config,
            backend,
            session,
            cache,
            notifier,
        }
    }

    /// Identity to send with remote calls.
    pub fn caller(&self) -> Option<Identity> {
        self.session.current_identity()
    }
}
