use std::time::Duration;

use client::cache::QueryKey;
use client::error::{ProviderError, QueryError, SessionError};
use client::identity::IdentityProvider;
use client::queries;
use client::roles::RoleResolver;
use common::{AccountType, Role};

use crate::common::TestApp;

mod sign_in {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn provider_desync_recovers_after_one_retry() {
        let app = TestApp::spawn();
        app.provider.sign_in_behind_client();

        let started = tokio::time::Instant::now();
        let identity = app.state.session.establish().await.unwrap();

        assert_eq!(identity, app.identity());
        assert_eq!(app.provider.establish_calls(), 2);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn desync_retry_failure_is_surfaced() {
        let app = TestApp::spawn();
        app.provider.sign_in_behind_client();
        app.provider
            .fail_next_establish(ProviderError::AlreadyEstablished);
        app.provider
            .fail_next_establish(ProviderError::Unavailable("offline".into()));

        let err = app.state.session.establish().await.unwrap_err();

        assert_eq!(
            err,
            SessionError::Provider(ProviderError::Unavailable("offline".into()))
        );
        assert_eq!(app.provider.establish_calls(), 2);
        assert!(!app.state.session.is_authenticated());
    }

    #[tokio::test]
    async fn new_session_starts_with_an_empty_cache() {
        let app = TestApp::spawn();
        queries::category_counts(&app.state).await.unwrap();
        assert!(!app.state.cache.keys().is_empty());

        app.sign_in().await;

        assert!(app.state.cache.keys().is_empty());
    }
}

mod sign_out {
    use super::*;

    #[tokio::test]
    async fn clear_flushes_every_cached_read() {
        let app = TestApp::spawn();
        app.backend.grant_role(&app.identity(), Role::Admin);
        app.sign_in_with_profile(AccountType::Student).await;
        queries::caller_profile(&app.state).await.unwrap();
        RoleResolver::new(&app.state).is_admin().await.unwrap();
        queries::category_counts(&app.state).await.unwrap();

        app.state.session.clear().await.unwrap();

        assert!(app.state.cache.keys().is_empty());
        assert!(!app.state.session.is_authenticated());
        assert!(app.provider.current_identity().is_none());
        assert!(!RoleResolver::new(&app.state).is_admin().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn result_arriving_after_sign_out_is_discarded() {
        let app = TestApp::spawn_with(|b| b.with_latency(Duration::from_millis(100)));
        app.backend.grant_role(&app.identity(), Role::Admin);
        app.sign_in().await;

        let read = RoleResolver::new(&app.state);
        let sign_out = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            app.state.session.clear().await.unwrap();
        };
        let (result, ()) = tokio::join!(read.is_admin(), sign_out);

        assert_eq!(result, Err(QueryError::Discarded));
        assert!(app.state.cache.entry(&QueryKey::AdminFlag).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_on_a_flushed_read_are_released() {
        let app = TestApp::spawn_with(|b| b.with_latency(Duration::from_millis(100)));
        app.sign_in().await;

        let sign_out = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            app.state.session.clear().await.unwrap();
        };
        let (a, b, ()) = tokio::join!(
            queries::caller_profile(&app.state),
            queries::caller_profile(&app.state),
            sign_out
        );

        assert_eq!(a, Err(QueryError::Discarded));
        assert_eq!(b, Err(QueryError::Discarded));
    }
}
