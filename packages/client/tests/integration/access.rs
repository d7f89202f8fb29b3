use std::sync::{Arc, Mutex};
use std::time::Duration;

use client::backend::BackendOp;
use client::guard::{AccessGuard, DenyReason, GuardState, LANDING_ROUTE, Requirement};
use common::{AccountType, Role};

use crate::common::{TestApp, profile_form};

fn record(guard: &AccessGuard) -> (Arc<Mutex<Vec<GuardState>>>, client::guard::GuardWatch) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let watch = guard.watch(move |state| sink.lock().unwrap().push(state));
    (seen, watch)
}

mod redirects {
    use super::*;

    #[tokio::test]
    async fn signed_out_caller_is_sent_to_landing() {
        let app = TestApp::spawn();
        let guard = AccessGuard::new(app.state.clone(), Requirement::ADMIN);

        let state = guard.resolve().await;

        assert_eq!(state, GuardState::Unauthenticated);
        assert_eq!(state.redirect(), Some(LANDING_ROUTE));
        assert_eq!(app.backend.calls(BackendOp::GetCallerUserProfile), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_redirect_is_issued_while_reads_are_in_flight() {
        let app = TestApp::spawn_with(|b| b.with_latency(Duration::from_millis(40)));
        app.sign_in().await;
        let guard = AccessGuard::new(app.state.clone(), Requirement::OPEN);
        let (seen, _watch) = record(&guard);

        let settled = guard.resolve().await;

        assert_eq!(settled, GuardState::AuthenticatedNoProfile);
        let seen = seen.lock().unwrap();
        assert!(seen.contains(&GuardState::Loading));
        assert!(seen.iter().all(|s| s.redirect().is_none()));
        assert_eq!(seen.last(), Some(&GuardState::AuthenticatedNoProfile));
    }

    #[tokio::test]
    async fn snapshot_is_loading_before_any_read() {
        let app = TestApp::spawn();
        app.sign_in().await;
        let guard = AccessGuard::new(app.state.clone(), Requirement::OPEN);

        assert_eq!(guard.snapshot(), GuardState::Loading);
    }
}

mod capabilities {
    use super::*;

    #[tokio::test]
    async fn admin_route_denies_plain_users() {
        let app = TestApp::spawn();
        app.sign_in_with_profile(AccountType::Company).await;

        let state = AccessGuard::new(app.state.clone(), Requirement::ADMIN)
            .resolve()
            .await;

        assert_eq!(state, GuardState::Denied(DenyReason::NotAdmin));
        assert_eq!(state.redirect(), None);
    }

    #[tokio::test]
    async fn admin_route_admits_admins() {
        let app = TestApp::spawn();
        app.backend.grant_role(&app.identity(), Role::Admin);
        app.sign_in_with_profile(AccountType::Student).await;

        let state = AccessGuard::new(app.state.clone(), Requirement::ADMIN)
            .resolve()
            .await;

        assert!(state.renders_content());
    }

    #[tokio::test]
    async fn company_route_checks_account_type() {
        let student = TestApp::spawn();
        student.sign_in_with_profile(AccountType::Student).await;
        let company = TestApp::spawn();
        company.sign_in_with_profile(AccountType::Company).await;

        let denied = AccessGuard::new(student.state.clone(), Requirement::COMPANY)
            .resolve()
            .await;
        let allowed = AccessGuard::new(company.state.clone(), Requirement::COMPANY)
            .resolve()
            .await;

        assert_eq!(denied, GuardState::Denied(DenyReason::NotCompany));
        assert_eq!(allowed, GuardState::AuthenticatedWithProfile);
    }

    #[tokio::test]
    async fn profile_read_failure_does_not_prompt_setup() {
        let app = TestApp::spawn();
        app.sign_in().await;
        app.backend
            .fail_next(BackendOp::GetCallerUserProfile, "Uncaught Error: boom");

        let guard = AccessGuard::new(app.state.clone(), Requirement::OPEN);
        let state = guard.resolve().await;

        assert_eq!(state, GuardState::AuthenticatedWithProfile);
        assert!(!guard.take_profile_setup_prompt(state));
    }
}

mod profile_setup {
    use super::*;

    #[tokio::test]
    async fn prompt_is_handed_out_once_per_session() {
        let app = TestApp::spawn();
        app.sign_in().await;
        let guard = AccessGuard::new(app.state.clone(), Requirement::OPEN);

        let state = guard.resolve().await;
        assert_eq!(state, GuardState::AuthenticatedNoProfile);
        assert!(guard.take_profile_setup_prompt(state));
        assert!(!guard.take_profile_setup_prompt(guard.resolve().await));

        app.state.session.clear().await.unwrap();
        app.sign_in().await;
        assert!(guard.take_profile_setup_prompt(guard.resolve().await));
    }

    #[tokio::test]
    async fn saving_a_profile_moves_a_watched_guard_forward() {
        let app = TestApp::spawn();
        app.sign_in().await;
        let guard = AccessGuard::new(app.state.clone(), Requirement::OPEN);
        let (seen, _watch) = record(&guard);
        assert_eq!(guard.resolve().await, GuardState::AuthenticatedNoProfile);

        app.mutations()
            .save_caller_profile(&profile_form(AccountType::Student))
            .await
            .unwrap();

        assert_eq!(
            seen.lock().unwrap().last(),
            Some(&GuardState::AuthenticatedWithProfile)
        );
    }
}
