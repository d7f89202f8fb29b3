use std::time::Duration;

use client::backend::{Backend, BackendOp};
use client::cache::{QueryKey, QueryStatus};
use client::error::QueryError;
use client::queries;

use crate::common::{TestApp, internship_form, listing};

mod internship_reads {
    use super::*;

    #[tokio::test]
    async fn added_internship_appears_once_in_the_next_read() {
        let app = TestApp::spawn();
        app.sign_in_as_admin().await;
        assert!(queries::internships(&app.state).await.unwrap().is_empty());

        let id = app
            .mutations()
            .add_internship(&internship_form("Data Intern"))
            .await
            .unwrap();

        let list = queries::internships(&app.state).await.unwrap();
        assert_eq!(list.iter().filter(|i| i.id == id).count(), 1);
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn signed_out_reads_are_empty_and_never_issued() {
        let app = TestApp::spawn();

        assert!(queries::internships(&app.state).await.unwrap().is_empty());
        assert!(
            queries::internships_by_category(&app.state, "Technology")
                .await
                .unwrap()
                .is_empty()
        );

        assert_eq!(app.backend.calls(BackendOp::GetInternships), 0);
        assert_eq!(app.backend.calls(BackendOp::GetInternshipsByCategory), 0);
        assert!(app.state.cache.keys().is_empty());
    }

    #[tokio::test]
    async fn blank_category_is_not_sent() {
        let app = TestApp::spawn();
        app.sign_in().await;

        let list = queries::internships_by_category(&app.state, "  ").await.unwrap();

        assert!(list.is_empty());
        assert_eq!(app.backend.calls(BackendOp::GetInternshipsByCategory), 0);
    }

    #[tokio::test]
    async fn category_reads_are_cached_per_category() {
        let app = TestApp::spawn();
        let admin = app.sign_in_as_admin().await;
        for (title, category) in [("a", "Tech"), ("b", "Health"), ("c", "Tech")] {
            app.backend
                .add_internship(Some(&admin), listing(title, "Acme", "Remote", category))
                .await
                .unwrap();
        }

        let tech = queries::internships_by_category(&app.state, "Tech").await.unwrap();
        let health = queries::internships_by_category(&app.state, "Health").await.unwrap();
        queries::internships_by_category(&app.state, "Tech").await.unwrap();

        assert_eq!(tech.len(), 2);
        assert_eq!(health.len(), 1);
        assert_eq!(app.backend.calls(BackendOp::GetInternshipsByCategory), 2);
        assert_eq!(
            app.state
                .cache
                .status(&QueryKey::InternshipsByCategory("Tech".into())),
            QueryStatus::Success
        );
    }
}

mod single_flight {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn concurrent_reads_issue_one_remote_call() {
        let app = TestApp::spawn_with(|b| b.with_latency(Duration::from_millis(50)));
        app.sign_in().await;

        let (a, b, c) = tokio::join!(
            queries::category_counts(&app.state),
            queries::category_counts(&app.state),
            queries::category_counts(&app.state),
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(app.backend.calls(BackendOp::GetCategoryCounts), 1);
    }
}

mod public_reads {
    use super::*;

    #[tokio::test]
    async fn category_counts_need_no_session() {
        let app = TestApp::spawn();
        let counts = queries::category_counts(&app.state).await.unwrap();
        assert!(counts.is_empty());
        assert_eq!(app.backend.calls(BackendOp::GetCategoryCounts), 1);
    }
}

mod authorization_failures {
    use super::*;

    #[tokio::test]
    async fn rejected_submission_listing_is_not_retried() {
        let app = TestApp::spawn();
        app.sign_in().await;

        let err = queries::company_submissions(&app.state).await.unwrap_err();
        let remote = match err {
            QueryError::Remote(remote) => remote,
            other => panic!("expected remote error, got {other:?}"),
        };
        assert_eq!(
            remote.display_message(),
            "Unauthorized: Only admins can view company submissions"
        );

        // A second read serves the cached error instead of calling again.
        assert!(queries::company_submissions(&app.state).await.is_err());
        assert_eq!(app.backend.calls(BackendOp::GetAllCompanySubmissions), 1);
        assert_eq!(
            app.state.cache.status(&QueryKey::CompanySubmissions),
            QueryStatus::Error
        );
    }

    #[tokio::test]
    async fn profile_read_failure_is_kept_as_error() {
        let app = TestApp::spawn();
        app.sign_in().await;
        app.backend
            .fail_next(BackendOp::GetCallerUserProfile, "Uncaught Error: canister stopped");

        assert!(queries::caller_profile(&app.state).await.is_err());
        assert_eq!(app.backend.calls(BackendOp::GetCallerUserProfile), 1);
        let entry = app.state.cache.entry(&QueryKey::CallerProfile).unwrap();
        assert_eq!(entry.status, QueryStatus::Error);
    }

    #[tokio::test]
    async fn listing_reads_retry_transient_failures() {
        let app = TestApp::spawn();
        app.sign_in().await;
        app.backend.fail_next(BackendOp::GetInternships, "timeout");

        assert!(queries::internships(&app.state).await.is_ok());
        assert_eq!(app.backend.calls(BackendOp::GetInternships), 2);
    }
}
