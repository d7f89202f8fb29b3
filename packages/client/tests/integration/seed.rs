use client::backend::{Backend, BackendOp};
use client::cache::QueryKey;
use client::notify::{Level, Notification};
use client::queries;
use client::seed::{PARTNER_INTERNSHIPS, SeedImporter, SeedResult};
use common::InternshipInput;

use crate::common::{TestApp, listing};

fn curated() -> Vec<InternshipInput> {
    vec![
        listing("Data Intern", "Acme", "Remote", "Technology"),
        listing("Nurse Aide", "Mercy", "Anaheim", "Healthcare"),
        listing("Park Ranger Aide", "OC Parks", "Irvine", "Environment"),
    ]
}

mod idempotence {
    use super::*;

    #[tokio::test]
    async fn second_run_adds_nothing() {
        let app = TestApp::spawn();
        app.sign_in_as_admin().await;
        let importer = SeedImporter::new(&app.state);

        let first = importer.seed(&curated()).await.unwrap();
        let second = importer.seed(&curated()).await.unwrap();

        assert_eq!(
            first,
            SeedResult {
                added: 3,
                skipped: 0,
                failed: 0
            }
        );
        assert_eq!(
            second,
            SeedResult {
                added: 0,
                skipped: 3,
                failed: 0
            }
        );
        assert_eq!(app.backend.internship_count(), 3);
    }

    #[tokio::test]
    async fn partner_table_seeds_once() {
        let app = TestApp::spawn();
        app.sign_in_as_admin().await;
        let importer = SeedImporter::new(&app.state);
        let total = PARTNER_INTERNSHIPS.len() as u64;

        let first = importer.seed_partner_internships().await.unwrap();
        let second = importer.seed_partner_internships().await.unwrap();

        assert_eq!(first.added, total);
        assert_eq!(second.skipped, total);
        assert_eq!(second.added, 0);
    }

    #[tokio::test]
    async fn single_record_scenario_completes_link() {
        let app = TestApp::spawn();
        app.sign_in_as_admin().await;
        let importer = SeedImporter::new(&app.state);
        let candidate = InternshipInput {
            title: "A".into(),
            company: "B".into(),
            location: "C".into(),
            category: "D".into(),
            description: "x".into(),
            application_link: "foo.com".into(),
        };

        let first = importer.seed(std::slice::from_ref(&candidate)).await.unwrap();
        assert_eq!(
            first,
            SeedResult {
                added: 1,
                skipped: 0,
                failed: 0
            }
        );
        let stored = queries::internships(&app.state).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].application_link, "https://foo.com");

        let second = importer.seed(&[candidate]).await.unwrap();
        assert_eq!(
            second,
            SeedResult {
                added: 0,
                skipped: 1,
                failed: 0
            }
        );
    }
}

mod natural_keys {
    use super::*;

    #[tokio::test]
    async fn letter_case_does_not_defeat_duplicate_detection() {
        let app = TestApp::spawn();
        app.sign_in_as_admin().await;
        let importer = SeedImporter::new(&app.state);
        importer
            .seed(&[listing("Data Intern", "Acme", "Remote", "Technology")])
            .await
            .unwrap();

        let result = importer
            .seed(&[
                listing("DATA INTERN", "acme", "REMOTE", "technology"),
                listing("data intern", "ACME", "remote", "TECHNOLOGY"),
            ])
            .await
            .unwrap();

        assert_eq!(result.added, 0);
        assert_eq!(result.skipped, 2);
        assert_eq!(app.backend.internship_count(), 1);
    }

    #[tokio::test]
    async fn duplicates_within_one_batch_are_both_inserted() {
        let app = TestApp::spawn();
        app.sign_in_as_admin().await;

        let result = SeedImporter::new(&app.state)
            .seed(&[
                listing("Data Intern", "Acme", "Remote", "Technology"),
                listing("data intern", "acme", "remote", "technology"),
            ])
            .await
            .unwrap();

        assert_eq!(result.added, 2);
        assert_eq!(app.backend.internship_count(), 2);
    }

    #[tokio::test]
    async fn description_changes_do_not_make_a_new_record() {
        let app = TestApp::spawn();
        let admin = app.sign_in_as_admin().await;
        app.backend
            .add_internship(Some(&admin), listing("Data Intern", "Acme", "Remote", "Technology"))
            .await
            .unwrap();

        let mut changed = listing("Data Intern", "Acme", "Remote", "Technology");
        changed.description = "Completely different".into();
        let result = SeedImporter::new(&app.state).seed(&[changed]).await.unwrap();

        assert_eq!(result.skipped, 1);
        assert_eq!(result.added, 0);
    }
}

mod partial_failure {
    use super::*;

    #[tokio::test]
    async fn one_failed_insert_does_not_stop_the_rest() {
        let app = TestApp::spawn();
        app.sign_in_as_admin().await;
        app.backend.reject_title("Nurse Aide");

        let result = SeedImporter::new(&app.state).seed(&curated()).await.unwrap();

        assert_eq!(
            result,
            SeedResult {
                added: 2,
                skipped: 0,
                failed: 1
            }
        );
        assert_eq!(app.backend.calls(BackendOp::AddInternship), 3);
        assert_eq!(
            app.notifier.notifications(),
            vec![
                Notification::success("Successfully seeded 2 partner internships"),
                Notification::warning("1 internship failed to add"),
            ]
        );
    }

    #[tokio::test]
    async fn every_insert_failing_is_still_a_result() {
        let app = TestApp::spawn();
        app.sign_in().await;

        let result = SeedImporter::new(&app.state).seed(&curated()).await.unwrap();

        assert_eq!(result.failed, 3);
        assert_eq!(result.added, 0);
    }

    #[tokio::test]
    async fn failed_snapshot_read_is_an_error() {
        let app = TestApp::spawn();
        app.sign_in_as_admin().await;
        app.backend
            .fail_next(BackendOp::GetInternships, "Uncaught Error: replica unavailable");

        let err = SeedImporter::new(&app.state).seed(&curated()).await;

        assert!(err.is_err());
        assert_eq!(app.backend.calls(BackendOp::AddInternship), 0);
        let note = app.notifier.last().unwrap();
        assert_eq!(note.level, Level::Error);
        assert_eq!(
            note.message,
            "Failed to seed partner internships: replica unavailable"
        );
    }
}

mod cache_effects {
    use super::*;

    #[tokio::test]
    async fn snapshot_bypasses_the_cache() {
        let app = TestApp::spawn();
        let admin = app.sign_in_as_admin().await;
        queries::internships(&app.state).await.unwrap();
        app.backend
            .add_internship(Some(&admin), listing("Data Intern", "Acme", "Remote", "Technology"))
            .await
            .unwrap();

        // The cached list is empty, but the importer must still see the record.
        let result = SeedImporter::new(&app.state)
            .seed(&[listing("Data Intern", "Acme", "Remote", "Technology")])
            .await
            .unwrap();

        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn run_invalidates_internship_reads_only() {
        let app = TestApp::spawn();
        app.sign_in_as_admin().await;
        queries::internships(&app.state).await.unwrap();
        queries::category_counts(&app.state).await.unwrap();
        queries::caller_profile(&app.state).await.unwrap();

        SeedImporter::new(&app.state).seed(&curated()).await.unwrap();

        let stale = |key: &QueryKey| app.state.cache.entry(key).unwrap().stale;
        assert!(stale(&QueryKey::Internships));
        assert!(stale(&QueryKey::CategoryCounts));
        assert!(!stale(&QueryKey::CallerProfile));
    }
}
