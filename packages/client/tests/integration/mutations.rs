use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use client::backend::{Backend, BackendOp};
use client::cache::{QueryKey, Resource};
use client::error::ClientError;
use client::models::{ContactForm, SurveyForm};
use client::mutations::Mutation;
use client::notify::{Level, Notification};
use client::queries;
use client::roles::RoleResolver;
use client::seed::SeedImporter;
use common::{AccountType, Identity, InternshipId, Role};

use crate::common::{TestApp, internship_form, listing, profile_form};

/// Admin with a profile, one existing internship, and every read cached.
async fn primed_app() -> (TestApp, InternshipId) {
    let app = TestApp::spawn();
    app.backend.grant_role(&app.identity(), Role::Admin);
    let admin = app.sign_in_with_profile(AccountType::Company).await;
    let id = app
        .backend
        .add_internship(Some(&admin), listing("Existing", "Acme", "Remote", "Technology"))
        .await
        .unwrap();

    let roles = RoleResolver::new(&app.state);
    queries::caller_profile(&app.state).await.unwrap();
    roles.is_admin().await.unwrap();
    roles.caller_role().await.unwrap();
    queries::internships(&app.state).await.unwrap();
    queries::internships_by_category(&app.state, "Technology")
        .await
        .unwrap();
    queries::category_counts(&app.state).await.unwrap();
    queries::company_submissions(&app.state).await.unwrap();
    queries::contact_submissions(&app.state).await.unwrap();
    assert!(app.state.cache.keys().iter().all(|k| !is_stale(&app, k)));
    app.notifier.clear();
    (app, id)
}

fn is_stale(app: &TestApp, key: &QueryKey) -> bool {
    app.state.cache.entry(key).is_some_and(|e| e.stale)
}

fn stale_resources(app: &TestApp) -> HashSet<Resource> {
    app.state
        .cache
        .keys()
        .into_iter()
        .filter(|k| is_stale(app, k))
        .map(|k| k.resource())
        .collect()
}

async fn perform(app: &TestApp, mutation: Mutation, existing: InternshipId) {
    let writes = app.mutations();
    match mutation {
        Mutation::AddInternship => {
            writes.add_internship(&internship_form("New")).await.unwrap();
        }
        Mutation::UpdateInternship => {
            writes
                .update_internship(existing, &internship_form("Renamed"))
                .await
                .unwrap();
        }
        Mutation::DeleteInternship => writes.delete_internship(existing).await.unwrap(),
        Mutation::SaveCallerProfile => {
            writes
                .save_caller_profile(&profile_form(AccountType::Student))
                .await
                .unwrap();
        }
        Mutation::SubmitContactForm => writes
            .submit_contact_form(&ContactForm {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                message: "Hello".into(),
            })
            .await
            .unwrap(),
        Mutation::SubmitCompanySurvey => {
            writes
                .submit_company_survey(
                    &SurveyForm {
                        company_name: "Acme".into(),
                        contact_person: "Rita".into(),
                        email: "rita@acme.com".into(),
                        internship_details: "Industry: Retail".into(),
                        ..SurveyForm::default()
                    },
                    Vec::new(),
                )
                .await
                .unwrap();
        }
        Mutation::PromoteAdmins => {
            writes.promote_admins().await.unwrap();
        }
        Mutation::AssignRole => writes
            .assign_role(&Identity::new("someone-else"), Role::User)
            .await
            .unwrap(),
        Mutation::SeedInternships => {
            SeedImporter::new(&app.state)
                .seed(&[listing("Seeded", "Partner", "Remote", "Science")])
                .await
                .unwrap();
        }
    }
}

mod invalidation_isolation {
    use super::*;

    #[tokio::test]
    async fn every_mutation_stales_exactly_its_row() {
        for mutation in Mutation::ALL {
            let (app, existing) = primed_app().await;
            let before: Vec<_> = app
                .state
                .cache
                .keys()
                .into_iter()
                .map(|k| (k.clone(), app.state.cache.entry(&k).unwrap()))
                .collect();

            perform(&app, mutation, existing).await;

            let expected: HashSet<Resource> = mutation.invalidates().iter().copied().collect();
            assert_eq!(stale_resources(&app), expected, "{mutation:?}");

            for (key, entry) in before {
                if expected.contains(&key.resource()) {
                    continue;
                }
                let after = app.state.cache.entry(&key).unwrap();
                assert_eq!(after.status, entry.status, "{mutation:?} touched {key}");
                assert_eq!(after.data, entry.data, "{mutation:?} touched {key}");
            }
        }
    }

    #[tokio::test]
    async fn stale_values_are_kept_until_read_again() {
        let (app, _) = primed_app().await;
        let before = app.state.cache.entry(&QueryKey::Internships).unwrap();

        app.mutations()
            .add_internship(&internship_form("New"))
            .await
            .unwrap();

        let after = app.state.cache.entry(&QueryKey::Internships).unwrap();
        assert!(after.stale);
        assert_eq!(after.data, before.data);

        let list = queries::internships(&app.state).await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(!is_stale(&app, &QueryKey::Internships));
    }

    #[tokio::test]
    async fn observed_keys_are_refetched_after_a_write() {
        let (app, _) = primed_app().await;
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        let _sub = app.state.cache.subscribe(QueryKey::CategoryCounts, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let calls_before = app.backend.calls(BackendOp::GetCategoryCounts);

        app.mutations()
            .add_internship(&internship_form("New"))
            .await
            .unwrap();

        assert_eq!(app.backend.calls(BackendOp::GetCategoryCounts), calls_before + 1);
        assert!(!is_stale(&app, &QueryKey::CategoryCounts));
        assert!(is_stale(&app, &QueryKey::Internships));
        assert!(notified.load(Ordering::SeqCst) >= 2);
    }
}

mod notifications {
    use super::*;

    #[tokio::test]
    async fn success_is_reported() {
        let (app, _) = primed_app().await;
        app.mutations()
            .add_internship(&internship_form("New"))
            .await
            .unwrap();
        assert_eq!(
            app.notifier.last(),
            Some(Notification::success("Internship added successfully"))
        );
    }

    #[tokio::test]
    async fn remote_failure_is_reported_with_prefix_stripped() {
        let app = TestApp::spawn();
        app.sign_in().await;

        let err = app
            .mutations()
            .add_internship(&internship_form("New"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Remote(_)));
        let note = app.notifier.last().unwrap();
        assert_eq!(note.level, Level::Error);
        assert_eq!(
            note.message,
            "Failed to add internship: Unauthorized: Only admins can add internships"
        );
    }

    #[tokio::test]
    async fn failed_write_invalidates_nothing() {
        let (app, existing) = primed_app().await;
        app.backend.fail_next(BackendOp::DeleteInternship, "boom");

        assert!(app.mutations().delete_internship(existing).await.is_err());
        assert!(stale_resources(&app).is_empty());
    }

    #[tokio::test]
    async fn promotion_reports_count_or_nothing_pending() {
        let (app, _) = primed_app().await;
        app.backend.add_pending_admin(&Identity::new("p1"));
        app.backend.add_pending_admin(&Identity::new("p2"));

        assert_eq!(app.mutations().promote_admins().await.unwrap(), 2);
        assert_eq!(
            app.notifier.last(),
            Some(Notification::success("Successfully promoted 2 users to admin"))
        );

        assert_eq!(app.mutations().promote_admins().await.unwrap(), 0);
        assert_eq!(
            app.notifier.last(),
            Some(Notification::info("No pending admin promotions found"))
        );
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn invalid_forms_never_reach_the_network() {
        let (app, _) = primed_app().await;
        let mut form = internship_form("New");
        form.company = String::new();
        let writes_before = app.backend.calls(BackendOp::AddInternship);

        let err = app.mutations().add_internship(&form).await.unwrap_err();

        let ClientError::Validation(errors) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.get("company"), Some("Company is required"));
        assert_eq!(app.backend.calls(BackendOp::AddInternship), writes_before);
        assert!(app.notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn internship_links_are_normalised_before_writing() {
        let (app, _) = primed_app().await;
        let mut form = internship_form("New");
        form.application_link = " careers.acme.com ".into();

        let id = app.mutations().add_internship(&form).await.unwrap();

        let list = queries::internships(&app.state).await.unwrap();
        let added = list.iter().find(|i| i.id == id).unwrap();
        assert_eq!(added.application_link, "https://careers.acme.com");
    }
}
