//! Remote writes and the cache invalidation each one implies.

use std::future::Future;

use common::storage::ContentHandle;
use common::{Identity, InternshipId, Role, SubmissionId, UserProfile};
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::cache::{QueryKey, Resource};
use crate::error::{ClientError, RemoteError};
use crate::models::{
    ContactForm, InternshipForm, ProfileForm, SurveyForm, validate_contact_form,
    validate_internship_form, validate_profile_form, validate_survey_form,
};
use crate::notify::Notification;
use crate::queries;
use crate::state::AppState;

const INTERNSHIP_READS: &[Resource] = &[
    Resource::Internships,
    Resource::InternshipsByCategory,
    Resource::CategoryCounts,
];

/// Kinds of remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    AddInternship,
    UpdateInternship,
    DeleteInternship,
    SaveCallerProfile,
    SubmitContactForm,
    SubmitCompanySurvey,
    PromoteAdmins,
    AssignRole,
    SeedInternships,
}

impl Mutation {
    pub const ALL: [Mutation; 9] = [
        Mutation::AddInternship,
        Mutation::UpdateInternship,
        Mutation::DeleteInternship,
        Mutation::SaveCallerProfile,
        Mutation::SubmitContactForm,
        Mutation::SubmitCompanySurvey,
        Mutation::PromoteAdmins,
        Mutation::AssignRole,
        Mutation::SeedInternships,
    ];

    /// Cached reads made stale by a successful write. This table is the only
    /// place staleness originates.
    pub fn invalidates(self) -> &'static [Resource] {
        match self {
            Mutation::AddInternship
            | Mutation::UpdateInternship
            | Mutation::DeleteInternship
            | Mutation::SeedInternships => INTERNSHIP_READS,
            Mutation::SaveCallerProfile => &[Resource::CallerProfile],
            Mutation::SubmitContactForm | Mutation::SubmitCompanySurvey => &[],
            Mutation::PromoteAdmins => &[Resource::AdminFlag],
            Mutation::AssignRole => &[Resource::AdminFlag, Resource::CallerRole],
        }
    }

    fn failure_prefix(self) -> &'static str {
        match self {
            Mutation::AddInternship => "Failed to add internship",
            Mutation::UpdateInternship => "Failed to update internship",
            Mutation::DeleteInternship => "Failed to delete internship",
            Mutation::SaveCallerProfile => "Failed to save profile",
            Mutation::SubmitContactForm => "Failed to send message",
            Mutation::SubmitCompanySurvey => "Failed to submit survey",
            Mutation::PromoteAdmins => "Failed to promote admins",
            Mutation::AssignRole => "Failed to assign role",
            Mutation::SeedInternships => "Failed to seed partner internships",
        }
    }
}

/// Runs remote writes, reports their outcome and applies the invalidation
/// table. Local validation failures are returned to the form and never
/// reach the network or the notification channel.
pub struct MutationCoordinator<'a> {
    state: &'a AppState,
}

impl<'a> MutationCoordinator<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    #[instrument(skip(self, form))]
    pub async fn add_internship(&self, form: &InternshipForm) -> Result<InternshipId, ClientError> {
        let input = validate_internship_form(form)?;
        let caller = self.state.caller();
        let id = self
            .run(
                Mutation::AddInternship,
                self.state.backend.add_internship(caller.as_ref(), input),
            )
            .await?;
        info!(id, "Internship added");
        self.notify(Notification::success("Internship added successfully"));
        Ok(id)
    }

    #[instrument(skip(self, form))]
    pub async fn update_internship(
        &self,
        id: InternshipId,
        form: &InternshipForm,
    ) -> Result<(), ClientError> {
        let input = validate_internship_form(form)?;
        let caller = self.state.caller();
        self.run(
            Mutation::UpdateInternship,
            self.state.backend.update_internship(caller.as_ref(), id, input),
        )
        .await?;
        self.notify(Notification::success("Internship updated successfully"));
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_internship(&self, id: InternshipId) -> Result<(), ClientError> {
        let caller = self.state.caller();
        self.run(
            Mutation::DeleteInternship,
            self.state.backend.delete_internship(caller.as_ref(), id),
        )
        .await?;
        self.notify(Notification::success("Internship deleted successfully"));
        Ok(())
    }

    #[instrument(skip(self, form))]
    pub async fn save_caller_profile(&self, form: &ProfileForm) -> Result<UserProfile, ClientError> {
        let profile = validate_profile_form(form, &self.state.config.profile.school_email_domain)?;
        let caller = self.state.caller();
        self.run(
            Mutation::SaveCallerProfile,
            self.state
                .backend
                .save_caller_user_profile(caller.as_ref(), profile.clone()),
        )
        .await?;
        self.notify(Notification::success("Profile saved successfully"));
        Ok(profile)
    }

    #[instrument(skip(self, form))]
    pub async fn submit_contact_form(&self, form: &ContactForm) -> Result<(), ClientError> {
        let input = validate_contact_form(form)?;
        let caller = self.state.caller();
        self.run(
            Mutation::SubmitContactForm,
            self.state.backend.submit_contact_form(caller.as_ref(), input),
        )
        .await?;
        self.notify(Notification::success("Message sent successfully!"));
        Ok(())
    }

    /// `documents` are the ready handles from the staging area.
    #[instrument(skip(self, form, documents), fields(documents = documents.len()))]
    pub async fn submit_company_survey(
        &self,
        form: &SurveyForm,
        documents: Vec<ContentHandle>,
    ) -> Result<SubmissionId, ClientError> {
        let input = validate_survey_form(form, documents)?;
        let caller = self.state.caller();
        let id = self
            .run(
                Mutation::SubmitCompanySurvey,
                self.state.backend.submit_company_survey(caller.as_ref(), input),
            )
            .await?;
        self.notify(Notification::success("Survey submitted successfully!"));
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn promote_admins(&self) -> Result<u64, ClientError> {
        let caller = self.state.caller();
        let count = self
            .run(
                Mutation::PromoteAdmins,
                self.state.backend.promote_admin_users(caller.as_ref()),
            )
            .await?;
        if count > 0 {
            let plural = if count == 1 { "" } else { "s" };
            self.notify(Notification::success(format!(
                "Successfully promoted {count} user{plural} to admin"
            )));
        } else {
            self.notify(Notification::info("No pending admin promotions found"));
        }
        Ok(count)
    }

    #[instrument(skip(self))]
    pub async fn assign_role(&self, user: &Identity, role: Role) -> Result<(), ClientError> {
        let caller = self.state.caller();
        self.run(
            Mutation::AssignRole,
            self.state
                .backend
                .assign_caller_user_role(caller.as_ref(), user, role),
        )
        .await?;
        self.notify(Notification::success(format!("Assigned role {role} to {user}")));
        Ok(())
    }

    async fn run<T, Fut>(&self, mutation: Mutation, call: Fut) -> Result<T, ClientError>
    where
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        match call.await {
            Ok(value) => {
                self.invalidate_after(mutation).await;
                Ok(value)
            }
            Err(err) => {
                warn!(?mutation, error = %err, "Remote write failed");
                self.report_failure(mutation, &err);
                Err(err.into())
            }
        }
    }

    pub(crate) fn report_failure(&self, mutation: Mutation, err: &RemoteError) {
        self.notify(Notification::failure(mutation.failure_prefix(), err));
    }

    /// Apply `mutation`'s invalidation row, then refetch the affected keys
    /// that are currently observed. Refetch failures stay in the cache entry.
    pub(crate) async fn invalidate_after(&self, mutation: Mutation) {
        let active = self.state.cache.invalidate(mutation.invalidates());
        debug!(?mutation, refetching = active.len(), "Applied invalidation");
        let results = join_all(active.iter().map(|key| refetch(self.state, key))).await;
        for (key, result) in active.iter().zip(results) {
            if let Err(e) = result {
                warn!(%key, error = %e, "Refetch after write failed");
            }
        }
    }

    pub(crate) fn notify(&self, notification: Notification) {
        self.state.notifier.notify(notification);
    }
}

async fn refetch(state: &AppState, key: &QueryKey) -> Result<(), crate::error::QueryError> {
    queries::refresh(state, key).await.map(|_| ())
}
