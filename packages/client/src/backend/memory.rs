use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::storage::{BlobStore, MemoryBlobStore};
use common::{
    CategoryCount, CompanySubmission, CompanySubmissionInput, ContactFormInput,
    ContactFormSubmission, Identity, Internship, InternshipId, InternshipInput, Role, SubmissionId,
    UserProfile,
};
use tracing::debug;

use super::{Backend, Caller};
use crate::error::RemoteError;

/// Remote operations, used for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    AddInternship,
    UpdateInternship,
    DeleteInternship,
    GetInternships,
    GetInternshipsByCategory,
    GetCategoryCounts,
    GetCallerUserProfile,
    SaveCallerUserProfile,
    GetCallerUserRole,
    IsCallerAdmin,
    AssignCallerUserRole,
    PromoteAdminUsers,
    SubmitContactForm,
    SubmitCompanySurvey,
    GetAllCompanySubmissions,
    GetAllContactFormSubmissions,
}

#[derive(Default)]
struct State {
    internships: BTreeMap<InternshipId, Internship>,
    last_internship_id: InternshipId,
    profiles: HashMap<Identity, UserProfile>,
    roles: HashMap<Identity, Role>,
    pending_admins: HashSet<Identity>,
    company_submissions: Vec<CompanySubmission>,
    last_submission_id: SubmissionId,
    contact_submissions: Vec<ContactFormSubmission>,
    calls: HashMap<BackendOp, usize>,
    scripted_failures: HashMap<BackendOp, VecDeque<String>>,
    rejected_titles: HashSet<String>,
}

impl State {
    fn is_admin(&self, caller: Caller<'_>) -> bool {
        caller.is_some_and(|id| self.roles.get(id) == Some(&Role::Admin))
    }

    fn role_of(&self, caller: Caller<'_>) -> Role {
        match caller {
            None => Role::Guest,
            Some(id) => match self.roles.get(id) {
                Some(role) => *role,
                None if self.profiles.contains_key(id) => Role::User,
                None => Role::Guest,
            },
        }
    }

    fn require_admin(&self, caller: Caller<'_>, action: &str) -> Result<(), RemoteError> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(trap(format!("Unauthorized: Only admins can {action}")))
        }
    }
}

/// Rejections are phrased the way the hosted runtime phrases traps.
fn trap(message: impl AsRef<str>) -> RemoteError {
    RemoteError::new(format!("Uncaught Error: {}", message.as_ref()))
}

fn require_caller<'a>(caller: Caller<'a>) -> Result<&'a Identity, RemoteError> {
    caller.ok_or_else(|| trap("Unauthorized: Please sign in first"))
}

/// In-process implementation of the remote authority.
///
/// Ids are issued from a monotonically increasing counter and never reused.
/// Survey documents are persisted into the attached [`BlobStore`]. Latency
/// and scripted failures can be injected to exercise client behaviour.
pub struct MemoryBackend {
    state: Mutex<State>,
    blobs: Arc<dyn BlobStore>,
    latency: Option<Duration>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(Arc::new(MemoryBlobStore::default()))
    }
}

impl MemoryBackend {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            blobs,
            latency: None,
        }
    }

    /// Delay every call by `latency` before it is served.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        self.blobs.clone()
    }

    pub fn grant_role(&self, user: &Identity, role: Role) {
        self.lock().roles.insert(user.clone(), role);
    }

    pub fn add_pending_admin(&self, user: &Identity) {
        self.lock().pending_admins.insert(user.clone());
    }

    /// Fail the next call of `op` with `message`. Calls queue up.
    pub fn fail_next(&self, op: BackendOp, message: impl Into<String>) {
        self.lock()
            .scripted_failures
            .entry(op)
            .or_default()
            .push_back(message.into());
    }

    /// Reject every insert whose title equals `title`.
    pub fn reject_title(&self, title: impl Into<String>) {
        self.lock().rejected_titles.insert(title.into());
    }

    pub fn calls(&self, op: BackendOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn internship_count(&self) -> usize {
        self.lock().internships.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count the call, apply latency and scripted failures, then hand out
    /// the state lock.
    async fn enter(&self, op: BackendOp) -> Result<MutexGuard<'_, State>, RemoteError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        if let Some(message) = state
            .scripted_failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
        {
            debug!(?op, %message, "Injected backend failure");
            return Err(RemoteError::new(message));
        }
        Ok(state)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn add_internship(
        &self,
        caller: Caller<'_>,
        input: InternshipInput,
    ) -> Result<InternshipId, RemoteError> {
        let mut state = self.enter(BackendOp::AddInternship).await?;
        state.require_admin(caller, "add internships")?;
        if state.rejected_titles.contains(&input.title) {
            return Err(trap(format!("Rejected internship: {}", input.title)));
        }
        state.last_internship_id += 1;
        let id = state.last_internship_id;
        state
            .internships
            .insert(id, Internship::from_input(id, input));
        Ok(id)
    }

    async fn update_internship(
        &self,
        caller: Caller<'_>,
        id: InternshipId,
        input: InternshipInput,
    ) -> Result<(), RemoteError> {
        let mut state = self.enter(BackendOp::UpdateInternship).await?;
        state.require_admin(caller, "update internships")?;
        match state.internships.get_mut(&id) {
            Some(existing) => {
                *existing = Internship::from_input(id, input);
                Ok(())
            }
            None => Err(trap("Internship not found")),
        }
    }

    async fn delete_internship(
        &self,
        caller: Caller<'_>,
        id: InternshipId,
    ) -> Result<(), RemoteError> {
        let mut state = self.enter(BackendOp::DeleteInternship).await?;
        state.require_admin(caller, "delete internships")?;
        state
            .internships
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| trap("Internship not found"))
    }

    async fn get_internships(&self, caller: Caller<'_>) -> Result<Vec<Internship>, RemoteError> {
        let state = self.enter(BackendOp::GetInternships).await?;
        require_caller(caller)?;
        Ok(state.internships.values().cloned().collect())
    }

    async fn get_internships_by_category(
        &self,
        caller: Caller<'_>,
        category: &str,
    ) -> Result<Vec<Internship>, RemoteError> {
        let state = self.enter(BackendOp::GetInternshipsByCategory).await?;
        require_caller(caller)?;
        Ok(state
            .internships
            .values()
            .filter(|i| i.category == category)
            .cloned()
            .collect())
    }

    async fn get_category_counts(
        &self,
        _caller: Caller<'_>,
    ) -> Result<Vec<CategoryCount>, RemoteError> {
        let state = self.enter(BackendOp::GetCategoryCounts).await?;
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for internship in state.internships.values() {
            *counts.entry(internship.category.as_str()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(category, count)| CategoryCount {
                category: category.to_string(),
                count,
            })
            .collect())
    }

    async fn get_caller_user_profile(
        &self,
        caller: Caller<'_>,
    ) -> Result<Option<UserProfile>, RemoteError> {
        let state = self.enter(BackendOp::GetCallerUserProfile).await?;
        Ok(caller.and_then(|id| state.profiles.get(id).cloned()))
    }

    async fn save_caller_user_profile(
        &self,
        caller: Caller<'_>,
        profile: UserProfile,
    ) -> Result<(), RemoteError> {
        let mut state = self.enter(BackendOp::SaveCallerUserProfile).await?;
        let id = require_caller(caller)?;
        state.profiles.insert(id.clone(), profile);
        Ok(())
    }

    async fn get_caller_user_role(&self, caller: Caller<'_>) -> Result<Role, RemoteError> {
        let state = self.enter(BackendOp::GetCallerUserRole).await?;
        Ok(state.role_of(caller))
    }

    async fn is_caller_admin(&self, caller: Caller<'_>) -> Result<bool, RemoteError> {
        let state = self.enter(BackendOp::IsCallerAdmin).await?;
        Ok(state.is_admin(caller))
    }

    async fn assign_caller_user_role(
        &self,
        caller: Caller<'_>,
        user: &Identity,
        role: Role,
    ) -> Result<(), RemoteError> {
        let mut state = self.enter(BackendOp::AssignCallerUserRole).await?;
        state.require_admin(caller, "assign user roles")?;
        state.roles.insert(user.clone(), role);
        Ok(())
    }

    async fn promote_admin_users(&self, caller: Caller<'_>) -> Result<u64, RemoteError> {
        let mut state = self.enter(BackendOp::PromoteAdminUsers).await?;
        require_caller(caller)?;
        let pending: Vec<Identity> = state.pending_admins.drain().collect();
        for user in &pending {
            state.roles.insert(user.clone(), Role::Admin);
        }
        Ok(pending.len() as u64)
    }

    async fn submit_contact_form(
        &self,
        _caller: Caller<'_>,
        input: ContactFormInput,
    ) -> Result<(), RemoteError> {
        let mut state = self.enter(BackendOp::SubmitContactForm).await?;
        state.contact_submissions.push(ContactFormSubmission {
            name: input.name,
            email: input.email,
            message: input.message,
            submitted_at: Utc::now(),
        });
        Ok(())
    }

    async fn submit_company_survey(
        &self,
        caller: Caller<'_>,
        input: CompanySubmissionInput,
    ) -> Result<SubmissionId, RemoteError> {
        drop(self.enter(BackendOp::SubmitCompanySurvey).await?);

        let mut documents = Vec::with_capacity(input.legal_documents.len());
        for handle in &input.legal_documents {
            let stored = handle
                .persist(self.blobs.as_ref())
                .await
                .map_err(|e| trap(format!("Failed to store document: {e}")))?;
            documents.push(stored);
        }

        let mut state = self.lock();
        state.last_submission_id += 1;
        let id = state.last_submission_id;
        state.company_submissions.push(CompanySubmission {
            id,
            company_name: input.company_name,
            contact_person: input.contact_person,
            email: input.email,
            internship_details: input.internship_details,
            partnership_interest: input.partnership_interest,
            additional_comments: input.additional_comments,
            legal_documents: documents,
            submitted_by: caller.cloned(),
            submitted_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get_all_company_submissions(
        &self,
        caller: Caller<'_>,
    ) -> Result<Vec<CompanySubmission>, RemoteError> {
        let state = self.enter(BackendOp::GetAllCompanySubmissions).await?;
        state.require_admin(caller, "view company submissions")?;
        Ok(state.company_submissions.clone())
    }

    async fn get_all_contact_form_submissions(
        &self,
        caller: Caller<'_>,
    ) -> Result<Vec<ContactFormSubmission>, RemoteError> {
        let state = self.enter(BackendOp::GetAllContactFormSubmissions).await?;
        state.require_admin(caller, "view contact submissions")?;
        Ok(state.contact_submissions.clone())
    }
}
