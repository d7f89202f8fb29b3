//! The remote authority's request/response contract.
//!
//! Every call carries the caller's identity (or `None` for anonymous calls);
//! authorization is decided by the authority, never by the client.

mod memory;

use async_trait::async_trait;
use common::{
    CategoryCount, CompanySubmission, CompanySubmissionInput, ContactFormInput,
    ContactFormSubmission, Identity, Internship, InternshipId, InternshipInput, Role, SubmissionId,
    UserProfile,
};

use crate::error::RemoteError;

pub use memory::{BackendOp, MemoryBackend};

pub type Caller<'a> = Option<&'a Identity>;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn add_internship(
        &self,
        caller: Caller<'_>,
        input: InternshipInput,
    ) -> Result<InternshipId, RemoteError>;

    async fn update_internship(
        &self,
        caller: Caller<'_>,
        id: InternshipId,
        input: InternshipInput,
    ) -> Result<(), RemoteError>;

    async fn delete_internship(&self, caller: Caller<'_>, id: InternshipId)
    -> Result<(), RemoteError>;

    async fn get_internships(&self, caller: Caller<'_>) -> Result<Vec<Internship>, RemoteError>;

    async fn get_internships_by_category(
        &self,
        caller: Caller<'_>,
        category: &str,
    ) -> Result<Vec<Internship>, RemoteError>;

    /// Callable without an established session.
    async fn get_category_counts(
        &self,
        caller: Caller<'_>,
    ) -> Result<Vec<CategoryCount>, RemoteError>;

    async fn get_caller_user_profile(
        &self,
        caller: Caller<'_>,
    ) -> Result<Option<UserProfile>, RemoteError>;

    async fn save_caller_user_profile(
        &self,
        caller: Caller<'_>,
        profile: UserProfile,
    ) -> Result<(), RemoteError>;

    async fn get_caller_user_role(&self, caller: Caller<'_>) -> Result<Role, RemoteError>;

    async fn is_caller_admin(&self, caller: Caller<'_>) -> Result<bool, RemoteError>;

    async fn assign_caller_user_role(
        &self,
        caller: Caller<'_>,
        user: &Identity,
        role: Role,
    ) -> Result<(), RemoteError>;

    /// Promote every pending admin; returns how many were promoted.
    async fn promote_admin_users(&self, caller: Caller<'_>) -> Result<u64, RemoteError>;

    async fn submit_contact_form(
        &self,
        caller: Caller<'_>,
        input: ContactFormInput,
    ) -> Result<(), RemoteError>;

    async fn submit_company_survey(
        &self,
        caller: Caller<'_>,
        input: CompanySubmissionInput,
    ) -> Result<SubmissionId, RemoteError>;

    /// Admin-gated by the authority.
    async fn get_all_company_submissions(
        &self,
        caller: Caller<'_>,
    ) -> Result<Vec<CompanySubmission>, RemoteError>;

    async fn get_all_contact_form_submissions(
        &self,
        caller: Caller<'_>,
    ) -> Result<Vec<ContactFormSubmission>, RemoteError>;
}
