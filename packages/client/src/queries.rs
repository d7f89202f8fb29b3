//! Typed cached reads.
//!
//! Each read goes through the [`QueryCache`](crate::cache::QueryCache); the
//! remote call is made with the current session identity. Reads that need a
//! session resolve to an empty value without touching the cache when
//! signed out.

use std::sync::Arc;

use common::{
    CategoryCount, CompanySubmission, ContactFormSubmission, Internship, UserProfile,
};

use crate::cache::{QueryData, QueryKey};
use crate::error::{QueryError, RemoteError};
use crate::state::AppState;

/// Issue the remote read behind `key`.
pub(crate) async fn load(state: &AppState, key: &QueryKey) -> Result<QueryData, RemoteError> {
    let identity = state.caller();
    let caller = identity.as_ref();
    let backend = state.backend.as_ref();

    Ok(match key {
        QueryKey::CallerProfile => {
            QueryData::Profile(backend.get_caller_user_profile(caller).await?)
        }
        QueryKey::AdminFlag => QueryData::AdminFlag(backend.is_caller_admin(caller).await?),
        QueryKey::CallerRole => QueryData::Role(backend.get_caller_user_role(caller).await?),
        QueryKey::Internships => QueryData::Internships(backend.get_internships(caller).await?),
        QueryKey::InternshipsByCategory(category) => QueryData::Internships(
            backend
                .get_internships_by_category(caller, category)
                .await?,
        ),
        QueryKey::CategoryCounts => {
            QueryData::CategoryCounts(backend.get_category_counts(caller).await?)
        }
        QueryKey::CompanySubmissions => {
            QueryData::CompanySubmissions(backend.get_all_company_submissions(caller).await?)
        }
        QueryKey::ContactSubmissions => {
            QueryData::ContactSubmissions(backend.get_all_contact_form_submissions(caller).await?)
        }
    })
}

pub(crate) async fn read(state: &AppState, key: &QueryKey) -> Result<Arc<QueryData>, QueryError> {
    state.cache.fetch(key.clone(), || load(state, key)).await
}

/// Force a fetch of `key`, joining one already in flight.
pub(crate) async fn refresh(
    state: &AppState,
    key: &QueryKey,
) -> Result<Arc<QueryData>, QueryError> {
    state.cache.refetch(key.clone(), || load(state, key)).await
}

pub async fn caller_profile(state: &AppState) -> Result<Option<UserProfile>, QueryError> {
    if !state.session.is_authenticated() {
        return Ok(None);
    }
    let key = QueryKey::CallerProfile;
    match &*read(state, &key).await? {
        QueryData::Profile(profile) => Ok(profile.clone()),
        _ => Err(QueryError::UnexpectedShape(key)),
    }
}

pub async fn internships(state: &AppState) -> Result<Vec<Internship>, QueryError> {
    if !state.session.is_authenticated() {
        return Ok(Vec::new());
    }
    internship_list(state, QueryKey::Internships).await
}

/// Postings in `category`. A blank category is not sent.
pub async fn internships_by_category(
    state: &AppState,
    category: &str,
) -> Result<Vec<Internship>, QueryError> {
    if !state.session.is_authenticated() || category.trim().is_empty() {
        return Ok(Vec::new());
    }
    internship_list(state, QueryKey::InternshipsByCategory(category.to_string())).await
}

async fn internship_list(state: &AppState, key: QueryKey) -> Result<Vec<Internship>, QueryError> {
    match &*read(state, &key).await? {
        QueryData::Internships(list) => Ok(list.clone()),
        _ => Err(QueryError::UnexpectedShape(key)),
    }
}

/// Public; readable without a session.
pub async fn category_counts(state: &AppState) -> Result<Vec<CategoryCount>, QueryError> {
    let key = QueryKey::CategoryCounts;
    match &*read(state, &key).await? {
        QueryData::CategoryCounts(counts) => Ok(counts.clone()),
        _ => Err(QueryError::UnexpectedShape(key)),
    }
}

/// Authorization is left to the remote side; a rejection lands in the cache
/// as an error and is not retried.
pub async fn company_submissions(state: &AppState) -> Result<Vec<CompanySubmission>, QueryError> {
    let key = QueryKey::CompanySubmissions;
    match &*read(state, &key).await? {
        QueryData::CompanySubmissions(list) => Ok(list.clone()),
        _ => Err(QueryError::UnexpectedShape(key)),
    }
}

pub async fn contact_submissions(
    state: &AppState,
) -> Result<Vec<ContactFormSubmission>, QueryError> {
    let key = QueryKey::ContactSubmissions;
    match &*read(state, &key).await? {
        QueryData::ContactSubmissions(list) => Ok(list.clone()),
        _ => Err(QueryError::UnexpectedShape(key)),
    }
}
