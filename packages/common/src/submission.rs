use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::storage::ContentHandle;

pub type SubmissionId = u64;

/// Fields of a company survey submission. Documents are handles produced by
/// ingestion and are moved into the request at submission time.
#[derive(Debug, Clone, Default)]
pub struct CompanySubmissionInput {
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub internship_details: String,
    pub partnership_interest: bool,
    pub additional_comments: String,
    pub legal_documents: Vec<ContentHandle>,
}

/// Append-only record of a company survey.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanySubmission {
    pub id: SubmissionId,
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub internship_details: String,
    pub partnership_interest: bool,
    pub additional_comments: String,
    pub legal_documents: Vec<ContentHandle>,
    pub submitted_by: Option<Identity>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFormInput {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Append-only record of a contact form message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFormSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
}
