use common::CompanySubmissionInput;
use common::storage::ContentHandle;

use crate::error::ValidationErrors;

/// Stored in place of blank additional comments.
pub const NO_ADDITIONAL_COMMENTS: &str = "No additional comments provided";

/// Company partnership survey. Documents come from the staging area.
#[derive(Debug, Clone, Default)]
pub struct SurveyForm {
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub internship_details: String,
    pub partnership_interest: bool,
    pub additional_comments: String,
}

pub fn validate_survey_form(
    form: &SurveyForm,
    legal_documents: Vec<ContentHandle>,
) -> Result<CompanySubmissionInput, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.require("companyName", &form.company_name, "Business name is required");
    errors.require(
        "contactPerson",
        &form.contact_person,
        "Contact person is required",
    );
    errors.require("email", &form.email, "Email/Phone is required");
    errors.require(
        "internshipDetails",
        &form.internship_details,
        "This field is required",
    );
    errors.into_result()?;

    let comments = form.additional_comments.trim();
    Ok(CompanySubmissionInput {
        company_name: form.company_name.clone(),
        contact_person: form.contact_person.clone(),
        email: form.email.clone(),
        internship_details: form.internship_details.clone(),
        partnership_interest: form.partnership_interest,
        additional_comments: if comments.is_empty() {
            NO_ADDITIONAL_COMMENTS.to_string()
        } else {
            comments.to_string()
        },
        legal_documents,
    })
}
