use common::{InternshipInput, safe_external_link};

use crate::error::ValidationErrors;

/// Add/edit internship dialog contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternshipForm {
    pub title: String,
    pub description: String,
    pub company: String,
    pub category: String,
    pub location: String,
    pub application_link: String,
}

impl From<InternshipInput> for InternshipForm {
    fn from(input: InternshipInput) -> Self {
        Self {
            title: input.title,
            description: input.description,
            company: input.company,
            category: input.category,
            location: input.location,
            application_link: input.application_link,
        }
    }
}

/// All six fields are required. The application link is normalised.
pub fn validate_internship_form(form: &InternshipForm) -> Result<InternshipInput, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.require("title", &form.title, "Title is required");
    errors.require("description", &form.description, "Description is required");
    errors.require("company", &form.company, "Company is required");
    errors.require("category", &form.category, "Category is required");
    errors.require("location", &form.location, "Location is required");
    errors.require(
        "applicationLink",
        &form.application_link,
        "Application link is required",
    );
    errors.into_result()?;

    Ok(InternshipInput {
        title: form.title.trim().to_string(),
        description: form.description.trim().to_string(),
        company: form.company.trim().to_string(),
        category: form.category.trim().to_string(),
        location: form.location.trim().to_string(),
        application_link: safe_external_link(&form.application_link),
    })
}
