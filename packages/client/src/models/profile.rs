use common::{AccountType, UserProfile};

use crate::error::ValidationErrors;

/// Which address the caller chose to register with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmailKind {
    #[default]
    Personal,
    School,
}

/// Profile setup form as filled in by the caller.
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    pub account_type: Option<AccountType>,
    pub email_kind: EmailKind,
}

/// Validate the form and produce the trimmed profile to save.
///
/// Students registering with a school address must use `school_domain`.
pub fn validate_profile_form(
    form: &ProfileForm,
    school_domain: &str,
) -> Result<UserProfile, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.require("name", &form.name, "Name is required");

    if form.account_type.is_none() {
        errors.add("accountType", "Please select an account type");
    }

    let email = form.email.trim();
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !email.contains('@') {
        errors.add("email", "Please enter a valid email address");
    } else if form.account_type == Some(AccountType::Student)
        && form.email_kind == EmailKind::School
        && !email.ends_with(&format!("@{school_domain}"))
    {
        errors.add(
            "email",
            format!("School email must end with @{school_domain}"),
        );
    }

    let account_type = match form.account_type {
        Some(account_type) if errors.is_empty() => account_type,
        _ => return Err(errors),
    };
    Ok(UserProfile {
        name: form.name.trim().to_string(),
        email: email.to_string(),
        account_type,
    })
}
