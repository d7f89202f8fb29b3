use common::ContactFormInput;

use crate::error::ValidationErrors;

#[derive(Debug, Clone, Default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

pub fn validate_contact_form(form: &ContactForm) -> Result<ContactFormInput, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.require("name", &form.name, "Name is required");
    errors.require("email", &form.email, "Email is required");
    errors.require("message", &form.message, "Message is required");
    errors.into_result()?;

    Ok(ContactFormInput {
        name: form.name.clone(),
        email: form.email.clone(),
        message: form.message.clone(),
    })
}
