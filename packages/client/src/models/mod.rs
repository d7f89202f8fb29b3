//! Form payloads and their local validation. Nothing here touches the network.

pub mod contact;
pub mod internship;
pub mod profile;
pub mod survey;

pub use contact::{ContactForm, validate_contact_form};
pub use internship::{InternshipForm, validate_internship_form};
pub use profile::{EmailKind, ProfileForm, validate_profile_form};
pub use survey::{NO_ADDITIONAL_COMMENTS, SurveyForm, validate_survey_form};
