pub mod config;
pub mod identity;
pub mod internship;
pub mod link;
pub mod profile;
pub mod retry;
pub mod storage;
pub mod submission;

pub use identity::{Identity, Role};
pub use internship::{CategoryCount, Internship, InternshipId, InternshipInput};
pub use link::safe_external_link;
pub use profile::{AccountType, UserProfile};
pub use submission::{
    CompanySubmission, CompanySubmissionInput, ContactFormInput, ContactFormSubmission,
    SubmissionId,
};
