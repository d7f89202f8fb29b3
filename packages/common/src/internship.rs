use serde::{Deserialize, Serialize};

/// Server-assigned internship id. Never reused once issued.
pub type InternshipId = u64;

/// An internship posting as returned by the remote authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Internship {
    pub id: InternshipId,
    pub title: String,
    pub description: String,
    pub company: String,
    pub category: String,
    pub location: String,
    pub application_link: String,
}

/// Fields of an internship write (add or update).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternshipInput {
    pub title: String,
    pub description: String,
    pub company: String,
    pub category: String,
    pub location: String,
    pub application_link: String,
}

impl Internship {
    pub fn from_input(id: InternshipId, input: InternshipInput) -> Self {
        Self {
            id,
            title: input.title,
            description: input.description,
            company: input.company,
            category: input.category,
            location: input.location,
            application_link: input.application_link,
        }
    }
}

/// Read-only aggregate: number of postings per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}
