use std::collections::HashSet;

use common::{InternshipInput, safe_external_link};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::ClientError;
use crate::mutations::{Mutation, MutationCoordinator};
use crate::notify::Notification;
use crate::state::AppState;

/// A curated internship listing, stored as static text.
#[derive(Debug, Clone, Copy)]
pub struct PartnerListing {
    pub title: &'static str,
    pub description: &'static str,
    pub company: &'static str,
    pub category: &'static str,
    pub location: &'static str,
    pub application_link: &'static str,
}

impl PartnerListing {
    pub fn to_input(&self) -> InternshipInput {
        InternshipInput {
            title: self.title.to_string(),
            description: self.description.to_string(),
            company: self.company.to_string(),
            category: self.category.to_string(),
            location: self.location.to_string(),
            application_link: self.application_link.to_string(),
        }
    }
}

/// Listings offered by partner organisations.
pub const PARTNER_INTERNSHIPS: &[PartnerListing] = &[
    PartnerListing {
        title: "Summer Youth Employment Intern",
        description: "Paid summer placement with city departments for students 16 and older.",
        company: "City of Garden Grove",
        category: "Government",
        location: "Garden Grove, CA",
        application_link: "ggcity.org/youth-employment",
    },
    PartnerListing {
        title: "Library Teen Volunteer",
        description: "Help run reading programs and homework help sessions.",
        company: "OC Public Libraries",
        category: "Education",
        location: "Garden Grove, CA",
        application_link: "https://www.ocpl.org/volunteer",
    },
    PartnerListing {
        title: "Medical Explorer Program",
        description: "Shadow clinical staff and learn about careers in healthcare.",
        company: "Kaiser Permanente",
        category: "Healthcare",
        location: "Anaheim, CA",
        application_link: "kp.org/careers/explorer",
    },
    PartnerListing {
        title: "Junior Web Developer Intern",
        description: "Build and maintain small websites for local nonprofits.",
        company: "Code for Orange County",
        category: "Technology",
        location: "Remote",
        application_link: "https://codefororangecounty.org/join",
    },
    PartnerListing {
        title: "Marine Science Intern",
        description: "Assist educators with tide-pool tours and aquarium care.",
        company: "Ocean Institute",
        category: "Science",
        location: "Dana Point, CA",
        application_link: "oceaninstitute.org/internships",
    },
    PartnerListing {
        title: "Retail Operations Intern",
        description: "Learn merchandising, inventory and customer service basics.",
        company: "Target",
        category: "Business",
        location: "Westminster, CA",
        application_link: "corporate.target.com/careers",
    },
    PartnerListing {
        title: "Community Garden Assistant",
        description: "Maintain garden plots and lead weekend workshops.",
        company: "Garden Grove Community Foundation",
        category: "Environment",
        location: "Garden Grove, CA",
        application_link: "",
    },
];

/// Counts of one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SeedResult {
    pub added: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Case-insensitive duplicate-detection key.
pub fn natural_key(title: &str, company: &str, location: &str, category: &str) -> String {
    format!(
        "{}|{}|{}|{}",
        title.to_lowercase(),
        company.to_lowercase(),
        location.to_lowercase(),
        category.to_lowercase()
    )
}

fn input_key(input: &InternshipInput) -> String {
    natural_key(&input.title, &input.company, &input.location, &input.category)
}

/// Idempotent bulk import of curated listings.
///
/// The existing collection is read once, straight from the remote side, and
/// is the only duplicate check: candidates are not compared with each other,
/// and concurrent runs can insert the same key twice.
pub struct SeedImporter<'a> {
    state: &'a AppState,
}

impl<'a> SeedImporter<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn seed_partner_internships(&self) -> Result<SeedResult, ClientError> {
        let candidates: Vec<InternshipInput> =
            PARTNER_INTERNSHIPS.iter().map(PartnerListing::to_input).collect();
        self.seed(&candidates).await
    }

    /// Insert every candidate whose natural key is not already present.
    /// Individual insert failures are counted, never returned; only a failed
    /// snapshot read is an error.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn seed(&self, candidates: &[InternshipInput]) -> Result<SeedResult, ClientError> {
        let coordinator = MutationCoordinator::new(self.state);
        let caller = self.state.caller();

        let existing = match self.state.backend.get_internships(caller.as_ref()).await {
            Ok(existing) => existing,
            Err(err) => {
                warn!(error = %err, "Could not read existing internships");
                coordinator.report_failure(Mutation::SeedInternships, &err);
                return Err(err.into());
            }
        };
        let existing_keys: HashSet<String> = existing
            .iter()
            .map(|i| natural_key(&i.title, &i.company, &i.location, &i.category))
            .collect();

        let fresh: Vec<&InternshipInput> = candidates
            .iter()
            .filter(|c| !existing_keys.contains(&input_key(c)))
            .collect();

        let mut result = SeedResult {
            skipped: (candidates.len() - fresh.len()) as u64,
            ..SeedResult::default()
        };

        for candidate in fresh {
            let input = InternshipInput {
                application_link: safe_external_link(&candidate.application_link),
                ..candidate.clone()
            };
            match self
                .state
                .backend
                .add_internship(caller.as_ref(), input)
                .await
            {
                Ok(_) => result.added += 1,
                Err(err) => {
                    warn!(title = %candidate.title, error = %err, "Failed to add internship");
                    result.failed += 1;
                }
            }
        }

        info!(
            added = result.added,
            skipped = result.skipped,
            failed = result.failed,
            "Seeding finished"
        );
        coordinator.invalidate_after(Mutation::SeedInternships).await;
        for notification in seed_notifications(&result) {
            coordinator.notify(notification);
        }
        Ok(result)
    }
}

fn plural(n: u64) -> &'static str {
    if n == 1 { "" } else { "s" }
}

fn seed_notifications(result: &SeedResult) -> Vec<Notification> {
    let mut out = Vec::new();
    if result.added > 0 {
        let mut message = format!(
            "Successfully seeded {} partner internship{}",
            result.added,
            plural(result.added)
        );
        if result.skipped > 0 {
            message.push_str(&format!(" ({} already existed)", result.skipped));
        }
        out.push(Notification::success(message));
    } else if result.skipped > 0 {
        out.push(Notification::info(
            "All partner internships already exist in the system",
        ));
    }
    if result.failed > 0 {
        out.push(Notification::warning(format!(
            "{} internship{} failed to add",
            result.failed,
            plural(result.failed)
        )));
    }
    out
}
