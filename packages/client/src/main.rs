use std::sync::Arc;

use anyhow::Context;
use client::backend::MemoryBackend;
use client::config::AppConfig;
use client::identity::MemoryIdentityProvider;
use client::queries;
use client::seed::SeedImporter;
use client::state::AppState;
use common::storage::MemoryBlobStore;
use common::{Identity, Role};
use tracing::{Level, info};

/// Sandbox run: sign in against the in-memory authority, seed the partner
/// listings and print the outcome as JSON.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let blobs = Arc::new(MemoryBlobStore::new(&config.storage));
    let backend = Arc::new(MemoryBackend::new(blobs));
    let provider = Arc::new(MemoryIdentityProvider::new(Identity::generate()));
    backend.grant_role(provider.identity(), Role::Admin);

    let state = AppState::new(config, backend, provider);
    let identity = state
        .session
        .establish()
        .await
        .context("Failed to sign in")?;
    info!(%identity, "Signed in");

    let result = SeedImporter::new(&state)
        .seed_partner_internships()
        .await
        .context("Failed to seed partner internships")?;

    let counts = queries::category_counts(&state)
        .await
        .context("Failed to read category counts")?;
    for count in &counts {
        info!(category = %count.category, count = count.count, "Category");
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
