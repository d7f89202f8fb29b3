pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod ingest;
pub mod models;
pub mod mutations;
pub mod notify;
pub mod queries;
pub mod roles;
pub mod seed;
pub mod session;
pub mod state;

pub use error::{ClientError, Result};
pub use state::AppState;
