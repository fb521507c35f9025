pub mod cli;
pub mod clients;
pub mod config;
pub mod executor;
pub mod harvest;
pub mod model;
pub mod organization;
pub mod provider;
pub mod report;
pub mod runtime;
pub mod traits;

// Re-export common types for convenience
pub use clients::ClientManager;
pub use executor::{ScanError, ScanExecutor};
pub use model::*;
pub use organization::{OrganizationDirectory, OrganizationError};
pub use runtime::{RuntimeClassifier, RuntimeRecord, RuntimeTable};
pub use traits::*;
