//! Concrete collaborator implementations.

pub mod http;
pub mod snapshot;

pub use http::HttpDocumentFetcher;
pub use snapshot::{InventorySnapshot, SnapshotProvider};
