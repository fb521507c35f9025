//! Harvest module - per-region function collection.
//!
//! - **Complexity**: size-based lines-of-code estimate via [`complexity::estimate`]
//! - **Inspector**: one listing entry to one [`crate::model::FunctionRecord`]
//! - **Pipeline**: paginated region scan via [`pipeline::RegionHarvester`]

pub mod complexity;
pub mod inspector;
pub mod pipeline;

pub use complexity::ComplexityEstimate;
pub use inspector::{ExtendedConfiguration, FunctionInspector, InspectError};
pub use pipeline::{HarvestError, RegionHarvester, RegionStats};
