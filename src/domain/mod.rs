//! Domain layer types and invariants.

pub mod filters;
pub mod listings;
pub mod profiles;
pub mod types;
