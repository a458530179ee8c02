//! Application services layer scaffolding.

pub mod catalog;
pub mod enrichment;
pub mod feed;
mod lock;
pub mod query;
pub mod sources;
