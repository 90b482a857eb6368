//! Listing extraction and pagination traversal.

pub mod aggregator;
pub mod controller;
pub mod extractor;
pub mod harvester;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{PaginationController, RunOutcome, RunReport};
pub use extractor::AttributeExtractor;
