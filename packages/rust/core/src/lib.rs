//! Pipeline orchestration and dataset persistence for MedHarvest.
//!
//! This crate ties the retrieval and enrichment engines together into
//! end-to-end runs decoupled through persisted dataset artifacts.

pub mod dataset;
pub mod pipeline;
