//! Drug-label retrieval: pagination, dedup, and page decoding.
//!
//! This crate provides:
//! - [`page`] — the source wire format and its decoding into [`medharvest_shared::RawRecord`]
//! - [`engine`] — the sequential, retrying pagination loop ([`Harvester`])

pub mod engine;
pub mod page;

pub use engine::{FetchSummary, Harvester};
pub use page::{BRAND_PLACEHOLDER, NAME_PLACEHOLDER, OpenFda, Page, PageItem};
