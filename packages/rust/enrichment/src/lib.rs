//! LLM enrichment: prompt construction, JSON recovery, and the per-record loop.
//!
//! This crate provides:
//! - [`provider`] — the [`CompletionProvider`] seam and the Groq client
//! - [`recover`] — balanced-brace JSON recovery from messy model output
//! - [`engine`] — the sequential [`Enricher`] with guaranteed fallback

pub mod engine;
pub mod provider;
pub mod recover;

pub use engine::{EnrichProgress, EnrichSummary, Enricher, SilentEnrichProgress, build_prompt};
pub use provider::{CompletionProvider, GroqClient};
pub use recover::{BraceCandidates, recover_object, strip_code_fences};
