//! Phase one: per-chapter candidate extraction
//!
//! - `candidate.rs` - CandidateExtractor: surname / speaker / address rules
//! - `suggestion.rs` - SuggestionClient: optional language-model name hints

pub mod candidate;
pub mod suggestion;

pub use candidate::*;
pub use suggestion::*;
