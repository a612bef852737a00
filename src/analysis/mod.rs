//! Per-character analysis over resolved identities
//!
//! - `attributes.rs` - AttributeInferencer: gender vote, profession table
//! - `importance.rs` - ImportanceClassifier: usage stats, score, role tier

pub mod attributes;
pub mod importance;

pub use attributes::AttributeInferencer;
pub use importance::{DialogueIndex, ImportanceClassifier, RoleType, UsageStats};
