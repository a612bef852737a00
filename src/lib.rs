//! CastCore: Character Discovery + Relationship Inference for Segmented Novels
//!
//! Takes chapters produced by an upstream segmenter and builds an in-memory
//! cast model: who the characters are, which surface names refer to whom,
//! how important each one is and how they relate to one another.
//!
//! # Architecture
//!
//! ## Phase One (parallel, per chapter)
//! - `scanner/candidate.rs` - CandidateExtractor: surname, speaker and address rules
//! - `scanner/suggestion.rs` - SuggestionClient: optional model-backed name hints
//!
//! ## Phase Two (sequential)
//! - `resolver/` - AliasResolver: union-find clustering of surface names
//! - `analysis/attributes.rs` - AttributeInferencer: gender vote, profession
//! - `analysis/importance.rs` - ImportanceClassifier: usage stats, role tier
//! - `relation/` - RelationshipEngine: explicit patterns + co-occurrence, CharacterGraph
//! - `aggregate.rs` - Aggregator: the final CastModel
//!
//! ## Shared
//! - `model.rs` - occurrences, canonical characters, relationships
//! - `rules/` - declarative rule tables (built-in Chinese defaults)
//! - `config.rs` - AnalysisConfig (JSON / TOML)
//! - `error.rs` - CastError and friends
//!
//! # Usage
//! ```rust,ignore
//! use castcore::{AnalysisConfig, CastPipeline, ChapterContext};
//!
//! let pipeline = CastPipeline::new(AnalysisConfig::default())?;
//! let model = pipeline.analyze(&[
//!     ChapterContext::new("v1c1", 1, "莫凡说道：“走吧。”\n“小凡，等等我！”"),
//! ])?;
//!
//! let mo = model.by_name("小凡").unwrap();
//! assert_eq!(mo.character.canonical_name, "莫凡");
//! ```

pub mod aggregate;
pub mod analysis;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod relation;
pub mod resolver;
pub mod rules;
pub mod scanner;

// Public exports
pub use aggregate::{CastModel, CastStatistics, CharacterProfile, ModelMetadata, WarningSummary};
pub use analysis::{RoleType, UsageStats};
pub use config::{AnalysisConfig, SuggestionConfig};
pub use error::{CastError, ConfigError, Result, RuleError, ServiceError};
pub use model::*;
pub use pipeline::{validate_chapters, CastPipeline, PipelineStats};
pub use resolver::{AliasConflict, AliasResolution};
pub use rules::{CompiledRules, RuleSet};
pub use scanner::{ChapterExtraction, SuggestionService};

/// Get version information
pub fn version() -> String {
    format!("castcore v{}", env!("CARGO_PKG_VERSION"))
}
