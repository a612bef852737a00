//! Alias resolution: surface strings to canonical characters
//!
//! - `alias.rs` - AliasResolver: union-find clustering with title/diminutive links
//! - `similarity.rs` - normalized edit distance over chars

pub mod alias;
pub mod similarity;

pub use alias::{AliasConflict, AliasResolution, AliasResolver};
pub use similarity::normalized_levenshtein;
