//! Relationship inference
//!
//! - `engine.rs` - RelationshipEngine: explicit patterns + co-occurrence
//! - `graph.rs` - CharacterGraph: petgraph view for connectivity statistics

pub mod engine;
pub mod graph;

pub use engine::{resolve_anchored, RelationOutput, RelationshipEngine};
pub use graph::{CharacterGraph, RelationEdge};
