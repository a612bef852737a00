//! Core data model shared by every pipeline stage
//!
//! Chapters come in from the segmentation collaborator, raw occurrences come
//! out of phase one, and canonical characters / relationships come out of
//! phase two.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// Input Types
// =============================================================================

/// A detected dialogue span with an optional tentative speaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueEvent {
    /// 1-based line in the chapter text
    pub line_ref: usize,
    #[serde(default)]
    pub speaker_hint: Option<String>,
}

impl DialogueEvent {
    pub fn new(line_ref: usize, speaker_hint: Option<&str>) -> Self {
        Self {
            line_ref,
            speaker_hint: speaker_hint.map(str::to_string),
        }
    }
}

/// One chapter as produced by the segmentation collaborator (read-only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterContext {
    pub id: String,
    pub ordinal: u32,
    pub text: String,
    #[serde(default)]
    pub dialogue_events: Vec<DialogueEvent>,
}

impl ChapterContext {
    pub fn new(id: impl Into<String>, ordinal: u32, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ordinal,
            text: text.into(),
            dialogue_events: Vec::new(),
        }
    }

    /// Builder: attach dialogue events
    pub fn with_dialogue(mut self, events: Vec<DialogueEvent>) -> Self {
        self.dialogue_events = events;
        self
    }
}

// =============================================================================
// Raw Occurrences
// =============================================================================

/// Rule family that produced a raw occurrence
///
/// Declaration order is also the tie-break priority when two rules claim the
/// same span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Surname lexicon followed by given-name ideographs
    Surname,
    /// Ideograph run next to a speech-attribution verb
    Speaker,
    /// Ideograph run next to a kinship / honorific marker
    Address,
    /// Name suggested by the external suggestion service
    Service,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Surname => "surname",
            ExtractionMethod::Speaker => "speaker",
            ExtractionMethod::Address => "address",
            ExtractionMethod::Service => "service",
        }
    }
}

/// An unresolved name-like substring found in a chapter. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOccurrence {
    pub surface: String,
    pub chapter_id: String,
    pub chapter_ordinal: u32,
    /// 1-based line number of the match start
    pub line_ref: usize,
    /// Byte offset of the surface in the chapter text
    pub offset: usize,
    pub context_window: String,
    pub method: ExtractionMethod,
}

impl RawOccurrence {
    /// Global ordering key: chapter ordinal, then line, then position
    pub fn order_key(&self) -> (u32, usize, usize) {
        (self.chapter_ordinal, self.line_ref, self.offset)
    }
}

/// Position of one occurrence owned by a canonical character
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OccurrenceRef {
    pub chapter_ordinal: u32,
    pub line_ref: usize,
    pub offset: usize,
    /// Index into the globally ordered occurrence list
    pub index: usize,
    pub chapter_id: String,
}

// =============================================================================
// Canonical Characters
// =============================================================================

/// Dense canonical id, assigned in order of cluster first appearance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(pub u32);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{:04}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

/// The resolved identity behind all surface variants of one person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalCharacter {
    pub id: CharacterId,
    pub canonical_name: String,
    pub alias_set: BTreeSet<String>,
    pub title_set: BTreeSet<String>,
    pub gender: Gender,
    pub attributes: BTreeMap<String, String>,
    pub occurrence_refs: Vec<OccurrenceRef>,
}

impl CanonicalCharacter {
    pub fn new(id: CharacterId, canonical_name: impl Into<String>) -> Self {
        Self {
            id,
            canonical_name: canonical_name.into(),
            alias_set: BTreeSet::new(),
            title_set: BTreeSet::new(),
            gender: Gender::Unknown,
            attributes: BTreeMap::new(),
            occurrence_refs: Vec::new(),
        }
    }

    /// Canonical name, aliases and titles
    pub fn surfaces(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_name.as_str())
            .chain(self.alias_set.iter().map(String::as_str))
            .chain(self.title_set.iter().map(String::as_str))
    }

    pub fn is_known_as(&self, surface: &str) -> bool {
        self.surfaces().any(|s| s == surface)
    }

    pub fn profession(&self) -> Option<&str> {
        self.attributes.get(PROFESSION_KEY).map(String::as_str)
    }
}

/// Attribute key for the inferred social role
pub const PROFESSION_KEY: &str = "profession";

// =============================================================================
// Relationships
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Family,
    Social,
    Antagonistic,
    Romantic,
    CoOccurrence,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Family => "family",
            RelationType::Social => "social",
            RelationType::Antagonistic => "antagonistic",
            RelationType::Romantic => "romantic",
            RelationType::CoOccurrence => "co_occurrence",
        }
    }

    pub fn is_explicit(&self) -> bool {
        !matches!(self, RelationType::CoOccurrence)
    }
}

/// Unordered pair of canonical ids, stored low/high
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterPair(CharacterId, CharacterId);

impl CharacterPair {
    pub fn new(a: CharacterId, b: CharacterId) -> Self {
        if a <= b {
            CharacterPair(a, b)
        } else {
            CharacterPair(b, a)
        }
    }

    pub fn first(&self) -> CharacterId {
        self.0
    }

    pub fn second(&self) -> CharacterId {
        self.1
    }

    pub fn contains(&self, id: CharacterId) -> bool {
        self.0 == id || self.1 == id
    }

    /// The other member of the pair, if `id` is one of them
    pub fn other(&self, id: CharacterId) -> Option<CharacterId> {
        if self.0 == id {
            Some(self.1)
        } else if self.1 == id {
            Some(self.0)
        } else {
            None
        }
    }
}

/// Where the first piece of supporting evidence was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub chapter_id: String,
    pub line_ref: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub pair: CharacterPair,
    pub relation_type: RelationType,
    pub strength: f64,
    pub evidence_count: u32,
    pub first_evidence_ref: EvidenceRef,
}

impl Relationship {
    /// Strength in [0, 1] and at least one piece of evidence
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.strength) && self.evidence_count >= 1
    }
}

/// Clamp a strength value into [0, 1]
pub fn clamp_strength(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
