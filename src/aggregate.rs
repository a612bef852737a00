//! Aggregator: assemble the final cast model
//!
//! Joins canonical characters with their usage statistics, importance and
//! role, attaches relationships, warnings and graph statistics, and stamps
//! run metadata. The model is plain serde data for downstream reporting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{DialogueIndex, ImportanceClassifier, RoleType, UsageStats};
use crate::config::AnalysisConfig;
use crate::model::{CanonicalCharacter, CharacterId, RawOccurrence, Relationship};
use crate::relation::CharacterGraph;
use crate::resolver::AliasConflict;

// =============================================================================
// Model Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstAppearance {
    pub chapter_id: String,
    pub line_ref: usize,
    pub context: String,
}

/// A canonical character with everything inferred about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    #[serde(flatten)]
    pub character: CanonicalCharacter,
    pub usage: UsageStats,
    pub importance_score: f64,
    pub role: RoleType,
    pub first_appearance: Option<FirstAppearance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// RFC 3339
    pub generated_at: String,
    pub chapter_count: usize,
    pub character_count: usize,
    pub main_characters: usize,
    pub supporting_characters: usize,
    pub minor_characters: usize,
    pub relationship_count: usize,
}

/// Non-fatal conditions collected during the run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarningSummary {
    /// Chapters that fell back to pattern-only extraction, in ordinal order
    pub degraded_chapters: Vec<String>,
    /// Warning count per chapter id
    pub chapter_warnings: BTreeMap<String, usize>,
    pub alias_conflicts: Vec<AliasConflict>,
}

impl WarningSummary {
    pub fn is_empty(&self) -> bool {
        self.degraded_chapters.is_empty() && self.alias_conflicts.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CastStatistics {
    pub most_connected: Option<CharacterId>,
    pub most_connected_degree: usize,
    pub isolated: Vec<CharacterId>,
    /// Connected components of the relationship graph
    pub narrative_threads: usize,
}

/// Final output of an analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastModel {
    pub metadata: ModelMetadata,
    /// Ordered by id
    pub characters: Vec<CharacterProfile>,
    /// Ordered by (pair, type)
    pub relationships: Vec<Relationship>,
    pub warnings: WarningSummary,
    pub statistics: CastStatistics,
}

impl CastModel {
    pub fn character(&self, id: CharacterId) -> Option<&CharacterProfile> {
        self.characters.iter().find(|p| p.character.id == id)
    }

    /// Look up by canonical name, alias or title
    pub fn by_name(&self, name: &str) -> Option<&CharacterProfile> {
        self.characters.iter().find(|p| p.character.is_known_as(name))
    }

    pub fn relationships_of(&self, id: CharacterId) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter().filter(move |r| r.pair.contains(id))
    }

    /// Profiles by descending importance, ties by id
    pub fn ranked(&self) -> Vec<&CharacterProfile> {
        let mut ranked: Vec<&CharacterProfile> = self.characters.iter().collect();
        ranked.sort_by(|a, b| {
            b.importance_score
                .total_cmp(&a.importance_score)
                .then_with(|| a.character.id.cmp(&b.character.id))
        });
        ranked
    }

    pub fn with_role(&self, role: RoleType) -> impl Iterator<Item = &CharacterProfile> {
        self.characters.iter().filter(move |p| p.role == role)
    }
}

// =============================================================================
// Aggregator
// =============================================================================

pub struct Aggregator {
    classifier: ImportanceClassifier,
}

impl Aggregator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            classifier: ImportanceClassifier::new(config),
        }
    }

    pub fn assemble(
        &self,
        chapter_count: usize,
        characters: Vec<CanonicalCharacter>,
        occurrences: &[RawOccurrence],
        dialogue: &DialogueIndex,
        relationships: Vec<Relationship>,
        warnings: WarningSummary,
    ) -> CastModel {
        let profiles: Vec<CharacterProfile> = characters
            .into_iter()
            .map(|character| {
                let usage = self.classifier.usage(&character, dialogue);
                let importance_score = usage.importance_score();
                let first_appearance = character
                    .occurrence_refs
                    .first()
                    .and_then(|r| occurrences.get(r.index))
                    .map(|o| FirstAppearance {
                        chapter_id: o.chapter_id.clone(),
                        line_ref: o.line_ref,
                        context: o.context_window.clone(),
                    });
                CharacterProfile {
                    usage,
                    importance_score,
                    role: self.classifier.classify(importance_score),
                    first_appearance,
                    character,
                }
            })
            .collect();

        let graph = CharacterGraph::build(profiles.iter().map(|p| p.character.id), &relationships);
        let (most_connected, most_connected_degree) = graph
            .most_connected()
            .map_or((None, 0), |(id, degree)| (Some(id), degree));
        let statistics = CastStatistics {
            most_connected,
            most_connected_degree,
            isolated: graph.isolated(),
            narrative_threads: graph.component_count(),
        };

        let count_role = |role: RoleType| profiles.iter().filter(|p| p.role == role).count();
        let metadata = ModelMetadata {
            generated_at: chrono::Utc::now().to_rfc3339(),
            chapter_count,
            character_count: profiles.len(),
            main_characters: count_role(RoleType::MainCharacter),
            supporting_characters: count_role(RoleType::SupportingCharacter),
            minor_characters: count_role(RoleType::MinorCharacter),
            relationship_count: relationships.len(),
        };

        CastModel {
            metadata,
            characters: profiles,
            relationships,
            warnings,
            statistics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CharacterPair, EvidenceRef, ExtractionMethod, OccurrenceRef, RelationType};

    fn character(id: u32, name: &str, refs: usize) -> CanonicalCharacter {
        let mut c = CanonicalCharacter::new(CharacterId(id), name);
        for i in 0..refs {
            c.occurrence_refs.push(OccurrenceRef {
                chapter_ordinal: 1,
                line_ref: i + 1,
                offset: 0,
                index: 0,
                chapter_id: "c1".to_string(),
            });
        }
        c
    }

    #[test]
    fn test_assemble_profiles_and_stats() {
        let occurrences = vec![RawOccurrence {
            surface: "莫凡".to_string(),
            chapter_id: "c1".to_string(),
            chapter_ordinal: 1,
            line_ref: 1,
            offset: 0,
            context_window: "莫凡说道".to_string(),
            method: ExtractionMethod::Surname,
        }];
        let mut mo = character(1, "莫凡", 30);
        mo.alias_set.insert("小凡".to_string());
        let characters = vec![mo, character(2, "叶心夏", 3), character(3, "穆宁雪", 1)];
        let relationships = vec![Relationship {
            pair: CharacterPair::new(CharacterId(1), CharacterId(2)),
            relation_type: RelationType::Social,
            strength: 0.2,
            evidence_count: 1,
            first_evidence_ref: EvidenceRef {
                chapter_id: "c1".to_string(),
                line_ref: 1,
            },
        }];

        let model = Aggregator::new(&AnalysisConfig::default()).assemble(
            1,
            characters,
            &occurrences,
            &DialogueIndex::default(),
            relationships,
            WarningSummary::default(),
        );

        // 30 * 0.4 + 1 * 0.2 = 12.2
        let mo = model.by_name("小凡").unwrap();
        assert_eq!(mo.character.id, CharacterId(1));
        assert_eq!(mo.role, RoleType::SupportingCharacter);
        assert_eq!(mo.first_appearance.as_ref().unwrap().context, "莫凡说道");

        assert_eq!(model.metadata.character_count, 3);
        assert_eq!(model.metadata.supporting_characters, 1);
        assert_eq!(model.metadata.minor_characters, 2);
        assert_eq!(model.metadata.relationship_count, 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&model.metadata.generated_at).is_ok());

        assert_eq!(model.statistics.most_connected, Some(CharacterId(1)));
        assert_eq!(model.statistics.isolated, vec![CharacterId(3)]);
        assert_eq!(model.statistics.narrative_threads, 2);

        let ranked: Vec<&str> = model
            .ranked()
            .iter()
            .map(|p| p.character.canonical_name.as_str())
            .collect();
        assert_eq!(ranked, vec!["莫凡", "叶心夏", "穆宁雪"]);
        assert_eq!(model.relationships_of(CharacterId(2)).count(), 1);
        assert_eq!(model.relationships_of(CharacterId(3)).count(), 0);
    }

    #[test]
    fn test_profile_serializes_flat() {
        let profile = CharacterProfile {
            character: CanonicalCharacter::new(CharacterId(1), "莫凡"),
            usage: UsageStats::default(),
            importance_score: 0.0,
            role: RoleType::MinorCharacter,
            first_appearance: None,
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["canonical_name"], "莫凡");
        assert_eq!(value["role"], "minor_character");
        assert_eq!(value["gender"], "unknown");
    }
}
