//! ImportanceClassifier: usage statistics, importance score and role tier
//!
//! `importance = appearances * 0.4 + dialogue * 0.4 + chapters * 0.2`
//!
//! The score is monotonic in each count. Tiers compare strictly against the
//! configured thresholds.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::model::{CanonicalCharacter, ChapterContext, CharacterId};
use crate::resolver::AliasResolution;

const APPEARANCE_WEIGHT: f64 = 0.4;
const DIALOGUE_WEIGHT: f64 = 0.4;
const CHAPTER_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    MainCharacter,
    SupportingCharacter,
    MinorCharacter,
}

impl RoleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::MainCharacter => "main_character",
            RoleType::SupportingCharacter => "supporting_character",
            RoleType::MinorCharacter => "minor_character",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub appearance_count: u32,
    pub dialogue_count: u32,
    pub chapters_appeared: u32,
}

impl UsageStats {
    pub fn importance_score(&self) -> f64 {
        self.appearance_count as f64 * APPEARANCE_WEIGHT
            + self.dialogue_count as f64 * DIALOGUE_WEIGHT
            + self.chapters_appeared as f64 * CHAPTER_WEIGHT
    }
}

// =============================================================================
// Dialogue Index
// =============================================================================

/// Lines on which a resolved speaker is talking: (chapter id, line, speaker)
#[derive(Debug, Default)]
pub struct DialogueIndex {
    spoken: HashSet<(String, usize, CharacterId)>,
}

impl DialogueIndex {
    /// Resolve every speaker hint; hints that match no surface are ignored
    pub fn build(chapters: &[ChapterContext], resolution: &AliasResolution) -> Self {
        let mut spoken = HashSet::new();
        for chapter in chapters {
            for event in &chapter.dialogue_events {
                let Some(hint) = event.speaker_hint.as_deref() else {
                    continue;
                };
                if let Some(id) = resolution.resolve(hint.trim()) {
                    spoken.insert((chapter.id.clone(), event.line_ref, id));
                }
            }
        }
        Self { spoken }
    }

    pub fn is_speaking(&self, chapter_id: &str, line_ref: usize, id: CharacterId) -> bool {
        self.spoken.contains(&(chapter_id.to_string(), line_ref, id))
    }

    pub fn len(&self) -> usize {
        self.spoken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spoken.is_empty()
    }
}

// =============================================================================
// ImportanceClassifier
// =============================================================================

pub struct ImportanceClassifier {
    main_threshold: f64,
    supporting_threshold: f64,
}

impl ImportanceClassifier {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            main_threshold: config.main_character_threshold,
            supporting_threshold: config.supporting_character_threshold,
        }
    }

    pub fn usage(&self, character: &CanonicalCharacter, dialogue: &DialogueIndex) -> UsageStats {
        let refs = &character.occurrence_refs;
        let dialogue_count = refs
            .iter()
            .filter(|r| dialogue.is_speaking(&r.chapter_id, r.line_ref, character.id))
            .count();
        let chapters: BTreeSet<&str> = refs.iter().map(|r| r.chapter_id.as_str()).collect();

        UsageStats {
            appearance_count: refs.len() as u32,
            dialogue_count: dialogue_count as u32,
            chapters_appeared: chapters.len() as u32,
        }
    }

    pub fn classify(&self, score: f64) -> RoleType {
        if score > self.main_threshold {
            RoleType::MainCharacter
        } else if score > self.supporting_threshold {
            RoleType::SupportingCharacter
        } else {
            RoleType::MinorCharacter
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DialogueEvent, ExtractionMethod, RawOccurrence};
    use crate::resolver::AliasResolver;
    use crate::rules::CompiledRules;

    #[test]
    fn test_score_and_tier() {
        let stats = UsageStats {
            appearance_count: 60,
            dialogue_count: 40,
            chapters_appeared: 30,
        };
        assert!((stats.importance_score() - 46.0).abs() < 1e-9);

        let classifier = ImportanceClassifier::new(&AnalysisConfig::default());
        assert_eq!(classifier.classify(stats.importance_score()), RoleType::SupportingCharacter);
        assert_eq!(classifier.classify(50.0), RoleType::SupportingCharacter);
        assert_eq!(classifier.classify(50.1), RoleType::MainCharacter);
        assert_eq!(classifier.classify(10.0), RoleType::MinorCharacter);
    }

    #[test]
    fn test_score_is_monotonic() {
        let base = UsageStats {
            appearance_count: 3,
            dialogue_count: 1,
            chapters_appeared: 2,
        };
        for bumped in [
            UsageStats { appearance_count: 4, ..base },
            UsageStats { dialogue_count: 2, ..base },
            UsageStats { chapters_appeared: 3, ..base },
        ] {
            assert!(bumped.importance_score() > base.importance_score());
        }
    }

    #[test]
    fn test_usage_counts_dialogue_lines() {
        let rules = CompiledRules::chinese().unwrap();
        let config = AnalysisConfig::default();
        let occ = |line, chapter: &str| RawOccurrence {
            surface: "莫凡".to_string(),
            chapter_id: chapter.to_string(),
            chapter_ordinal: if chapter == "c1" { 1 } else { 2 },
            line_ref: line,
            offset: 0,
            context_window: String::new(),
            method: ExtractionMethod::Surname,
        };
        let occurrences = vec![occ(1, "c1"), occ(2, "c1"), occ(1, "c2")];
        let resolution = AliasResolver::new(&config, &rules).resolve(&occurrences);

        let chapters = vec![
            ChapterContext::new("c1", 1, "").with_dialogue(vec![
                DialogueEvent::new(2, Some("莫凡")),
                DialogueEvent::new(3, Some("路人")),
                DialogueEvent::new(1, None),
            ]),
            ChapterContext::new("c2", 2, ""),
        ];
        let dialogue = DialogueIndex::build(&chapters, &resolution);
        assert_eq!(dialogue.len(), 1);

        let classifier = ImportanceClassifier::new(&config);
        let usage = classifier.usage(&resolution.characters[0], &dialogue);
        assert_eq!(usage.appearance_count, 3);
        assert_eq!(usage.dialogue_count, 1);
        assert_eq!(usage.chapters_appeared, 2);
    }
}
