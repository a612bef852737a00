//! RelationshipEngine: typed relationships between canonical characters
//!
//! Two evidence streams feed one table keyed by (pair, type):
//!
//! 1. **Explicit**: ordered relation patterns run over chapter text. Each
//!    pattern names two capture slots; a slot is resolved by trimming its
//!    capture from the anchored side until a known surface appears. Matches
//!    where either slot stays unresolved, or both resolve to the same
//!    character, are dropped and only counted.
//! 2. **Co-occurrence**: every pair of distinct characters appearing in the
//!    same chapter bumps a counter; pairs at or above `min_co_occurrence`
//!    become `co_occurrence` relationships.
//!
//! Types never overwrite each other: a pair can carry a family entry and a
//! co-occurrence entry side by side.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::config::AnalysisConfig;
use crate::model::{
    clamp_strength, ChapterContext, CharacterId, CharacterPair, EvidenceRef, RawOccurrence,
    RelationType, Relationship,
};
use crate::resolver::AliasResolution;
use crate::rules::{CaptureSlot, CompiledRules, SlotAnchor};

/// Result of the relationship pass
#[derive(Debug, Clone, Default)]
pub struct RelationOutput {
    /// Sorted by (pair, type)
    pub relationships: Vec<Relationship>,
    /// Explicit matches with an unresolved or self-referencing slot
    pub dropped_explicit: usize,
}

#[derive(Debug, Clone)]
struct Evidence {
    count: u32,
    first: EvidenceRef,
}

pub struct RelationshipEngine<'a> {
    rules: &'a CompiledRules,
    min_co_occurrence: u32,
    max_co_occurrence: u32,
    saturation: f64,
}

impl<'a> RelationshipEngine<'a> {
    pub fn new(config: &AnalysisConfig, rules: &'a CompiledRules) -> Self {
        Self {
            rules,
            min_co_occurrence: config.min_co_occurrence,
            max_co_occurrence: config.max_co_occurrence,
            saturation: config.explicit_saturation_constant,
        }
    }

    /// Build all relationships
    ///
    /// `chapters` and `occurrences` are visited in chapter-ordinal order so
    /// first evidence is the earliest in the book.
    pub fn build(
        &self,
        chapters: &[ChapterContext],
        occurrences: &[RawOccurrence],
        resolution: &AliasResolution,
    ) -> RelationOutput {
        let mut ordered: Vec<&ChapterContext> = chapters.iter().collect();
        ordered.sort_by_key(|c| c.ordinal);

        let mut table: BTreeMap<(CharacterPair, RelationType), Evidence> = BTreeMap::new();
        let dropped_explicit = self.explicit_evidence(&ordered, resolution, &mut table);
        let co_counts = self.co_occurrence_evidence(occurrences, resolution);

        let mut relationships = Vec::with_capacity(table.len() + co_counts.len());
        for ((pair, relation_type), evidence) in table {
            relationships.push(Relationship {
                pair,
                relation_type,
                strength: clamp_strength(evidence.count as f64 / self.saturation),
                evidence_count: evidence.count,
                first_evidence_ref: evidence.first,
            });
        }
        for (pair, evidence) in co_counts {
            if evidence.count < self.min_co_occurrence {
                continue;
            }
            relationships.push(Relationship {
                pair,
                relation_type: RelationType::CoOccurrence,
                strength: clamp_strength(evidence.count as f64 / self.max_co_occurrence as f64),
                evidence_count: evidence.count,
                first_evidence_ref: evidence.first,
            });
        }
        relationships.sort_by(|a, b| (a.pair, a.relation_type).cmp(&(b.pair, b.relation_type)));

        debug!(
            relationships = relationships.len(),
            dropped_explicit, "relationships built"
        );

        RelationOutput {
            relationships,
            dropped_explicit,
        }
    }

    // =========================================================================
    // Explicit Patterns
    // =========================================================================

    fn explicit_evidence(
        &self,
        chapters: &[&ChapterContext],
        resolution: &AliasResolution,
        table: &mut BTreeMap<(CharacterPair, RelationType), Evidence>,
    ) -> usize {
        let mut dropped = 0;

        for chapter in chapters {
            let text = chapter.text.as_str();
            let line_starts: Vec<usize> = std::iter::once(0)
                .chain(text.match_indices('\n').map(|(i, _)| i + 1))
                .collect();

            // (match start, rule order, pair, type); inserted in text order
            let mut accepted: Vec<(usize, usize, CharacterPair, RelationType)> = Vec::new();

            for (index, rule) in self.rules.relation_rules().iter().enumerate() {
                for caps in rule.regex.captures_iter(text) {
                    let first = slot_text(&caps, &rule.first)
                        .and_then(|s| resolve_anchored(resolution, s, rule.first.anchor));
                    let second = slot_text(&caps, &rule.second)
                        .and_then(|s| resolve_anchored(resolution, s, rule.second.anchor));

                    let (Some(a), Some(b)) = (first, second) else {
                        dropped += 1;
                        debug!(
                            chapter = %chapter.id,
                            relation = rule.relation_type.as_str(),
                            matched = caps.get(0).map_or("", |m| m.as_str()),
                            "unresolved relationship evidence dropped"
                        );
                        continue;
                    };
                    if a == b {
                        dropped += 1;
                        continue;
                    }

                    let at = caps.get(0).map_or(0, |m| m.start());
                    accepted.push((at, index, CharacterPair::new(a, b), rule.relation_type));
                }
            }

            accepted.sort_by_key(|&(at, index, _, _)| (at, index));
            for (at, _, pair, relation_type) in accepted {
                let line_ref = line_starts.partition_point(|&s| s <= at).max(1);
                table
                    .entry((pair, relation_type))
                    .and_modify(|e| e.count += 1)
                    .or_insert_with(|| Evidence {
                        count: 1,
                        first: EvidenceRef {
                            chapter_id: chapter.id.clone(),
                            line_ref,
                        },
                    });
            }
        }

        dropped
    }

    // =========================================================================
    // Co-occurrence
    // =========================================================================

    fn co_occurrence_evidence(
        &self,
        occurrences: &[RawOccurrence],
        resolution: &AliasResolution,
    ) -> BTreeMap<CharacterPair, Evidence> {
        // chapter ordinal -> (chapter id, character -> first line in chapter)
        let mut per_chapter: BTreeMap<u32, (&str, HashMap<CharacterId, usize>)> = BTreeMap::new();
        for (i, occ) in occurrences.iter().enumerate() {
            let Some(&owner) = resolution.owners.get(i) else {
                continue;
            };
            let (_, first_lines) = per_chapter
                .entry(occ.chapter_ordinal)
                .or_insert_with(|| (occ.chapter_id.as_str(), HashMap::new()));
            first_lines
                .entry(owner)
                .and_modify(|line| *line = (*line).min(occ.line_ref))
                .or_insert(occ.line_ref);
        }

        let mut counts: BTreeMap<CharacterPair, Evidence> = BTreeMap::new();
        for (chapter_id, first_lines) in per_chapter.values() {
            let present: BTreeSet<CharacterId> = first_lines.keys().copied().collect();
            let present: Vec<CharacterId> = present.into_iter().collect();
            for (i, &a) in present.iter().enumerate() {
                for &b in &present[i + 1..] {
                    counts
                        .entry(CharacterPair::new(a, b))
                        .and_modify(|e| e.count += 1)
                        .or_insert_with(|| Evidence {
                            count: 1,
                            first: EvidenceRef {
                                chapter_id: chapter_id.to_string(),
                                line_ref: first_lines[&a].max(first_lines[&b]),
                            },
                        });
                }
            }
        }

        counts
    }
}

fn slot_text<'t>(caps: &regex::Captures<'t>, slot: &CaptureSlot) -> Option<&'t str> {
    caps.name(&slot.group).map(|m| m.as_str())
}

/// Resolve the longest known name pinned to the anchored side of `capture`
///
/// `End`: try suffixes, longest first. `Start`: try prefixes, longest first.
pub fn resolve_anchored(
    resolution: &AliasResolution,
    capture: &str,
    anchor: SlotAnchor,
) -> Option<CharacterId> {
    match anchor {
        SlotAnchor::End => capture
            .char_indices()
            .map(|(i, _)| &capture[i..])
            .find_map(|suffix| resolution.resolve(suffix)),
        SlotAnchor::Start => {
            let mut ends: Vec<usize> = capture
                .char_indices()
                .map(|(i, c)| i + c.len_utf8())
                .collect();
            ends.reverse();
            ends.into_iter().find_map(|end| resolution.resolve(&capture[..end]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExtractionMethod;
    use crate::resolver::AliasResolver;

    fn occ(surface: &str, chapter: u32, line: usize) -> RawOccurrence {
        RawOccurrence {
            surface: surface.to_string(),
            chapter_id: format!("c{chapter}"),
            chapter_ordinal: chapter,
            line_ref: line,
            offset: 0,
            context_window: String::new(),
            method: ExtractionMethod::Surname,
        }
    }

    fn setup(occurrences: &[RawOccurrence]) -> (CompiledRules, AliasResolution) {
        let rules = CompiledRules::chinese().unwrap();
        let resolution =
            AliasResolver::new(&AnalysisConfig::default(), &rules).resolve(occurrences);
        (rules, resolution)
    }

    #[test]
    fn test_anchored_resolution() {
        let (_, resolution) = setup(&[occ("莫凡", 1, 1), occ("叶心夏", 1, 2)]);
        let mo = resolve_anchored(&resolution, "昨天莫凡", SlotAnchor::End);
        assert_eq!(mo, Some(CharacterId(1)));
        let ye = resolve_anchored(&resolution, "叶心夏的", SlotAnchor::Start);
        assert_eq!(ye, Some(CharacterId(2)));
        assert_eq!(resolve_anchored(&resolution, "莫凡昨天", SlotAnchor::End), None);
        assert_eq!(resolve_anchored(&resolution, "那位老者", SlotAnchor::Start), None);
    }

    #[test]
    fn test_explicit_family_relation() {
        let occurrences = vec![occ("莫凡", 1, 1), occ("莫家兴", 1, 1)];
        let (rules, resolution) = setup(&occurrences);
        let engine = RelationshipEngine::new(&AnalysisConfig::default(), &rules);
        let chapters = vec![ChapterContext::new("c1", 1, "莫家兴是莫凡的父亲。")];

        let output = engine.build(&chapters, &occurrences, &resolution);
        let family: Vec<&Relationship> = output
            .relationships
            .iter()
            .filter(|r| r.relation_type == RelationType::Family)
            .collect();
        assert_eq!(family.len(), 1);
        assert_eq!(family[0].pair, CharacterPair::new(CharacterId(1), CharacterId(2)));
        assert_eq!(family[0].evidence_count, 1);
        assert!((family[0].strength - 0.2).abs() < 1e-9);
        assert_eq!(family[0].first_evidence_ref.chapter_id, "c1");
        assert_eq!(output.dropped_explicit, 0);
    }

    #[test]
    fn test_first_evidence_is_earliest_match() {
        // line 1 is matched by the "A和B是兄妹" rule, line 5 by the earlier-listed
        // "A是B的妹妹" rule
        let occurrences = vec![occ("莫凡", 1, 1), occ("叶心夏", 1, 1)];
        let (rules, resolution) = setup(&occurrences);
        let engine = RelationshipEngine::new(&AnalysisConfig::default(), &rules);
        let chapters = vec![ChapterContext::new(
            "c1",
            1,
            "莫凡和叶心夏是兄妹。\n二\n三\n四\n叶心夏是莫凡的妹妹。",
        )];

        let output = engine.build(&chapters, &occurrences, &resolution);
        let family = output
            .relationships
            .iter()
            .find(|r| r.relation_type == RelationType::Family)
            .unwrap();
        assert_eq!(family.evidence_count, 2);
        assert_eq!(family.first_evidence_ref.line_ref, 1);
        assert_eq!(family.first_evidence_ref.chapter_id, "c1");
    }

    #[test]
    fn test_unresolved_slot_is_dropped() {
        let occurrences = vec![occ("莫凡", 1, 1)];
        let (rules, resolution) = setup(&occurrences);
        let engine = RelationshipEngine::new(&AnalysisConfig::default(), &rules);
        let chapters = vec![ChapterContext::new("c1", 1, "莫凡是那位老者的父亲。")];

        let output = engine.build(&chapters, &occurrences, &resolution);
        assert!(output.relationships.is_empty());
        assert!(output.dropped_explicit >= 1);
    }

    #[test]
    fn test_co_occurrence_threshold_and_strength() {
        let mut occurrences = Vec::new();
        for chapter in 1..=5 {
            occurrences.push(occ("莫凡", chapter, 3));
            occurrences.push(occ("叶心夏", chapter, 7));
        }
        occurrences.push(occ("穆宁雪", 1, 1));
        let (rules, resolution) = setup(&occurrences);
        let engine = RelationshipEngine::new(&AnalysisConfig::default(), &rules);

        let output = engine.build(&[], &occurrences, &resolution);
        assert_eq!(output.relationships.len(), 1);
        let rel = &output.relationships[0];
        assert_eq!(rel.relation_type, RelationType::CoOccurrence);
        assert_eq!(rel.evidence_count, 5);
        assert!((rel.strength - 0.05).abs() < 1e-9);
        assert_eq!(rel.first_evidence_ref.chapter_id, "c1");
        assert_eq!(rel.first_evidence_ref.line_ref, 7);
    }

    #[test]
    fn test_types_do_not_overwrite() {
        let mut occurrences = Vec::new();
        for chapter in 1..=5 {
            occurrences.push(occ("莫凡", chapter, 1));
            occurrences.push(occ("莫家兴", chapter, 1));
        }
        let (rules, resolution) = setup(&occurrences);
        let engine = RelationshipEngine::new(&AnalysisConfig::default(), &rules);
        let chapters = vec![ChapterContext::new("c1", 1, "莫家兴是莫凡的父亲。")];

        let output = engine.build(&chapters, &occurrences, &resolution);
        let types: Vec<RelationType> =
            output.relationships.iter().map(|r| r.relation_type).collect();
        assert_eq!(types, vec![RelationType::Family, RelationType::CoOccurrence]);
        assert!(output.relationships.iter().all(Relationship::is_valid));
    }
}
