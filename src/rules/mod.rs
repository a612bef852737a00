//! Declarative rule tables
//!
//! Everything language-specific lives here as data: the surname lexicon,
//! extraction rules, honorific/diminutive affixes, relation patterns, gender
//! markers and the profession table. A [`RuleSet`] is plain serde data and can
//! be swapped per corpus; [`RuleSet::compile`] turns it into matchers.
//!
//! # Usage
//!
//! ```rust,ignore
//! let rules = RuleSet::default().compile()?;
//! assert_eq!(rules.split_surname("欧阳明"), Some(("欧阳", "明")));
//! ```

mod defaults;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::RuleError;
use crate::model::{ExtractionMethod, RelationType};

// =============================================================================
// Rule Data
// =============================================================================

/// A full, swappable rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSet {
    /// Surname lexicon (single and compound surnames)
    pub surnames: Vec<String>,
    /// Characters that terminate a given name after a surname hit
    pub name_boundary_chars: String,
    /// Speaker / address rules, applied in order after the surname rule
    pub extraction_rules: Vec<ExtractionRule>,
    pub honorific_suffixes: Vec<String>,
    pub diminutive_prefixes: Vec<String>,
    /// Relation patterns, applied in order
    pub relation_rules: Vec<RelationRule>,
    pub masculine_markers: Vec<String>,
    pub feminine_markers: Vec<String>,
    /// Words that contain a gendered marker but carry no gender (他们, 其他)
    #[serde(default)]
    pub neutral_markers: Vec<String>,
    /// Ordered profession table, first match wins
    pub professions: Vec<ProfessionRule>,
}

/// One regex rule producing name candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionRule {
    pub method: ExtractionMethod,
    pub pattern: String,
    /// Capture group holding the name
    #[serde(default = "default_group")]
    pub group: usize,
}

fn default_group() -> usize { 1 }

/// Which end of a capture the name is pinned to
///
/// `End`: the name finishes where the capture finishes (junk may precede it),
/// so suffixes are tried longest-first. `Start`: the mirror image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotAnchor {
    Start,
    End,
}

/// Capture-role mapping for one side of a relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureSlot {
    pub group: String,
    pub anchor: SlotAnchor,
}

impl CaptureSlot {
    pub fn new(group: &str, anchor: SlotAnchor) -> Self {
        Self {
            group: group.to_string(),
            anchor,
        }
    }
}

/// A relation pattern with two name slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationRule {
    pub relation_type: RelationType,
    pub pattern: String,
    pub first: CaptureSlot,
    pub second: CaptureSlot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfessionRule {
    pub profession: String,
    pub markers: Vec<String>,
}

impl Default for RuleSet {
    fn default() -> Self {
        defaults::chinese()
    }
}

// =============================================================================
// Compiled Rules
// =============================================================================

#[derive(Debug, Clone)]
pub struct CompiledExtraction {
    pub method: ExtractionMethod,
    pub regex: Regex,
    pub group: usize,
}

#[derive(Debug, Clone)]
pub struct CompiledRelation {
    pub relation_type: RelationType,
    pub regex: Regex,
    pub first: CaptureSlot,
    pub second: CaptureSlot,
}

#[derive(Debug, Clone)]
pub struct CompiledProfession {
    pub profession: String,
    pub regex: Regex,
}

/// Matchers built from a [`RuleSet`]
#[derive(Debug, Clone)]
pub struct CompiledRules {
    surname_matcher: AhoCorasick,
    /// Longest first, for prefix stripping
    surnames: Vec<String>,
    name_boundary: HashSet<char>,
    extraction: Vec<CompiledExtraction>,
    /// Longest first
    honorific_suffixes: Vec<String>,
    /// Longest first
    diminutive_prefixes: Vec<String>,
    relations: Vec<CompiledRelation>,
    /// Masculine markers, then feminine, then neutral
    gender_matcher: AhoCorasick,
    masculine_count: usize,
    feminine_end: usize,
    professions: Vec<CompiledProfession>,
}

impl RuleSet {
    /// Compile every table; fails on the first bad pattern
    pub fn compile(&self) -> Result<CompiledRules, RuleError> {
        let surnames = longest_first(&self.surnames);
        let surname_matcher = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&surnames)?;

        let mut extraction = Vec::with_capacity(self.extraction_rules.len());
        for rule in &self.extraction_rules {
            let regex = compile_pattern(&rule.pattern)?;
            if rule.group >= regex.captures_len() {
                return Err(RuleError::MissingGroup {
                    pattern: rule.pattern.clone(),
                    group: rule.group.to_string(),
                });
            }
            extraction.push(CompiledExtraction {
                method: rule.method,
                regex,
                group: rule.group,
            });
        }

        let mut relations = Vec::with_capacity(self.relation_rules.len());
        for rule in &self.relation_rules {
            if !rule.relation_type.is_explicit() {
                return Err(RuleError::ImplicitRelationType(rule.pattern.clone()));
            }
            let regex = compile_pattern(&rule.pattern)?;
            for slot in [&rule.first, &rule.second] {
                if !regex.capture_names().flatten().any(|name| name == slot.group) {
                    return Err(RuleError::MissingGroup {
                        pattern: rule.pattern.clone(),
                        group: slot.group.clone(),
                    });
                }
            }
            relations.push(CompiledRelation {
                relation_type: rule.relation_type,
                regex,
                first: rule.first.clone(),
                second: rule.second.clone(),
            });
        }

        let masculine = non_empty(&self.masculine_markers);
        let feminine = non_empty(&self.feminine_markers);
        let neutral = non_empty(&self.neutral_markers);
        let masculine_count = masculine.len();
        let feminine_end = masculine_count + feminine.len();
        let gender_matcher = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .build(masculine.iter().chain(feminine.iter()).chain(neutral.iter()))?;

        let mut professions = Vec::new();
        for rule in &self.professions {
            let markers = non_empty(&rule.markers);
            if markers.is_empty() {
                continue;
            }
            let alternation = markers
                .iter()
                .map(|m| regex::escape(m))
                .collect::<Vec<_>>()
                .join("|");
            professions.push(CompiledProfession {
                profession: rule.profession.clone(),
                regex: compile_pattern(&alternation)?,
            });
        }

        Ok(CompiledRules {
            surname_matcher,
            surnames,
            name_boundary: self.name_boundary_chars.chars().collect(),
            extraction,
            honorific_suffixes: longest_first(&self.honorific_suffixes),
            diminutive_prefixes: longest_first(&self.diminutive_prefixes),
            relations,
            gender_matcher,
            masculine_count,
            feminine_end,
            professions,
        })
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn non_empty(items: &[String]) -> Vec<String> {
    items.iter().filter(|s| !s.is_empty()).cloned().collect()
}

fn longest_first(items: &[String]) -> Vec<String> {
    let mut sorted = non_empty(items);
    sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
    sorted.dedup();
    sorted
}

impl CompiledRules {
    /// Build the built-in Chinese rule set
    pub fn chinese() -> Result<Self, RuleError> {
        RuleSet::default().compile()
    }

    pub fn surname_matcher(&self) -> &AhoCorasick {
        &self.surname_matcher
    }

    pub fn is_name_boundary(&self, c: char) -> bool {
        self.name_boundary.contains(&c)
    }

    pub fn extraction_rules(&self) -> &[CompiledExtraction] {
        &self.extraction
    }

    pub fn relation_rules(&self) -> &[CompiledRelation] {
        &self.relations
    }

    pub fn professions(&self) -> &[CompiledProfession] {
        &self.professions
    }

    pub fn starts_with_surname(&self, name: &str) -> bool {
        self.surnames.iter().any(|s| name.starts_with(s.as_str()))
    }

    /// Split `name` into (surname, given name); the given name is never empty
    pub fn split_surname<'a>(&self, name: &'a str) -> Option<(&'a str, &'a str)> {
        self.surnames.iter().find_map(|s| {
            let given = name.strip_prefix(s.as_str())?;
            (!given.is_empty()).then(|| name.split_at(s.len()))
        })
    }

    /// Split `name` into (core, honorific suffix); the core is never empty
    pub fn strip_honorific<'a>(&self, name: &'a str) -> Option<(&'a str, &'a str)> {
        self.honorific_suffixes.iter().find_map(|suffix| {
            let core = name.strip_suffix(suffix.as_str())?;
            (!core.is_empty()).then(|| name.split_at(core.len()))
        })
    }

    /// Split `name` into (diminutive prefix, core); the core is never empty
    pub fn strip_diminutive<'a>(&self, name: &'a str) -> Option<(&'a str, &'a str)> {
        self.diminutive_prefixes.iter().find_map(|prefix| {
            let core = name.strip_prefix(prefix.as_str())?;
            (!core.is_empty()).then(|| name.split_at(prefix.len()))
        })
    }

    /// Count (masculine, feminine) marker hits in `text`; neutral words
    /// swallow the markers inside them
    pub fn count_gender_markers(&self, text: &str) -> (usize, usize) {
        let mut masculine = 0;
        let mut feminine = 0;
        for mat in self.gender_matcher.find_iter(text) {
            let pattern = mat.pattern().as_usize();
            if pattern < self.masculine_count {
                masculine += 1;
            } else if pattern < self.feminine_end {
                feminine += 1;
            }
        }
        (masculine, feminine)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> CompiledRules {
        CompiledRules::chinese().unwrap()
    }

    #[test]
    fn test_default_rules_compile() {
        let rules = rules();
        assert!(!rules.extraction_rules().is_empty());
        assert!(!rules.relation_rules().is_empty());
        assert!(!rules.professions().is_empty());
    }

    #[test]
    fn test_split_surname_prefers_compound() {
        let rules = rules();
        assert_eq!(rules.split_surname("欧阳明"), Some(("欧阳", "明")));
        assert_eq!(rules.split_surname("莫凡"), Some(("莫", "凡")));
        assert_eq!(rules.split_surname("莫"), None);
        assert_eq!(rules.split_surname("凡哥"), None);
        assert!(rules.starts_with_surname("司马懿"));
    }

    #[test]
    fn test_affix_stripping() {
        let rules = rules();
        assert_eq!(rules.strip_honorific("凡哥"), Some(("凡", "哥")));
        assert_eq!(rules.strip_honorific("莫凡先生"), Some(("莫凡", "先生")));
        assert_eq!(rules.strip_honorific("哥"), None);
        assert_eq!(rules.strip_diminutive("小凡"), Some(("小", "凡")));
        assert_eq!(rules.strip_diminutive("莫凡"), None);
    }

    #[test]
    fn test_gender_marker_counts() {
        let rules = rules();
        assert_eq!(rules.count_gender_markers("他笑了笑，她没有说话，他走了"), (2, 1));
        assert_eq!(rules.count_gender_markers("姐姐和妹妹"), (0, 2));
    }

    #[test]
    fn test_plural_pronouns_carry_no_gender() {
        let rules = rules();
        assert_eq!(rules.count_gender_markers("他们走了，她们也走了"), (0, 0));
        assert_eq!(rules.count_gender_markers("他看着其他人"), (1, 0));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let mut set = RuleSet::default();
        set.extraction_rules.push(ExtractionRule {
            method: ExtractionMethod::Speaker,
            pattern: "(unclosed".to_string(),
            group: 1,
        });
        assert!(matches!(set.compile(), Err(RuleError::Pattern { .. })));
    }

    #[test]
    fn test_missing_slot_group_rejected() {
        let mut set = RuleSet::default();
        set.relation_rules.push(RelationRule {
            relation_type: RelationType::Family,
            pattern: r"(?P<a>\p{Han}+)的父亲".to_string(),
            first: CaptureSlot::new("a", SlotAnchor::End),
            second: CaptureSlot::new("b", SlotAnchor::Start),
        });
        assert!(matches!(set.compile(), Err(RuleError::MissingGroup { .. })));
    }

    #[test]
    fn test_co_occurrence_rule_rejected() {
        let mut set = RuleSet::default();
        set.relation_rules.push(RelationRule {
            relation_type: RelationType::CoOccurrence,
            pattern: r"(?P<a>\p{Han}+)和(?P<b>\p{Han}+)".to_string(),
            first: CaptureSlot::new("a", SlotAnchor::End),
            second: CaptureSlot::new("b", SlotAnchor::Start),
        });
        assert!(matches!(set.compile(), Err(RuleError::ImplicitRelationType(_))));
    }

    #[test]
    fn test_rule_set_round_trips_through_json() {
        let set = RuleSet::default();
        let json = serde_json::to_string(&set).unwrap();
        let back: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }
}
