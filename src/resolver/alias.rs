//! AliasResolver: cluster surface names into canonical characters
//!
//! Distinct surfaces are interned in first-appearance order and compared
//! against every earlier surface. A link is either plain similarity
//! (normalized edit distance) or an honorific/diminutive composition. Each
//! new surface joins the earliest cluster it links to; clusters themselves
//! are never merged, so a later surface cannot retroactively fuse two
//! identities.

use std::collections::{BTreeSet, HashMap};

use lasso::{Key, Rodeo, Spur};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::similarity::normalized_levenshtein;
use crate::config::AnalysisConfig;
use crate::model::{CanonicalCharacter, CharacterId, OccurrenceRef, RawOccurrence};
use crate::rules::CompiledRules;

// =============================================================================
// Types
// =============================================================================

/// A surface that linked to more than one existing cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasConflict {
    pub surface: String,
    /// Cluster the surface was assigned to
    pub kept: CharacterId,
    /// Other clusters it also matched, left unmerged
    pub also_matched: Vec<CharacterId>,
}

/// Output of alias resolution
#[derive(Debug, Clone, Default)]
pub struct AliasResolution {
    /// Ordered by id
    pub characters: Vec<CanonicalCharacter>,
    /// Owner of each input occurrence, by input index
    pub owners: Vec<CharacterId>,
    pub conflicts: Vec<AliasConflict>,
    by_surface: HashMap<String, CharacterId>,
}

impl AliasResolution {
    /// Canonical id for an exact surface string
    pub fn resolve(&self, surface: &str) -> Option<CharacterId> {
        self.by_surface.get(surface).copied()
    }

    pub fn character(&self, id: CharacterId) -> Option<&CanonicalCharacter> {
        // ids are dense and 1-based
        let index = (id.0 as usize).checked_sub(1)?;
        self.characters.get(index).filter(|c| c.id == id)
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut CanonicalCharacter> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.characters.get_mut(index).filter(|c| c.id == id)
    }

    pub fn surface_count(&self) -> usize {
        self.by_surface.len()
    }
}

/// How two surfaces are related
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Similar,
    /// `compound` is the other surface plus an honorific suffix
    Title { compound: usize },
    Diminutive,
}

// =============================================================================
// Union-Find
// =============================================================================

/// Union-find over surface indices; the smaller index stays root
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, i: usize, j: usize) {
        let ri = self.find(i);
        let rj = self.find(j);
        if ri != rj {
            let (root, child) = if ri < rj { (ri, rj) } else { (rj, ri) };
            self.parent[child] = root;
        }
    }
}

// =============================================================================
// AliasResolver
// =============================================================================

pub struct AliasResolver<'a> {
    rules: &'a CompiledRules,
    threshold: f64,
    diminutive_rules: bool,
}

impl<'a> AliasResolver<'a> {
    pub fn new(config: &AnalysisConfig, rules: &'a CompiledRules) -> Self {
        Self {
            rules,
            threshold: config.name_similarity_threshold,
            diminutive_rules: config.diminutive_rules,
        }
    }

    /// Cluster all occurrences into canonical characters
    ///
    /// Deterministic: the same occurrences, in any input order, yield the
    /// same clusters, ids and representatives.
    pub fn resolve(&self, occurrences: &[RawOccurrence]) -> AliasResolution {
        let mut order: Vec<usize> = (0..occurrences.len()).collect();
        order.sort_by_key(|&i| occurrences[i].order_key());

        // Interning order is first-appearance order
        let mut rodeo: Rodeo<Spur> = Rodeo::default();
        let mut counts: Vec<usize> = Vec::new();
        let mut occurrence_surface = vec![0; occurrences.len()];
        for &i in &order {
            let index = rodeo.get_or_intern(occurrences[i].surface.as_str()).into_usize();
            if index == counts.len() {
                counts.push(0);
            }
            counts[index] += 1;
            occurrence_surface[i] = index;
        }
        let surfaces: Vec<&str> = rodeo.strings().collect();
        let n = surfaces.len();

        let mut uf = UnionFind::new(n);
        let mut title_compound = vec![false; n];
        let mut plain_link = vec![false; n];
        let mut raw_conflicts: Vec<(usize, usize, Vec<usize>)> = Vec::new();

        for i in 0..n {
            let mut links: Vec<(usize, Link)> = Vec::new();
            for j in 0..i {
                if let Some(link) = self.link(surfaces[i], i, surfaces[j], j) {
                    links.push((uf.find(j), link));
                }
            }
            if links.is_empty() {
                continue;
            }

            let mut roots: Vec<usize> = links.iter().map(|(root, _)| *root).collect();
            roots.sort_unstable();
            roots.dedup();
            let target = roots[0];
            if roots.len() > 1 {
                raw_conflicts.push((i, target, roots[1..].to_vec()));
            }

            for (_, link) in links.iter().filter(|(root, _)| *root == target) {
                match *link {
                    Link::Title { compound } if compound == i => title_compound[i] = true,
                    Link::Title { compound } => {
                        title_compound[compound] = true;
                        plain_link[i] = true;
                    }
                    Link::Similar | Link::Diminutive => plain_link[i] = true,
                }
            }
            uf.union(target, i);
        }

        // Clusters ordered by root, which is the earliest surface
        let mut cluster_of_root: HashMap<usize, usize> = HashMap::new();
        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for s in 0..n {
            let root = uf.find(s);
            let next = clusters.len();
            let c = *cluster_of_root.entry(root).or_insert(next);
            if c == clusters.len() {
                clusters.push(Vec::new());
            }
            clusters[c].push(s);
        }

        let id_of_surface = |uf: &mut UnionFind, s: usize| -> CharacterId {
            let c = cluster_of_root.get(&uf.find(s)).copied().unwrap_or_default();
            CharacterId(c as u32 + 1)
        };

        let mut by_surface = HashMap::with_capacity(n);
        let mut characters = Vec::with_capacity(clusters.len());
        for (c, members) in clusters.iter().enumerate() {
            let id = CharacterId(c as u32 + 1);
            // Most occurrences wins, earliest first appearance breaks ties
            let representative = members
                .iter()
                .copied()
                .max_by(|&a, &b| counts[a].cmp(&counts[b]).then_with(|| b.cmp(&a)))
                .unwrap_or(members[0]);

            let mut character = CanonicalCharacter::new(id, surfaces[representative]);
            for &s in members {
                by_surface.insert(surfaces[s].to_string(), id);
                if s == representative {
                    continue;
                }
                if title_compound[s] && !plain_link[s] {
                    character.title_set.insert(surfaces[s].to_string());
                } else {
                    character.alias_set.insert(surfaces[s].to_string());
                }
            }
            characters.push(character);
        }

        let owners: Vec<CharacterId> = occurrence_surface
            .iter()
            .map(|&s| id_of_surface(&mut uf, s))
            .collect();
        for &i in &order {
            let occ = &occurrences[i];
            let id = owners[i];
            if let Some(character) = characters.get_mut(id.0 as usize - 1) {
                character.occurrence_refs.push(OccurrenceRef {
                    chapter_ordinal: occ.chapter_ordinal,
                    line_ref: occ.line_ref,
                    offset: occ.offset,
                    index: i,
                    chapter_id: occ.chapter_id.clone(),
                });
            }
        }

        let conflicts: Vec<AliasConflict> = raw_conflicts
            .into_iter()
            .map(|(s, kept, others)| AliasConflict {
                surface: surfaces[s].to_string(),
                kept: id_of_surface(&mut uf, kept),
                also_matched: others
                    .into_iter()
                    .map(|r| id_of_surface(&mut uf, r))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect(),
            })
            .collect();

        for conflict in &conflicts {
            warn!(
                surface = %conflict.surface,
                kept = %conflict.kept,
                also_matched = ?conflict.also_matched,
                "surface matches several characters; clusters left unmerged"
            );
        }
        debug!(surfaces = n, characters = characters.len(), "aliases resolved");

        AliasResolution {
            characters,
            owners,
            conflicts,
            by_surface,
        }
    }

    /// Link between surface `a` (index `ia`) and surface `b` (index `ib`)
    fn link(&self, a: &str, ia: usize, b: &str, ib: usize) -> Option<Link> {
        if normalized_levenshtein(a, b) > self.threshold {
            return Some(Link::Similar);
        }
        if !self.diminutive_rules {
            return None;
        }
        if self.is_title_of(a, b) {
            return Some(Link::Title { compound: ia });
        }
        if self.is_title_of(b, a) {
            return Some(Link::Title { compound: ib });
        }
        if self.is_diminutive_of(a, b) || self.is_diminutive_of(b, a) {
            return Some(Link::Diminutive);
        }
        None
    }

    /// `compound` is `base` plus an honorific suffix
    fn is_title_of(&self, compound: &str, base: &str) -> bool {
        matches!(self.rules.strip_honorific(compound), Some((core, _)) if core == base)
    }

    /// `short` is a familiar form of `full`: honorific or diminutive around
    /// the given name (or its tail), or a diminutive prefix on the whole name
    fn is_diminutive_of(&self, short: &str, full: &str) -> bool {
        let given = self.rules.split_surname(full).map(|(_, given)| given);
        let matches_given = |core: &str| given.is_some_and(|g| g.ends_with(core));

        if let Some((core, _)) = self.rules.strip_honorific(short) {
            if matches_given(core) {
                return true;
            }
        }
        if let Some((_, core)) = self.rules.strip_diminutive(short) {
            if core == full || matches_given(core) {
                return true;
            }
        }
        false
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExtractionMethod;

    fn occ(surface: &str, ordinal: u32, line: usize, offset: usize) -> RawOccurrence {
        RawOccurrence {
            surface: surface.to_string(),
            chapter_id: format!("c{ordinal}"),
            chapter_ordinal: ordinal,
            line_ref: line,
            offset,
            context_window: String::new(),
            method: ExtractionMethod::Surname,
        }
    }

    fn resolve_with(config: &AnalysisConfig, occurrences: &[RawOccurrence]) -> AliasResolution {
        let rules = CompiledRules::chinese().unwrap();
        AliasResolver::new(config, &rules).resolve(occurrences)
    }

    fn resolve(occurrences: &[RawOccurrence]) -> AliasResolution {
        resolve_with(&AnalysisConfig::default(), occurrences)
    }

    #[test]
    fn test_diminutive_cluster() {
        let occurrences = vec![
            occ("莫凡", 1, 1, 0),
            occ("小凡", 1, 2, 0),
            occ("莫凡", 1, 3, 0),
            occ("凡哥", 2, 1, 0),
        ];
        let result = resolve(&occurrences);
        assert_eq!(result.characters.len(), 1);
        let mo = &result.characters[0];
        assert_eq!(mo.id, CharacterId(1));
        assert_eq!(mo.canonical_name, "莫凡");
        assert!(mo.alias_set.contains("小凡"));
        assert!(mo.alias_set.contains("凡哥"));
        assert!(mo.title_set.is_empty());
        assert_eq!(mo.occurrence_refs.len(), 4);
        assert_eq!(result.resolve("凡哥"), Some(CharacterId(1)));
    }

    #[test]
    fn test_title_compound_goes_to_title_set() {
        let occurrences = vec![occ("莫凡", 1, 1, 0), occ("莫凡先生", 1, 2, 0)];
        let result = resolve(&occurrences);
        let mo = &result.characters[0];
        assert_eq!(mo.canonical_name, "莫凡");
        assert!(mo.title_set.contains("莫凡先生"));
        assert!(!mo.alias_set.contains("莫凡先生"));
    }

    #[test]
    fn test_representative_is_most_frequent() {
        let occurrences = vec![
            occ("小凡", 1, 1, 0),
            occ("莫凡", 1, 2, 0),
            occ("莫凡", 1, 3, 0),
        ];
        let result = resolve(&occurrences);
        assert_eq!(result.characters.len(), 1);
        assert_eq!(result.characters[0].canonical_name, "莫凡");
        assert!(result.characters[0].alias_set.contains("小凡"));
    }

    fn repeated(surface: &str, count: usize, line: usize) -> Vec<RawOccurrence> {
        (0..count).map(|i| occ(surface, 1, line + i, 0)).collect()
    }

    #[test]
    fn test_full_name_outnumbers_familiar_forms() {
        let mut occurrences = repeated("莫凡", 50, 1);
        occurrences.extend(repeated("小凡", 10, 100));
        occurrences.extend(repeated("凡哥", 5, 200));

        let result = resolve(&occurrences);
        assert_eq!(result.characters.len(), 1);
        let mo = &result.characters[0];
        assert_eq!(mo.canonical_name, "莫凡");
        assert_eq!(mo.alias_set.len(), 2);
        assert!(mo.alias_set.contains("小凡"));
        assert!(mo.alias_set.contains("凡哥"));
        assert_eq!(mo.occurrence_refs.len(), 65);
    }

    #[test]
    fn test_representative_follows_the_most_used_form() {
        let mut occurrences = repeated("莫凡", 3, 1);
        occurrences.extend(repeated("小凡", 12, 10));
        occurrences.extend(repeated("凡哥", 2, 30));

        let result = resolve(&occurrences);
        assert_eq!(result.characters.len(), 1);
        let mo = &result.characters[0];
        assert_eq!(mo.id, CharacterId(1));
        assert_eq!(mo.canonical_name, "小凡");
        assert!(mo.alias_set.contains("莫凡"));
        assert!(mo.alias_set.contains("凡哥"));
        assert!(!mo.alias_set.contains("小凡"));
        assert_eq!(result.resolve("莫凡"), Some(CharacterId(1)));
    }

    #[test]
    fn test_rules_disabled_keeps_forms_apart() {
        let config = AnalysisConfig {
            diminutive_rules: false,
            ..AnalysisConfig::default()
        };
        let occurrences = vec![occ("莫凡", 1, 1, 0), occ("小凡", 1, 2, 0)];
        let result = resolve_with(&config, &occurrences);
        assert_eq!(result.characters.len(), 2);
        assert_eq!(result.characters[1].canonical_name, "小凡");
        assert_eq!(result.characters[1].id, CharacterId(2));
    }

    #[test]
    fn test_similarity_threshold_is_strict() {
        let mut config = AnalysisConfig {
            name_similarity_threshold: 0.5,
            diminutive_rules: false,
            ..AnalysisConfig::default()
        };
        let occurrences = vec![occ("莫凡", 1, 1, 0), occ("莫云", 1, 2, 0)];
        assert_eq!(resolve_with(&config, &occurrences).characters.len(), 2);

        config.name_similarity_threshold = 0.49;
        assert_eq!(resolve_with(&config, &occurrences).characters.len(), 1);
    }

    #[test]
    fn test_conflict_joins_earliest_cluster() {
        // 小凡 can be a diminutive of both 莫凡 and 叶凡
        let occurrences = vec![
            occ("莫凡", 1, 1, 0),
            occ("叶凡", 1, 2, 0),
            occ("小凡", 1, 3, 0),
        ];
        let result = resolve(&occurrences);
        assert_eq!(result.characters.len(), 2);
        assert_eq!(result.resolve("小凡"), Some(CharacterId(1)));
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.surface, "小凡");
        assert_eq!(conflict.kept, CharacterId(1));
        assert_eq!(conflict.also_matched, vec![CharacterId(2)]);
    }

    #[test]
    fn test_partition_and_determinism() {
        let occurrences = vec![
            occ("叶心夏", 2, 1, 0),
            occ("莫凡", 1, 1, 0),
            occ("小凡", 1, 4, 9),
            occ("穆宁雪", 1, 2, 3),
            occ("心夏姐", 2, 5, 0),
        ];
        let first = resolve(&occurrences);

        let mut reversed = occurrences.clone();
        reversed.reverse();
        let second = resolve(&reversed);

        let names = |r: &AliasResolution| {
            r.characters.iter().map(|c| c.canonical_name.clone()).collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
        assert_eq!(names(&first), vec!["莫凡", "穆宁雪", "叶心夏"]);

        // every occurrence owned by exactly one character
        let owned: usize = first.characters.iter().map(|c| c.occurrence_refs.len()).sum();
        assert_eq!(owned, occurrences.len());
        for (i, o) in occurrences.iter().enumerate() {
            let owner = first.character(first.owners[i]).unwrap();
            assert!(owner.is_known_as(&o.surface));
        }
    }

    #[test]
    fn test_empty_input() {
        let result = resolve(&[]);
        assert!(result.characters.is_empty());
        assert!(result.owners.is_empty());
        assert_eq!(result.resolve("莫凡"), None);
    }
}
