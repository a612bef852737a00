//! CharacterGraph: undirected relationship graph
//!
//! One node per canonical character, one edge per relationship entry (so a
//! pair with a family and a co-occurrence relationship has two parallel
//! edges). Connectivity queries go through rustworkx-core.

// Use petgraph from rustworkx-core to ensure version compatibility
use rustworkx_core::petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{BTreeSet, HashMap};

use crate::model::{CharacterId, RelationType, Relationship};

/// Edge payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelationEdge {
    pub relation_type: RelationType,
    pub strength: f64,
}

pub struct CharacterGraph {
    graph: UnGraph<CharacterId, RelationEdge>,
    index_of: HashMap<CharacterId, NodeIndex>,
}

impl CharacterGraph {
    /// Build from character ids and relationships; relationships naming an
    /// unknown id are skipped
    pub fn build(
        ids: impl IntoIterator<Item = CharacterId>,
        relationships: &[Relationship],
    ) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut index_of = HashMap::new();
        for id in ids {
            index_of.entry(id).or_insert_with(|| graph.add_node(id));
        }

        for rel in relationships {
            let (Some(&a), Some(&b)) = (
                index_of.get(&rel.pair.first()),
                index_of.get(&rel.pair.second()),
            ) else {
                continue;
            };
            graph.add_edge(
                a,
                b,
                RelationEdge {
                    relation_type: rel.relation_type,
                    strength: rel.strength,
                },
            );
        }

        Self { graph, index_of }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Distinct neighbours, ordered by id
    pub fn neighbors(&self, id: CharacterId) -> Vec<CharacterId> {
        let Some(&idx) = self.index_of.get(&id) else {
            return Vec::new();
        };
        let set: BTreeSet<CharacterId> = self
            .graph
            .neighbors(idx)
            .filter_map(|n| self.graph.node_weight(n).copied())
            .collect();
        set.into_iter().collect()
    }

    /// Number of relationship entries touching `id`
    pub fn degree(&self, id: CharacterId) -> usize {
        self.index_of
            .get(&id)
            .map_or(0, |&idx| self.graph.edges(idx).count())
    }

    /// Character with the most relationship entries; ties go to the lower id.
    /// `None` when there are no edges.
    pub fn most_connected(&self) -> Option<(CharacterId, usize)> {
        self.graph
            .node_indices()
            .filter_map(|idx| {
                let id = *self.graph.node_weight(idx)?;
                Some((id, self.graph.edges(idx).count()))
            })
            .filter(|(_, degree)| *degree > 0)
            .max_by(|(ia, da), (ib, db)| da.cmp(db).then_with(|| ib.cmp(ia)))
    }

    /// Characters with no relationships, ordered by id
    pub fn isolated(&self) -> Vec<CharacterId> {
        use rustworkx_core::connectivity::isolates;

        let mut ids: Vec<CharacterId> = isolates(&self.graph)
            .into_iter()
            .filter_map(|idx| self.graph.node_weight(idx).copied())
            .collect();
        ids.sort();
        ids
    }

    /// Number of connected components (narrative threads)
    pub fn component_count(&self) -> usize {
        use rustworkx_core::connectivity::number_connected_components;

        if self.graph.node_count() == 0 {
            return 0;
        }
        number_connected_components(&self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CharacterPair, EvidenceRef};

    fn rel(a: u32, b: u32, relation_type: RelationType) -> Relationship {
        Relationship {
            pair: CharacterPair::new(CharacterId(a), CharacterId(b)),
            relation_type,
            strength: 0.5,
            evidence_count: 1,
            first_evidence_ref: EvidenceRef {
                chapter_id: "c1".to_string(),
                line_ref: 1,
            },
        }
    }

    #[test]
    fn test_graph_queries() {
        let ids = (1..=5).map(CharacterId);
        let rels = vec![
            rel(1, 2, RelationType::Family),
            rel(1, 2, RelationType::CoOccurrence),
            rel(1, 3, RelationType::Social),
            rel(4, 9, RelationType::Romantic),
        ];
        let graph = CharacterGraph::build(ids, &rels);

        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.neighbors(CharacterId(1)), vec![CharacterId(2), CharacterId(3)]);
        assert_eq!(graph.degree(CharacterId(1)), 3);
        assert_eq!(graph.degree(CharacterId(9)), 0);
        assert_eq!(graph.most_connected(), Some((CharacterId(1), 3)));
        assert_eq!(graph.isolated(), vec![CharacterId(4), CharacterId(5)]);
        // {1,2,3}, {4}, {5}
        assert_eq!(graph.component_count(), 3);
    }

    #[test]
    fn test_empty_graph() {
        let graph = CharacterGraph::build(std::iter::empty(), &[]);
        assert_eq!(graph.most_connected(), None);
        assert!(graph.isolated().is_empty());
        assert_eq!(graph.component_count(), 0);
    }
}
