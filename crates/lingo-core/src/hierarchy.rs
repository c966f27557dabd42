//! Scheme/concept hierarchy recovery from parent → child edges.
//!
//! Edges are loaded once into an adjacency list and walked with an explicit
//! worklist. Every distinct path is reported, so a concept with two parents
//! yields two entries. A child that already appears on its own path is a
//! cycle and aborts the walk.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::{debug, trace};
use uuid::Uuid;

use crate::defaults::MAX_HIERARCHY_DEPTH;
use crate::error::{Error, Result};
use crate::models::LegacyRelation;

/// Directed parent → child edge (scheme → top concept, broader → narrower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HierarchyEdge {
    pub source: Uuid,
    pub target: Uuid,
}

impl HierarchyEdge {
    pub fn new(source: Uuid, target: Uuid) -> Self {
        Self { source, target }
    }
}

/// One path from a root to a concept.
///
/// `path` lists the ancestors from the root down to the concept's parent;
/// `depth == path.len()`, so top concepts have depth 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyEntry {
    pub root: Uuid,
    pub concept: Uuid,
    pub path: Vec<Uuid>,
    pub depth: usize,
}

impl HierarchyEntry {
    pub fn parent(&self) -> Option<Uuid> {
        self.path.last().copied()
    }
}

/// All paths below one root.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    pub entries: Vec<HierarchyEntry>,
    /// Every concept reached, in first-seen order, without duplicates.
    pub concepts: Vec<Uuid>,
}

impl Hierarchy {
    fn from_entries(entries: Vec<HierarchyEntry>) -> Self {
        let mut seen = HashSet::new();
        let concepts = entries
            .iter()
            .filter(|e| seen.insert(e.concept))
            .map(|e| e.concept)
            .collect();
        Self { entries, concepts }
    }

    pub fn contains(&self, concept: Uuid) -> bool {
        self.concepts.contains(&concept)
    }

    /// Concepts whose parent (on any path) is `ancestor`.
    pub fn direct_children(&self, ancestor: Uuid) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| e.parent() == Some(ancestor))
            .filter(|e| seen.insert(e.concept))
            .map(|e| e.concept)
            .collect()
    }

    /// Split the descendants of `ancestor` into direct and indirect ones.
    ///
    /// A concept with `ancestor` as its parent on any path is direct, even
    /// if it is also reachable through a deeper path.
    pub fn descendants(&self, ancestor: Uuid) -> (Vec<Uuid>, Vec<Uuid>) {
        let direct = self.direct_children(ancestor);
        let direct_set: HashSet<Uuid> = direct.iter().copied().collect();
        let mut seen = HashSet::new();
        let indirect = self
            .entries
            .iter()
            .filter(|e| e.path.contains(&ancestor) && e.parent() != Some(ancestor))
            .map(|e| e.concept)
            .filter(|c| !direct_set.contains(c) && *c != ancestor)
            .filter(|c| seen.insert(*c))
            .collect();
        (direct, indirect)
    }

    /// Every path (root first, concept last) that reaches `concept`.
    pub fn paths_to(&self, concept: Uuid) -> Vec<Vec<Uuid>> {
        self.entries
            .iter()
            .filter(|e| e.concept == concept)
            .map(|e| {
                let mut p = e.path.clone();
                p.push(concept);
                p
            })
            .collect()
    }
}

/// Walks hierarchy edges from chosen roots.
#[derive(Debug, Clone)]
pub struct HierarchyExtractor {
    children: HashMap<Uuid, Vec<Uuid>>,
    has_parent: HashSet<Uuid>,
    sources: Vec<Uuid>,
    max_depth: usize,
}

impl HierarchyExtractor {
    pub fn new(edges: impl IntoIterator<Item = HierarchyEdge>) -> Self {
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut has_parent = HashSet::new();
        let mut sources = Vec::new();
        let mut seen_edges = HashSet::new();
        for edge in edges {
            if !seen_edges.insert(edge) {
                continue;
            }
            let targets = children.entry(edge.source).or_default();
            if targets.is_empty() {
                sources.push(edge.source);
            }
            targets.push(edge.target);
            has_parent.insert(edge.target);
        }
        Self {
            children,
            has_parent,
            sources,
            max_depth: MAX_HIERARCHY_DEPTH,
        }
    }

    /// Build from legacy relation rows, keeping only narrower/hasTopConcept.
    pub fn from_legacy(relations: &[LegacyRelation]) -> Self {
        Self::new(
            relations
                .iter()
                .filter(|r| r.relation_type.is_hierarchical())
                .map(|r| HierarchyEdge::new(r.from, r.to)),
        )
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sources with no incoming edge, in first-seen order.
    pub fn roots(&self) -> Vec<Uuid> {
        self.sources
            .iter()
            .copied()
            .filter(|s| !self.has_parent.contains(s))
            .collect()
    }

    pub fn children_of(&self, node: Uuid) -> &[Uuid] {
        self.children.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every `(root, concept, path, depth)` reachable from `root`.
    pub fn extract(&self, root: Uuid) -> Result<Hierarchy> {
        let mut entries = Vec::new();
        let mut queue: VecDeque<HierarchyEntry> = self
            .children_of(root)
            .iter()
            .map(|&child| HierarchyEntry {
                root,
                concept: child,
                path: vec![root],
                depth: 1,
            })
            .collect();

        while let Some(entry) = queue.pop_front() {
            if entry.concept == root || entry.path[1..].contains(&entry.concept) {
                return Err(cycle(&entry));
            }
            if entry.depth > self.max_depth {
                return Err(cycle(&entry));
            }
            trace!(
                subsystem = "core",
                component = "hierarchy",
                concept_id = %entry.concept,
                depth = entry.depth,
                "Visiting concept"
            );
            for &child in self.children_of(entry.concept) {
                let mut path = entry.path.clone();
                path.push(entry.concept);
                queue.push_back(HierarchyEntry {
                    root,
                    concept: child,
                    depth: path.len(),
                    path,
                });
            }
            entries.push(entry);
        }

        let hierarchy = Hierarchy::from_entries(entries);
        debug!(
            subsystem = "core",
            component = "hierarchy",
            op = "extract",
            scheme_id = %root,
            path_count = hierarchy.entries.len(),
            concept_count = hierarchy.concepts.len(),
            "Hierarchy extracted"
        );
        Ok(hierarchy)
    }

    /// Assign each of `concepts` to the single scheme (among `schemes`) it
    /// is reachable from.
    ///
    /// Concepts not reachable from any scheme are left out. A concept
    /// reachable from two schemes is an error.
    pub fn assign_schemes(
        &self,
        schemes: &[Uuid],
        concepts: &[Uuid],
    ) -> Result<BTreeMap<Uuid, Uuid>> {
        let wanted: HashSet<Uuid> = concepts.iter().copied().collect();
        let mut assignment: BTreeMap<Uuid, Uuid> = BTreeMap::new();
        for &scheme in schemes {
            let hierarchy = self.extract(scheme)?;
            for concept in hierarchy.concepts {
                if !wanted.contains(&concept) {
                    continue;
                }
                match assignment.get(&concept) {
                    Some(&existing) if existing != scheme => {
                        return Err(Error::SchemeConflict {
                            concept,
                            existing,
                            current: scheme,
                        });
                    }
                    Some(_) => {}
                    None => {
                        assignment.insert(concept, scheme);
                    }
                }
            }
        }
        Ok(assignment)
    }
}

fn cycle(entry: &HierarchyEntry) -> Error {
    let path = entry
        .path
        .iter()
        .chain(std::iter::once(&entry.concept))
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(" -> ");
    Error::HierarchyCycle {
        concept: entry.concept,
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LegacyRelationType;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|i| Uuid::from_u128(i as u128 + 1)).collect()
    }

    #[test]
    fn test_single_path_depths() {
        let [s, a, b] = ids(3)[..] else { unreachable!() };
        let ex = HierarchyExtractor::new([HierarchyEdge::new(s, a), HierarchyEdge::new(a, b)]);
        let h = ex.extract(s).unwrap();
        assert_eq!(h.concepts, vec![a, b]);
        assert_eq!(h.entries[0].depth, 1);
        assert_eq!(h.entries[1].path, vec![s, a]);
        assert_eq!(h.entries[1].depth, 2);
    }

    #[test]
    fn test_poly_hierarchy_reports_every_path() {
        // s -> a -> c, s -> b -> c
        let [s, a, b, c] = ids(4)[..] else { unreachable!() };
        let ex = HierarchyExtractor::new([
            HierarchyEdge::new(s, a),
            HierarchyEdge::new(s, b),
            HierarchyEdge::new(a, c),
            HierarchyEdge::new(b, c),
        ]);
        let h = ex.extract(s).unwrap();
        let c_entries: Vec<_> = h.entries.iter().filter(|e| e.concept == c).collect();
        assert_eq!(c_entries.len(), 2);
        assert_eq!(h.concepts.len(), 3);
        assert_eq!(h.paths_to(c), vec![vec![s, a, c], vec![s, b, c]]);
    }

    #[test]
    fn test_cycle_is_fatal() {
        let [s, a, b] = ids(3)[..] else { unreachable!() };
        let ex = HierarchyExtractor::new([
            HierarchyEdge::new(s, a),
            HierarchyEdge::new(a, b),
            HierarchyEdge::new(b, a),
        ]);
        let err = ex.extract(s).unwrap_err();
        assert!(matches!(err, Error::HierarchyCycle { concept, .. } if concept == a));
    }

    #[test]
    fn test_depth_guard() {
        let chain = ids(6);
        let edges = chain.windows(2).map(|w| HierarchyEdge::new(w[0], w[1]));
        let ex = HierarchyExtractor::new(edges).with_max_depth(3);
        assert!(matches!(
            ex.extract(chain[0]),
            Err(Error::HierarchyCycle { .. })
        ));
    }

    #[test]
    fn test_roots_exclude_targets() {
        let [s, a, b, t] = ids(4)[..] else { unreachable!() };
        let ex = HierarchyExtractor::new([
            HierarchyEdge::new(s, a),
            HierarchyEdge::new(a, b),
            HierarchyEdge::new(t, b),
        ]);
        assert_eq!(ex.roots(), vec![s, t]);
    }

    #[test]
    fn test_from_legacy_ignores_related() {
        let [s, a, b] = ids(3)[..] else { unreachable!() };
        let relations = [
            LegacyRelation { from: s, to: a, relation_type: LegacyRelationType::HasTopConcept },
            LegacyRelation { from: a, to: b, relation_type: LegacyRelationType::Related },
        ];
        let h = HierarchyExtractor::from_legacy(&relations).extract(s).unwrap();
        assert_eq!(h.concepts, vec![a]);
    }

    #[test]
    fn test_assign_schemes_conflict() {
        let [s1, s2, a, b] = ids(4)[..] else { unreachable!() };
        let ex = HierarchyExtractor::new([
            HierarchyEdge::new(s1, a),
            HierarchyEdge::new(s2, b),
            HierarchyEdge::new(b, a),
        ]);
        let err = ex.assign_schemes(&[s1, s2], &[a, b]).unwrap_err();
        match err {
            Error::SchemeConflict { concept, existing, current } => {
                assert_eq!(concept, a);
                assert_eq!(existing, s1);
                assert_eq!(current, s2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_assign_schemes_poly_hierarchy_same_scheme_ok() {
        let [s, a, b, c] = ids(4)[..] else { unreachable!() };
        let ex = HierarchyExtractor::new([
            HierarchyEdge::new(s, a),
            HierarchyEdge::new(s, b),
            HierarchyEdge::new(a, c),
            HierarchyEdge::new(b, c),
        ]);
        let assignment = ex.assign_schemes(&[s], &[a, b, c]).unwrap();
        assert_eq!(assignment.len(), 3);
        assert!(assignment.values().all(|&scheme| scheme == s));
    }

    #[test]
    fn test_descendants_direct_and_indirect() {
        // s -> x -> a -> b ; x -> b
        let [s, x, a, b] = ids(4)[..] else { unreachable!() };
        let ex = HierarchyExtractor::new([
            HierarchyEdge::new(s, x),
            HierarchyEdge::new(x, a),
            HierarchyEdge::new(a, b),
            HierarchyEdge::new(x, b),
        ]);
        let h = ex.extract(s).unwrap();
        let (direct, indirect) = h.descendants(x);
        assert_eq!(direct, vec![a, b]);
        assert!(indirect.is_empty());

        let (direct, indirect) = h.descendants(s);
        assert_eq!(direct, vec![x]);
        assert_eq!(indirect, vec![a, b]);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let [s, a] = ids(2)[..] else { unreachable!() };
        let ex = HierarchyExtractor::new([HierarchyEdge::new(s, a), HierarchyEdge::new(s, a)]);
        assert_eq!(ex.extract(s).unwrap().entries.len(), 1);
    }
}
