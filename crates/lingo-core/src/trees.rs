//! Scheme → top concept → narrower concept trees for browsing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::MAX_HIERARCHY_DEPTH;
use crate::error::{Error, Result};
use crate::hierarchy::HierarchyEdge;
use crate::search::LabelRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptTreeNode {
    pub id: Uuid,
    pub labels: Vec<LabelRecord>,
    pub narrower: Vec<ConceptTreeNode>,
}

impl ConceptTreeNode {
    /// Number of concepts in this subtree, itself included.
    pub fn size(&self) -> usize {
        1 + self.narrower.iter().map(ConceptTreeNode::size).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeTree {
    pub id: Uuid,
    pub labels: Vec<LabelRecord>,
    pub top_concepts: Vec<ConceptTreeNode>,
}

struct TreeBuilder {
    labels: HashMap<Uuid, Vec<LabelRecord>>,
    children: HashMap<Uuid, Vec<Uuid>>,
    sort_keys: HashMap<Uuid, String>,
}

impl TreeBuilder {
    fn sort(&self, ids: &mut Vec<Uuid>) {
        ids.sort_by(|a, b| {
            let ka = self.sort_keys.get(a).map(String::as_str).unwrap_or("");
            let kb = self.sort_keys.get(b).map(String::as_str).unwrap_or("");
            ka.cmp(kb).then(a.cmp(b))
        });
        ids.dedup();
    }

    fn node(&self, id: Uuid, path: &mut Vec<Uuid>) -> Result<ConceptTreeNode> {
        if path.contains(&id) || path.len() > MAX_HIERARCHY_DEPTH {
            let trail = path
                .iter()
                .chain(std::iter::once(&id))
                .map(Uuid::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(Error::HierarchyCycle {
                concept: id,
                path: trail,
            });
        }
        path.push(id);
        let mut child_ids = self.children.get(&id).cloned().unwrap_or_default();
        self.sort(&mut child_ids);
        let narrower = child_ids
            .into_iter()
            .map(|child| self.node(child, path))
            .collect::<Result<Vec<_>>>()?;
        path.pop();
        Ok(ConceptTreeNode {
            id,
            labels: self.labels.get(&id).cloned().unwrap_or_default(),
            narrower,
        })
    }
}

/// Build one tree per scheme.
///
/// `top_edges` run scheme → top concept, `broader_edges` broader → narrower.
/// Siblings are ordered by their first preferred label, ignoring case.
pub fn build_concept_trees(
    schemes: &[Uuid],
    labels: &[LabelRecord],
    top_edges: &[HierarchyEdge],
    broader_edges: &[HierarchyEdge],
) -> Result<Vec<SchemeTree>> {
    let mut by_concept: HashMap<Uuid, Vec<LabelRecord>> = HashMap::new();
    let mut sort_keys: HashMap<Uuid, String> = HashMap::new();
    for label in labels {
        by_concept
            .entry(label.concept_id)
            .or_default()
            .push(label.clone());
        if label.valuetype == "prefLabel" {
            sort_keys
                .entry(label.concept_id)
                .or_insert_with(|| label.value.to_lowercase());
        }
    }

    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for edge in broader_edges {
        children.entry(edge.source).or_default().push(edge.target);
    }
    let builder = TreeBuilder {
        labels: by_concept,
        children,
        sort_keys,
    };

    schemes
        .iter()
        .map(|&scheme| {
            let mut tops: Vec<Uuid> = top_edges
                .iter()
                .filter(|e| e.source == scheme)
                .map(|e| e.target)
                .collect();
            builder.sort(&mut tops);
            let mut path = vec![scheme];
            let top_concepts = tops
                .into_iter()
                .map(|top| builder.node(top, &mut path))
                .collect::<Result<Vec<_>>>()?;
            Ok(SchemeTree {
                id: scheme,
                labels: builder.labels.get(&scheme).cloned().unwrap_or_default(),
                top_concepts,
            })
        })
        .collect()
}
