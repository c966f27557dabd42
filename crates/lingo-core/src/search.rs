//! Fuzzy label search and result ranking.
//!
//! A label matches a term when its Levenshtein distance to the term is
//! within the allowed edit distance (case-sensitive, as the database
//! function behaves) or when it contains the term ignoring case. Hits are
//! ordered by how the text matched, then by distance.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::FUZZY_TERM_MAX_LENGTH;
use crate::error::{Error, Result};

/// One label of a concept, as read for searching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub concept_id: Uuid,
    pub value: String,
    /// Language name as stored on the label.
    pub language: Option<String>,
    /// `prefLabel`, `altLabel`, `hiddenLabel`, ...
    pub valuetype: String,
}

impl LabelRecord {
    pub fn new(concept_id: Uuid, value: impl Into<String>, valuetype: impl Into<String>) -> Self {
        Self {
            concept_id,
            value: value.into(),
            language: None,
            valuetype: valuetype.into(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

// =============================================================================
// EDIT DISTANCE
// =============================================================================

/// Levenshtein distance between `source` and `target` if it is at most
/// `max`, counted in chars. Stops early once every cell of a row exceeds
/// `max`.
pub fn levenshtein_with_max(source: &str, target: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = source.chars().collect();
    let b: Vec<char> = target.chars().collect();

    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    if a.is_empty() || b.is_empty() {
        let d = a.len().max(b.len());
        return (d <= max).then_some(d);
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let d = prev[b.len()];
    (d <= max).then_some(d)
}

/// Default allowed edit distance for a term.
///
/// The base distance is `5 - sensitivity` clamped to `0..=5`; short terms
/// allow less: none up to 3 chars, at most 1 up to 5, at most 2 beyond.
pub fn resolve_max_edit_distance(term: &str, sensitivity: usize) -> usize {
    let base = 5usize.saturating_sub(sensitivity);
    let len = term.chars().count();
    match len {
        0 => base,
        1..=3 => 0,
        4..=5 => base.min(1),
        _ => base.min(2),
    }
}

/// Parse a user-supplied edit distance.
pub fn parse_edit_distance(raw: &str) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        Error::InvalidInput("Edit distance could not be converted to an integer.".to_string())
    })
}

// =============================================================================
// MATCHING
// =============================================================================

/// How a label's text relates to the term, ignoring case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TextMatch {
    Exact = 0,
    Prefix = 1,
    Substring = 2,
    NoMatch = 3,
}

impl TextMatch {
    pub fn of(label: &str, term: &str) -> Self {
        let label = label.to_lowercase();
        let term = term.to_lowercase();
        if term.is_empty() {
            TextMatch::NoMatch
        } else if label == term {
            TextMatch::Exact
        } else if label.starts_with(&term) {
            TextMatch::Prefix
        } else if label.contains(&term) {
            TextMatch::Substring
        } else {
            TextMatch::NoMatch
        }
    }
}

/// Rank of a label by valuetype and text match, lower is better. Columns
/// are exact, prefix, substring, none.
pub const MATCH_RANK_TABLE: &[(&str, [u8; 4])] = &[
    ("prefLabel", [0, 2, 3, 6]),
    ("altLabel", [1, 4, 5, 6]),
];
const OTHER_MATCH_RANKS: [u8; 4] = [4, 5, 6, 7];

pub fn match_rank(valuetype: &str, text: TextMatch) -> u8 {
    let ranks = MATCH_RANK_TABLE
        .iter()
        .find(|(vt, _)| *vt == valuetype)
        .map(|(_, ranks)| ranks)
        .unwrap_or(&OTHER_MATCH_RANKS);
    ranks[text as usize]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub concept_id: Uuid,
    pub label: String,
    pub valuetype: String,
    pub text_match: TextMatch,
    /// `None` when the label only matched by containment.
    pub edit_distance: Option<usize>,
}

/// Labels matching `term` within `max_edit_distance`, best first.
pub fn fuzzy_search(
    labels: &[LabelRecord],
    term: &str,
    max_edit_distance: i64,
) -> Result<Vec<SearchHit>> {
    if term.chars().count() > FUZZY_TERM_MAX_LENGTH {
        return Err(Error::InvalidInput(
            "Fuzzy search terms cannot exceed 255 characters.".to_string(),
        ));
    }
    let term_lower = term.to_lowercase();

    let mut hits: Vec<SearchHit> = labels
        .iter()
        .filter_map(|label| {
            let edit_distance = usize::try_from(max_edit_distance)
                .ok()
                .and_then(|max| levenshtein_with_max(&label.value, term, max));
            let contains = label.value.to_lowercase().contains(&term_lower);
            (edit_distance.is_some() || contains).then(|| SearchHit {
                concept_id: label.concept_id,
                label: label.value.clone(),
                valuetype: label.valuetype.clone(),
                text_match: TextMatch::of(&label.value, term),
                edit_distance,
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        a.text_match
            .cmp(&b.text_match)
            .then_with(|| {
                a.edit_distance
                    .unwrap_or(usize::MAX)
                    .cmp(&b.edit_distance.unwrap_or(usize::MAX))
            })
            .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
    });
    Ok(hits)
}

// =============================================================================
// ORDERING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderMode {
    #[default]
    Unsorted,
    Alphabetical,
    ReverseAlphabetical,
}

impl FromStr for OrderMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "unsorted" => Ok(OrderMode::Unsorted),
            "alphabetical" => Ok(OrderMode::Alphabetical),
            "reverse-alphabetical" => Ok(OrderMode::ReverseAlphabetical),
            _ => Err(format!("Invalid order mode: {}", s)),
        }
    }
}

fn sort_labels(labels: &[LabelRecord]) -> HashMap<Uuid, String> {
    let mut sort_label: HashMap<Uuid, String> = HashMap::new();
    for label in labels {
        let lower = label.value.to_lowercase();
        sort_label
            .entry(label.concept_id)
            .and_modify(|current| {
                if lower < *current {
                    *current = lower.clone();
                }
            })
            .or_insert(lower);
    }
    sort_label
}

/// Concept ids of `hits` without duplicates, in hit order or by each
/// concept's alphabetically first label.
pub fn ranked_concept_ids(hits: &[SearchHit], labels: &[LabelRecord], order: OrderMode) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    let mut ids: Vec<Uuid> = hits
        .iter()
        .map(|h| h.concept_id)
        .filter(|id| seen.insert(*id))
        .collect();
    if order == OrderMode::Unsorted {
        return ids;
    }

    let sort_label = sort_labels(labels);
    let empty = String::new();
    ids.sort_by(|a, b| {
        let la = sort_label.get(a).unwrap_or(&empty);
        let lb = sort_label.get(b).unwrap_or(&empty);
        match order {
            OrderMode::ReverseAlphabetical => lb.cmp(la),
            _ => la.cmp(lb),
        }
    });
    ids
}

/// Best score of a concept's labels for a term; lower is better.
///
/// Compares match rank, then language (active, then system, then any), then
/// the label text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConceptScore {
    pub match_rank: u8,
    pub language_rank: u8,
    pub label: String,
}

impl ConceptScore {
    fn worst() -> Self {
        Self {
            match_rank: 7,
            language_rank: 2,
            label: "\u{ffff}".to_string(),
        }
    }
}

pub fn score_concept(
    labels: &[LabelRecord],
    term: &str,
    active_language: &str,
    system_language: &str,
) -> ConceptScore {
    labels
        .iter()
        .map(|label| {
            let language_rank = match label.language.as_deref() {
                Some(l) if l == active_language => 0,
                Some(l) if l == system_language => 1,
                _ => 2,
            };
            ConceptScore {
                match_rank: match_rank(&label.valuetype, TextMatch::of(&label.value, term)),
                language_rank,
                label: label.value.to_lowercase(),
            }
        })
        .min()
        .unwrap_or_else(ConceptScore::worst)
}

/// Order concept ids by their best label score, keeping the incoming order
/// for ties.
pub fn rank_concepts_for_term(
    concept_ids: &[Uuid],
    labels: &[LabelRecord],
    term: &str,
    active_language: &str,
    system_language: &str,
) -> Vec<Uuid> {
    let mut by_concept: HashMap<Uuid, Vec<LabelRecord>> = HashMap::new();
    for label in labels {
        by_concept
            .entry(label.concept_id)
            .or_default()
            .push(label.clone());
    }
    let mut scored: Vec<(ConceptScore, usize, Uuid)> = concept_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let score = by_concept
                .get(id)
                .map(|l| score_concept(l, term, active_language, system_language))
                .unwrap_or_else(ConceptScore::worst);
            (score, i, *id)
        })
        .collect();
    scored.sort_by(|a, b| match a.0.cmp(&b.0) {
        Ordering::Equal => a.1.cmp(&b.1),
        other => other,
    });
    scored.into_iter().map(|(_, _, id)| id).collect()
}

// =============================================================================
// PAGING
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }
}

/// 1-based page of `items`. Page 0 is treated as page 1.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let start = (page - 1).saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    Page {
        items: items[start..end].to_vec(),
        page,
        page_size,
        total: items.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_with_max() {
        assert_eq!(levenshtein_with_max("kitten", "sitting", 3), Some(3));
        assert_eq!(levenshtein_with_max("kitten", "sitting", 2), None);
        assert_eq!(levenshtein_with_max("", "abc", 3), Some(3));
        assert_eq!(levenshtein_with_max("abc", "", 2), None);
        assert_eq!(levenshtein_with_max("Concept 1", "Concept 1", 0), Some(0));
        assert_eq!(levenshtein_with_max("Concept 1", "Concept 2", 0), None);
        assert_eq!(levenshtein_with_max("Concept 1", "concept 1", 0), None);
        assert_eq!(levenshtein_with_max("café", "cafe", 1), Some(1));
    }

    #[test]
    fn test_resolve_max_edit_distance() {
        assert_eq!(resolve_max_edit_distance("", 3), 2);
        assert_eq!(resolve_max_edit_distance("", 0), 5);
        assert_eq!(resolve_max_edit_distance("", 9), 0);
        assert_eq!(resolve_max_edit_distance("Con", 3), 0);
        assert_eq!(resolve_max_edit_distance("Conce", 3), 1);
        assert_eq!(resolve_max_edit_distance("Concept 1", 3), 2);
        assert_eq!(resolve_max_edit_distance("Concept 1", 4), 1);
    }

    #[test]
    fn test_parse_edit_distance() {
        assert_eq!(parse_edit_distance(" 2 ").unwrap(), 2);
        let err = parse_edit_distance("two").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input: Edit distance could not be converted to an integer."
        );
    }

    fn concept_labels() -> Vec<LabelRecord> {
        (1..=5)
            .map(|n| LabelRecord::new(Uuid::from_u128(n), format!("Concept {n}"), "prefLabel"))
            .collect()
    }

    #[test]
    fn test_fuzzy_search_exact_distance() {
        let labels = concept_labels();
        let hits = fuzzy_search(&labels, "Concept 1", 0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].concept_id, Uuid::from_u128(1));
        assert_eq!(hits[0].text_match, TextMatch::Exact);
    }

    #[test]
    fn test_fuzzy_search_with_distance() {
        let labels = concept_labels();
        let hits = fuzzy_search(&labels, "Concept 1", 2).unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].label, "Concept 1");
        let hits = fuzzy_search(&labels, "con", 0).unwrap();
        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|h| h.text_match == TextMatch::Prefix));
    }

    #[test]
    fn test_fuzzy_search_term_too_long() {
        let term = "x".repeat(256);
        let err = fuzzy_search(&concept_labels(), &term, 1).unwrap_err();
        assert!(err
            .to_string()
            .contains("Fuzzy search terms cannot exceed 255 characters."));
    }

    #[test]
    fn test_match_rank_table() {
        assert_eq!(match_rank("prefLabel", TextMatch::Exact), 0);
        assert_eq!(match_rank("altLabel", TextMatch::Exact), 1);
        assert_eq!(match_rank("prefLabel", TextMatch::Prefix), 2);
        assert_eq!(match_rank("hiddenLabel", TextMatch::NoMatch), 7);
    }

    #[test]
    fn test_rank_concepts_prefers_pref_label_and_language() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);
        let labels = vec![
            LabelRecord::new(a, "Oak", "altLabel").with_language("English"),
            LabelRecord::new(b, "Oak", "prefLabel").with_language("German"),
            LabelRecord::new(c, "Oak", "prefLabel").with_language("English"),
        ];
        let ranked = rank_concepts_for_term(&[a, b, c], &labels, "oak", "English", "German");
        assert_eq!(ranked, vec![c, b, a]);
    }

    #[test]
    fn test_ranked_concept_ids_alphabetical() {
        let labels = vec![
            LabelRecord::new(Uuid::from_u128(1), "beech", "prefLabel"),
            LabelRecord::new(Uuid::from_u128(2), "Ash", "prefLabel"),
            LabelRecord::new(Uuid::from_u128(2), "zelkova", "altLabel"),
        ];
        let hits = fuzzy_search(&labels, "e", 0).unwrap();
        let ids = ranked_concept_ids(&hits, &labels, OrderMode::Alphabetical);
        assert_eq!(ids, vec![Uuid::from_u128(2), Uuid::from_u128(1)]);
        let ids = ranked_concept_ids(&hits, &labels, OrderMode::ReverseAlphabetical);
        assert_eq!(ids, vec![Uuid::from_u128(1), Uuid::from_u128(2)]);
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (0..7).collect();
        let page = paginate(&items, 2, 3);
        assert_eq!(page.items, vec![3, 4, 5]);
        assert_eq!(page.total_pages(), 3);
        assert!(paginate(&items, 9, 3).items.is_empty());
        assert_eq!(paginate(&items, 0, 3).page, 1);
    }
}
