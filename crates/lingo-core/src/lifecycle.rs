//! Lifecycle transitions of schemes: identifier and URI planning.
//!
//! The database synchronizer gathers current state, calls into this module to
//! decide what to write, and applies the result in one transaction. Keeping
//! the decisions here makes "a second run writes nothing" checkable without
//! a database.

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::defaults::{CONCEPT_IDENTIFIER_PLACEHOLDER, SCHEME_IDENTIFIER_PLACEHOLDER};
use crate::models::LifecycleState;

/// A scheme moving between lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTransition {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

impl LifecycleTransition {
    pub fn new(from: LifecycleState, to: LifecycleState) -> Self {
        Self { from, to }
    }

    /// Draft or Editing → Active; the only transition that assigns
    /// identifiers and URIs.
    pub fn promotes_to_active(&self) -> bool {
        matches!(self.from, LifecycleState::Draft | LifecycleState::Editing)
            && self.to == LifecycleState::Active
    }
}

/// Fill a URI template. Plain string replacement, no escaping.
pub fn render_uri(template: &str, scheme_identifier: &str, concept_identifier: &str) -> String {
    template
        .replace(SCHEME_IDENTIFIER_PLACEHOLDER, scheme_identifier)
        .replace(CONCEPT_IDENTIFIER_PLACEHOLDER, concept_identifier)
}

/// Scheme URI, if the template has a scheme placeholder at all.
///
/// Only `<scheme_identifier>` is substituted.
pub fn render_scheme_uri(template: &str, scheme_identifier: &str) -> Option<String> {
    template
        .contains(SCHEME_IDENTIFIER_PLACEHOLDER)
        .then(|| template.replace(SCHEME_IDENTIFIER_PLACEHOLDER, scheme_identifier))
}

/// Value of a `url` node.
pub fn url_value(uri: &str) -> JsonValue {
    json!({ "url": uri, "url_label": null })
}

/// URL stored in a `url` node value.
pub fn url_of(value: &JsonValue) -> Option<&str> {
    value.get("url").and_then(|u| u.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierAssignment {
    pub concept_id: Uuid,
    pub number: i64,
    pub identifier: String,
}

/// Number draft concepts consecutively from `start`, in id order.
pub fn plan_identifier_assignments(drafts: &[Uuid], start: i64) -> Vec<IdentifierAssignment> {
    let mut ordered = drafts.to_vec();
    ordered.sort();
    ordered.dedup();
    ordered
        .into_iter()
        .zip(start..)
        .map(|(concept_id, number)| IdentifierAssignment {
            concept_id,
            number,
            identifier: number.to_string(),
        })
        .collect()
}

/// What the synchronizer knows about one non-retired concept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptUriState {
    pub concept_id: Uuid,
    pub identifier: Option<String>,
    /// Existing `uri` tile and the URL it holds.
    pub uri_tile: Option<(Uuid, Option<String>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriAction {
    Create { concept_id: Uuid, uri: String },
    Update { concept_id: Uuid, tile_id: Uuid, uri: String },
}

/// URI tile writes needed to bring concepts in line with the template.
///
/// Concepts without an identifier and concepts whose URI already matches are
/// skipped, so applying the plan and planning again yields nothing.
pub fn plan_uri_updates(
    template: &str,
    scheme_identifier: &str,
    concepts: &[ConceptUriState],
) -> Vec<UriAction> {
    concepts
        .iter()
        .filter_map(|concept| {
            let identifier = concept.identifier.as_deref().filter(|i| !i.is_empty())?;
            let uri = render_uri(template, scheme_identifier, identifier);
            match &concept.uri_tile {
                None => Some(UriAction::Create {
                    concept_id: concept.concept_id,
                    uri,
                }),
                Some((_, Some(existing))) if *existing == uri => None,
                Some((tile_id, _)) => Some(UriAction::Update {
                    concept_id: concept.concept_id,
                    tile_id: *tile_id,
                    uri,
                }),
            }
        })
        .collect()
}
