//! Centralized default constants for lingo.
//!
//! Graph and node identifiers for the two resource models live in
//! [`crate::graph_model`]; everything else shared across crates is here.

// =============================================================================
// EXPORT
// =============================================================================

/// Namespace prefixed to resource ids when minting subject IRIs on export.
pub const EXPORT_NAMESPACE: &str = "http://localhost:8000/";

/// Public address substituted into the default scheme URI template.
pub const PUBLIC_SERVER_ADDRESS: &str = "http://localhost:8000";

/// Directory export files are written to when no explicit path is given.
pub const EXPORT_DIR: &str = "exports";

/// Default RDF serialization format name.
pub const EXPORT_FORMAT: &str = "pretty-xml";

// =============================================================================
// URI TEMPLATES
// =============================================================================

/// Placeholder replaced with the scheme's identifier.
pub const SCHEME_IDENTIFIER_PLACEHOLDER: &str = "<scheme_identifier>";

/// Placeholder replaced with the concept's identifier.
pub const CONCEPT_IDENTIFIER_PLACEHOLDER: &str = "<concept_identifier>";

/// Path appended to the public server address for a new scheme template.
pub const URI_TEMPLATE_PATH: &str = "/schemes/<scheme_identifier>/concepts/<concept_identifier>";

/// Source recorded on resource identifiers minted by the lifecycle synchronizer.
pub const IDENTIFIER_SOURCE: &str = "arches-lingo";

/// First number handed out by a freshly created identifier counter.
pub const COUNTER_START_NUMBER: i64 = 1;

// =============================================================================
// LANGUAGES
// =============================================================================

/// Language code used for literals that carry no language tag.
pub const DEFAULT_LANGUAGE: &str = "en";

// =============================================================================
// HIERARCHY
// =============================================================================

/// Depth guard for hierarchy walks; deeper paths are treated as cycles.
pub const MAX_HIERARCHY_DEPTH: usize = 256;

// =============================================================================
// SEARCH
// =============================================================================

/// Longest accepted fuzzy search term, in characters.
pub const FUZZY_TERM_MAX_LENGTH: usize = 255;

/// Base edit-distance sensitivity for fuzzy search.
pub const SEARCH_TERM_SENSITIVITY: usize = 3;

/// Default page size for concept search results.
pub const SEARCH_PAGE_SIZE: usize = 25;
