//! Structured logging schema and field name constants for lingo.
//!
//! All crates use these constants for consistent structured logging fields,
//! so a load can be followed end to end by `load_id`.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Load or export failed, state recorded as failed |
//! | WARN  | Recoverable issue, e.g. rows failing validation |
//! | INFO  | Load/export/lifecycle completions with counts |
//! | DEBUG | Decision points, dropped values, policy choices |
//! | TRACE | Per-tile and per-triple iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "core", "database", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "mapper", "hierarchy", "staging", "allocator", "lifecycle"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "stage", "promote", "allocate", "export"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Load event UUID shared by every staging row of a batch.
pub const LOAD_ID: &str = "load_id";

/// Scheme resource instance UUID.
pub const SCHEME_ID: &str = "scheme_id";

/// Concept resource instance UUID.
pub const CONCEPT_ID: &str = "concept_id";

/// Nodegroup alias being processed.
pub const NODEGROUP: &str = "nodegroup";

/// Node alias being processed.
pub const NODE_ALIAS: &str = "node_alias";

/// Legacy valuetype (prefLabel, scopeNote, ...).
pub const VALUETYPE: &str = "valuetype";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of resources in a batch.
pub const RESOURCE_COUNT: &str = "resource_count";

/// Number of staging rows written.
pub const ROW_COUNT: &str = "row_count";

/// Number of staging rows failing validation.
pub const FAILED_COUNT: &str = "failed_count";

/// Number of triples emitted or parsed.
pub const TRIPLE_COUNT: &str = "triple_count";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";
