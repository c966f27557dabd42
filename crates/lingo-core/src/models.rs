//! Core data models for lingo.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// RESOURCE MODELS
// =============================================================================

/// The two resource models a thesaurus is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Scheme,
    Concept,
}

impl ResourceKind {
    /// Graph slug used by the resource model.
    pub fn slug(&self) -> &'static str {
        match self {
            ResourceKind::Scheme => "scheme",
            ResourceKind::Concept => "concept",
        }
    }

    /// SKOS class emitted for subjects of this kind.
    pub fn skos_class(&self) -> &'static str {
        match self {
            ResourceKind::Scheme => "ConceptScheme",
            ResourceKind::Concept => "Concept",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheme" => Ok(ResourceKind::Scheme),
            "concept" => Ok(ResourceKind::Concept),
            _ => Err(format!("Invalid resource kind: {}", s)),
        }
    }
}

/// Nodegroups the migration and export engines know how to handle.
///
/// Dispatch over nodegroups is an exhaustive `match` on this enum so a new
/// nodegroup cannot be added without deciding how it maps to triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodegroupKind {
    AppellativeStatus,
    Identifier,
    Statement,
    TopConceptOf,
    PartOfScheme,
    ClassificationStatus,
    RelationStatus,
    Uri,
}

impl NodegroupKind {
    pub const ALL: [NodegroupKind; 8] = [
        NodegroupKind::AppellativeStatus,
        NodegroupKind::Identifier,
        NodegroupKind::Statement,
        NodegroupKind::TopConceptOf,
        NodegroupKind::PartOfScheme,
        NodegroupKind::ClassificationStatus,
        NodegroupKind::RelationStatus,
        NodegroupKind::Uri,
    ];

    /// Nodegroup alias in the resource model.
    pub fn alias(&self) -> &'static str {
        match self {
            NodegroupKind::AppellativeStatus => "appellative_status",
            NodegroupKind::Identifier => "identifier",
            NodegroupKind::Statement => "statement",
            NodegroupKind::TopConceptOf => "top_concept_of",
            NodegroupKind::PartOfScheme => "part_of_scheme",
            NodegroupKind::ClassificationStatus => "classification_status",
            NodegroupKind::RelationStatus => "relation_status",
            NodegroupKind::Uri => "uri",
        }
    }
}

impl fmt::Display for NodegroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alias())
    }
}

impl FromStr for NodegroupKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodegroupKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.alias() == s)
            .ok_or_else(|| format!("Unknown nodegroup: {}", s))
    }
}

/// A committed resource instance (scheme or concept).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub id: Uuid,
    pub graph_id: Uuid,
    pub kind: ResourceKind,
    pub name: Option<String>,
    pub lifecycle_state: LifecycleState,
    pub legacy_id: Option<String>,
}

/// A committed tile: node id → value for one nodegroup of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub tile_id: Uuid,
    pub resource_id: Uuid,
    pub nodegroup_id: Uuid,
    pub parent_tile_id: Option<Uuid>,
    pub sortorder: i32,
    pub data: BTreeMap<Uuid, JsonValue>,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Lifecycle states shared by schemes and their concepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Draft,
    Editing,
    Active,
    Retired,
}

impl LifecycleState {
    /// Stable identifier of the state in the resource lifecycle definition.
    pub fn id(&self) -> Uuid {
        let raw = match self {
            LifecycleState::Draft => 0x0e7f8c6d_1f7b_4c2a_9a0c_2b9e0d6c8f11_u128,
            LifecycleState::Editing => 0xb3a6a0d2_2b5c_4c2f_9d6c_0c2a5b7d1e8f_u128,
            LifecycleState::Active => 0x6b0f1a7b_5b3d_4b2a_8a5b_7c3a1b0f2d9e_u128,
            LifecycleState::Retired => 0x9d2e1c0b_7a6b_4b3d_8c1a_0f2d9e6b0a7c_u128,
        };
        Uuid::from_u128(raw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Draft => "draft",
            LifecycleState::Editing => "editing",
            LifecycleState::Active => "active",
            LifecycleState::Retired => "retired",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(LifecycleState::Draft),
            "editing" => Ok(LifecycleState::Editing),
            "active" => Ok(LifecycleState::Active),
            "retired" => Ok(LifecycleState::Retired),
            _ => Err(format!("Invalid lifecycle state: {}", s)),
        }
    }
}

// =============================================================================
// LEGACY RDM
// =============================================================================

/// Node type of a legacy RDM concept row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegacyNodeType {
    ConceptScheme,
    Concept,
}

impl FromStr for LegacyNodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ConceptScheme" => Ok(LegacyNodeType::ConceptScheme),
            "Concept" => Ok(LegacyNodeType::Concept),
            _ => Err(format!("Invalid legacy node type: {}", s)),
        }
    }
}

/// Relation types in the legacy relation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegacyRelationType {
    Narrower,
    HasTopConcept,
    Related,
}

impl LegacyRelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyRelationType::Narrower => "narrower",
            LegacyRelationType::HasTopConcept => "hasTopConcept",
            LegacyRelationType::Related => "related",
        }
    }

    /// Whether edges of this type shape the scheme hierarchy.
    pub fn is_hierarchical(&self) -> bool {
        matches!(
            self,
            LegacyRelationType::Narrower | LegacyRelationType::HasTopConcept
        )
    }
}

impl FromStr for LegacyRelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "narrower" => Ok(LegacyRelationType::Narrower),
            "hasTopConcept" => Ok(LegacyRelationType::HasTopConcept),
            "related" => Ok(LegacyRelationType::Related),
            _ => Err(format!("Invalid legacy relation type: {}", s)),
        }
    }
}

/// One row of the legacy relation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegacyRelation {
    pub from: Uuid,
    pub to: Uuid,
    pub relation_type: LegacyRelationType,
}

/// A labelled value to be mapped into a tile.
///
/// Both legacy RDM value rows and RDF literals are reduced to this shape
/// before mapping; `language` is a language code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceValue {
    pub valuetype: String,
    pub value: String,
    pub language: Option<String>,
}

impl SourceValue {
    pub fn new(valuetype: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            valuetype: valuetype.into(),
            value: value.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

// =============================================================================
// MOCK TILES
// =============================================================================

/// In-memory tile keyed by node alias, produced by the mapper and consumed by
/// the staging engine. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockTile {
    pub nodegroup: NodegroupKind,
    pub fields: BTreeMap<String, JsonValue>,
}

impl MockTile {
    pub fn new(nodegroup: NodegroupKind) -> Self {
        Self {
            nodegroup,
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, alias: impl Into<String>, value: JsonValue) -> Self {
        self.fields.insert(alias.into(), value);
        self
    }

    pub fn get(&self, alias: &str) -> Option<&JsonValue> {
        self.fields.get(alias)
    }
}

/// One resource with its mock tiles, ready to stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceToLoad {
    pub resource_id: Uuid,
    pub legacy_id: Option<String>,
    pub kind: ResourceKind,
    pub tiles: Vec<MockTile>,
}

impl ResourceToLoad {
    pub fn new(resource_id: Uuid, kind: ResourceKind) -> Self {
        Self {
            resource_id,
            legacy_id: None,
            kind,
            tiles: Vec::new(),
        }
    }

    pub fn tiles_of(&self, nodegroup: NodegroupKind) -> impl Iterator<Item = &MockTile> {
        self.tiles.iter().filter(move |t| t.nodegroup == nodegroup)
    }

    pub fn has_tile(&self, nodegroup: NodegroupKind) -> bool {
        self.tiles_of(nodegroup).next().is_some()
    }
}

/// What to do with source data that has no mapping (unknown valuetype,
/// unknown node alias).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedPolicy {
    /// Drop the value and log it at debug level.
    #[default]
    Skip,
    /// Record a validation error so the load fails.
    Reject,
}

impl fmt::Display for UnmappedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmappedPolicy::Skip => write!(f, "skip"),
            UnmappedPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for UnmappedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(UnmappedPolicy::Skip),
            "reject" | "strict" => Ok(UnmappedPolicy::Reject),
            _ => Err(format!("Invalid unmapped policy: {}", s)),
        }
    }
}

// =============================================================================
// STAGING
// =============================================================================

/// Per-node staged value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileNodeValue {
    pub value: JsonValue,
    pub valid: bool,
    pub source: JsonValue,
    pub notes: String,
    pub datatype: String,
}

/// Staging row operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingOperation {
    Insert,
    Update,
    Delete,
}

impl StagingOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagingOperation::Insert => "insert",
            StagingOperation::Update => "update",
            StagingOperation::Delete => "delete",
        }
    }
}

/// One staged tile awaiting validation and promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingRow {
    pub load_id: Uuid,
    pub resource_id: Uuid,
    pub tile_id: Uuid,
    pub parent_tile_id: Option<Uuid>,
    pub nodegroup_id: Uuid,
    pub nodegroup_depth: i32,
    pub value: BTreeMap<Uuid, TileNodeValue>,
    pub sortorder: i32,
    pub operation: StagingOperation,
    pub passes_validation: bool,
    pub source_description: String,
    pub error_message: Option<String>,
}

impl StagingRow {
    /// Tile data as it will be committed: node id → transformed value.
    pub fn tile_data(&self) -> BTreeMap<Uuid, JsonValue> {
        self.value
            .iter()
            .map(|(node_id, v)| (*node_id, v.value.clone()))
            .collect()
    }
}

/// Granularity of a recorded load error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadErrorKind {
    Node,
    Tile,
}

impl LoadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadErrorKind::Node => "node",
            LoadErrorKind::Tile => "tile",
        }
    }
}

/// A recorded validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadError {
    pub kind: LoadErrorKind,
    pub load_id: Uuid,
    pub value: Option<String>,
    pub source: String,
    pub error: String,
    pub message: String,
    pub datatype: Option<String>,
    pub node_id: Option<Uuid>,
    pub nodegroup_id: Option<Uuid>,
}

/// Validation message returned by a datatype plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub title: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Status of a load (or export) event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Running,
    Validated,
    Indexed,
    Failed,
    Reversed,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Running => "running",
            LoadStatus::Validated => "validated",
            LoadStatus::Indexed => "indexed",
            LoadStatus::Failed => "failed",
            LoadStatus::Reversed => "reversed",
        }
    }

    /// Whether no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoadStatus::Indexed | LoadStatus::Failed | LoadStatus::Reversed
        )
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LoadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(LoadStatus::Running),
            "validated" => Ok(LoadStatus::Validated),
            "indexed" => Ok(LoadStatus::Indexed),
            "failed" => Ok(LoadStatus::Failed),
            "reversed" => Ok(LoadStatus::Reversed),
            _ => Err(format!("Invalid load status: {}", s)),
        }
    }
}

/// A load or export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadEvent {
    pub load_id: Uuid,
    pub status: LoadStatus,
    pub load_details: JsonValue,
    pub error_message: Option<String>,
    pub load_start_time: DateTime<Utc>,
    pub load_end_time: Option<DateTime<Utc>>,
}

/// What to do when a loaded resource already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteOption {
    /// Replace the existing resource's tiles.
    #[default]
    Overwrite,
    /// Leave existing resources untouched.
    Ignore,
}

impl FromStr for OverwriteOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(OverwriteOption::Overwrite),
            "ignore" => Ok(OverwriteOption::Ignore),
            _ => Err(format!("Invalid overwrite option: {}", s)),
        }
    }
}

// =============================================================================
// IDENTIFIERS & URIS
// =============================================================================

/// Per-scheme sequential identifier counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptIdentifierCounter {
    pub scheme_id: Uuid,
    pub start_number: i64,
    pub next_number: i64,
}

impl ConceptIdentifierCounter {
    /// A counter may only be re-based before any number was handed out.
    pub fn is_unused(&self) -> bool {
        self.start_number == self.next_number
    }
}

/// Per-scheme URI template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeUriTemplate {
    pub scheme_id: Uuid,
    pub url_template: String,
}

/// An identifier minted for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    pub resource_id: Uuid,
    pub identifier: String,
    pub source: String,
    pub identifier_type: Option<String>,
}
