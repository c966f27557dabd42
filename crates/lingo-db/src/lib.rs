//! # lingo-db
//!
//! PostgreSQL layer for lingo.
//!
//! This crate provides:
//! - Connection pool management
//! - Resource model, language and controlled list storage
//! - Readers for legacy RDM thesaurus tables
//! - The staging table, load events and promotion into committed tiles
//! - Per-scheme identifier counters and URI templates
//! - Import, export and lifecycle orchestration over the `lingo-core` stages
//!
//! ## Example
//!
//! ```rust,ignore
//! use lingo_db::{Database, ImportSource, LingoImporter};
//! use lingo_core::{LingoConfig, OverwriteOption};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/lingo").await?;
//!     db.migrate().await?;
//!     db.models.install_builtin().await?;
//!
//!     let importer = LingoImporter::new(db.clone(), LingoConfig::from_env()?);
//!     let outcome = importer
//!         .run(&ImportSource::Skos { path: "thesaurus.xml".into() }, OverwriteOption::Overwrite)
//!         .await;
//!     println!("{}", outcome.message);
//!     Ok(())
//! }
//! ```
pub mod concepts;
pub mod exporter;
pub mod graph_models;
pub mod identifiers;
pub mod importer;
pub mod legacy;
pub mod lifecycle;
pub mod load_events;
pub mod pool;
pub mod resources;
pub mod staging;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use lingo_core::*;

pub use concepts::{ConceptMatch, ConceptService, SearchQuery};
pub use exporter::{ExportRequest, ExportSummary, LingoExporter};
pub use graph_models::PgModelRepository;
pub use identifiers::PgIdentifierAllocator;
pub use importer::{ImportSource, ImportSummary, LingoImporter, RunOutcome};
pub use legacy::PgLegacyRepository;
pub use lifecycle::{LifecycleSummary, LifecycleSynchronizer};
pub use load_events::PgLoadEventRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use resources::PgResourceRepository;
pub use staging::PgStagingRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Resource models, languages and controlled lists.
    pub models: PgModelRepository,
    /// Legacy RDM thesaurus tables.
    pub legacy: PgLegacyRepository,
    /// Staging rows and load errors.
    pub staging: PgStagingRepository,
    /// Load and export events.
    pub load_events: PgLoadEventRepository,
    /// Identifier counters, URI templates and minted identifiers.
    pub identifiers: PgIdentifierAllocator,
    /// Committed resources and tiles.
    pub resources: PgResourceRepository,
    /// Concept trees and search.
    pub concepts: ConceptService,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        let resources = PgResourceRepository::new(pool.clone());
        Self {
            models: PgModelRepository::new(pool.clone()),
            legacy: PgLegacyRepository::new(pool.clone()),
            staging: PgStagingRepository::new(pool.clone()),
            load_events: PgLoadEventRepository::new(pool.clone()),
            identifiers: PgIdentifierAllocator::new(pool.clone()),
            concepts: ConceptService::new(resources.clone()),
            resources,
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
