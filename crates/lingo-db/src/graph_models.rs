//! Resource models, languages and controlled lists.
//!
//! The built-in scheme and concept models are installed from
//! [`GraphModel::lingo_schemes`] / [`GraphModel::lingo_concepts`]; a run's
//! [`MigrationContext`] is then built from what the database holds, so list
//! items and languages added by earlier imports are visible.

use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use lingo_core::graph_model::{CONCEPTS_GRAPH_ID, SCHEMES_GRAPH_ID};
use lingo_core::lookups::ListItemLabel;
use lingo_core::{
    Cardinality, ControlledLists, Error, GraphModel, LanguageLookup, LingoConfig, ListItem,
    MigrationContext, NodeDef, NodegroupDef, ResourceKind, Result,
};

/// Graph id of the model for `kind`.
pub fn graph_id(kind: ResourceKind) -> Uuid {
    match kind {
        ResourceKind::Scheme => SCHEMES_GRAPH_ID,
        ResourceKind::Concept => CONCEPTS_GRAPH_ID,
    }
}

/// PostgreSQL store for resource models and lookups.
#[derive(Clone)]
pub struct PgModelRepository {
    pool: PgPool,
}

impl PgModelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // MODELS
    // =========================================================================

    /// Upsert a graph with its nodegroups and nodes.
    pub async fn install(&self, model: &GraphModel) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let name = match model.kind {
            ResourceKind::Scheme => "Schemes",
            ResourceKind::Concept => "Concepts",
        };

        sqlx::query(
            "INSERT INTO graphs (graphid, slug, name) VALUES ($1, $2, $3)
             ON CONFLICT (graphid) DO UPDATE SET slug = EXCLUDED.slug, name = EXCLUDED.name",
        )
        .bind(model.graph_id)
        .bind(model.kind.slug())
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        for ng in model.nodegroups() {
            sqlx::query(
                "INSERT INTO node_groups (nodegroupid, graphid, alias, cardinality, parentnodegroupid, depth)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (nodegroupid) DO UPDATE
                 SET alias = EXCLUDED.alias, cardinality = EXCLUDED.cardinality,
                     parentnodegroupid = EXCLUDED.parentnodegroupid, depth = EXCLUDED.depth",
            )
            .bind(ng.id)
            .bind(model.graph_id)
            .bind(&ng.alias)
            .bind(ng.cardinality.as_str())
            .bind(ng.parent_nodegroup_id)
            .bind(ng.depth)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        for node in model.nodes() {
            sqlx::query(
                "INSERT INTO nodes (nodeid, graphid, nodegroupid, alias, datatype, config)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (nodeid) DO UPDATE
                 SET alias = EXCLUDED.alias, datatype = EXCLUDED.datatype, config = EXCLUDED.config",
            )
            .bind(node.id)
            .bind(model.graph_id)
            .bind(node.nodegroup_id)
            .bind(&node.alias)
            .bind(&node.datatype)
            .bind(&node.config)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        debug!(
            subsystem = "database",
            component = "models",
            op = "install",
            graph = model.kind.slug(),
            nodegroup_count = model.nodegroups().len(),
            node_count = model.nodes().len(),
            "Installed resource model"
        );
        Ok(())
    }

    /// Install both built-in models, the default languages and the default
    /// controlled lists. Safe to run repeatedly.
    pub async fn install_builtin(&self) -> Result<()> {
        self.install(&GraphModel::lingo_schemes()).await?;
        self.install(&GraphModel::lingo_concepts()).await?;

        let languages = LanguageLookup::with_defaults();
        let pairs: Vec<(String, String)> = languages
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect();
        self.insert_languages(&pairs).await?;

        let lists = ControlledLists::with_defaults(&languages);
        let items: Vec<ListItem> = lists.items().cloned().collect();
        self.insert_list_items(&items).await?;

        info!(
            subsystem = "database",
            component = "models",
            op = "install_builtin",
            language_count = pairs.len(),
            list_item_count = items.len(),
            "Built-in models installed"
        );
        Ok(())
    }

    /// Load the installed model for `kind`.
    pub async fn load(&self, kind: ResourceKind) -> Result<GraphModel> {
        let graph_id = graph_id(kind);

        let nodegroups: Vec<NodegroupDef> = sqlx::query(
            "SELECT nodegroupid, alias, cardinality, parentnodegroupid, depth
             FROM node_groups WHERE graphid = $1 ORDER BY depth, alias",
        )
        .bind(graph_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?
        .into_iter()
        .map(|row| NodegroupDef {
            id: row.get("nodegroupid"),
            alias: row.get("alias"),
            cardinality: Cardinality::parse(row.get::<String, _>("cardinality").as_str()),
            parent_nodegroup_id: row.get("parentnodegroupid"),
            depth: row.get("depth"),
        })
        .collect();

        if nodegroups.is_empty() {
            return Err(Error::NotFound(format!(
                "The {} model is not installed",
                kind
            )));
        }

        let nodes: Vec<NodeDef> = sqlx::query(
            "SELECT nodeid, alias, nodegroupid, datatype, config
             FROM nodes WHERE graphid = $1 ORDER BY alias",
        )
        .bind(graph_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?
        .into_iter()
        .map(|row| NodeDef {
            id: row.get("nodeid"),
            alias: row.get("alias"),
            nodegroup_id: row.get("nodegroupid"),
            datatype: row.get("datatype"),
            config: row.get("config"),
        })
        .collect();

        Ok(GraphModel::new(graph_id, kind, nodegroups, nodes))
    }

    // =========================================================================
    // LANGUAGES
    // =========================================================================

    pub async fn languages(&self) -> Result<LanguageLookup> {
        let rows = sqlx::query("SELECT code, name FROM languages ORDER BY code")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut lookup = LanguageLookup::new();
        for row in rows {
            lookup.insert(row.get::<String, _>("code"), row.get::<String, _>("name"));
        }
        Ok(lookup)
    }

    /// Insert (code, name) pairs, keeping existing names. Returns how many
    /// were new.
    pub async fn insert_languages(&self, languages: &[(String, String)]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let inserted = insert_languages_tx(&mut tx, languages).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(inserted)
    }

    // =========================================================================
    // CONTROLLED LISTS
    // =========================================================================

    pub async fn controlled_lists(&self) -> Result<ControlledLists> {
        let rows = sqlx::query(
            "SELECT id, list_id, uri, labels FROM controlled_list_items ORDER BY list_id, uri",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut lists = ControlledLists::new();
        for row in rows {
            let Json(labels): Json<Vec<ListItemLabel>> = row.get("labels");
            lists.insert(ListItem {
                id: row.get("id"),
                list_id: row.get("list_id"),
                uri: row.get("uri"),
                labels,
            });
        }
        Ok(lists)
    }

    pub async fn insert_list_items(&self, items: &[ListItem]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let inserted = insert_list_items_tx(&mut tx, items).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(inserted)
    }

    // =========================================================================
    // RUN CONTEXT
    // =========================================================================

    /// Per-run context over the installed models and lookups.
    pub async fn context(&self, config: &LingoConfig) -> Result<MigrationContext> {
        let schemes = self.load(ResourceKind::Scheme).await?;
        let concepts = self.load(ResourceKind::Concept).await?;
        let languages = self.languages().await?;
        let lists = self.controlled_lists().await?;
        Ok(MigrationContext::new(
            schemes, concepts, languages, lists, config,
        ))
    }

    /// Persist languages and list items a run discovered.
    pub async fn persist_discovered(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: &MigrationContext,
    ) -> Result<()> {
        let languages = ctx.discovered_languages();
        let items = ctx.lists.discovered();
        if languages.is_empty() && items.is_empty() {
            return Ok(());
        }
        let new_languages = insert_languages_tx(tx, languages).await?;
        let new_items = insert_list_items_tx(tx, items).await?;
        info!(
            subsystem = "database",
            component = "models",
            op = "persist_discovered",
            language_count = new_languages,
            list_item_count = new_items,
            "Registered languages discovered during the run"
        );
        Ok(())
    }
}

async fn insert_languages_tx(
    tx: &mut Transaction<'_, Postgres>,
    languages: &[(String, String)],
) -> Result<u64> {
    let mut inserted = 0;
    for (code, name) in languages {
        inserted += sqlx::query(
            "INSERT INTO languages (code, name) VALUES ($1, $2) ON CONFLICT (code) DO NOTHING",
        )
        .bind(code)
        .bind(name)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();
    }
    Ok(inserted)
}

async fn insert_list_items_tx(
    tx: &mut Transaction<'_, Postgres>,
    items: &[ListItem],
) -> Result<u64> {
    let mut inserted = 0;
    for item in items {
        inserted += sqlx::query(
            "INSERT INTO controlled_list_items (id, list_id, uri, labels)
             VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING",
        )
        .bind(item.id)
        .bind(item.list_id)
        .bind(&item.uri)
        .bind(Json(&item.labels))
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();
    }
    Ok(inserted)
}
