//! lingo: command-line thesaurus migration, SKOS import/export and
//! scheme lifecycle management.
//!
//! Every command that changes data records a load event, so a failed run
//! leaves its state in the database before the process exits non-zero.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lingo_core::search::parse_edit_distance;
use lingo_core::{
    IdentifierAllocator, LifecycleState, LifecycleTransition, LingoConfig, LoadEventRepository,
    OrderMode, OverwriteOption, ResourceIdentifier, StagingRepository,
};
use lingo_db::{
    Database, ExportRequest, ImportSource, LifecycleSynchronizer, LingoExporter, LingoImporter,
    PoolConfig, SearchQuery,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "lingo")]
#[command(author, version, about = "SKOS thesaurus migration and export")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the schema and install the built-in resource models
    Install,

    /// Import a SKOS RDF/XML file
    Import {
        /// SKOS RDF/XML file to load
        #[arg(short, long)]
        source: PathBuf,

        /// Replace the tiles of resources that already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Migrate schemes from the legacy RDM tables
    Migrate {
        /// Legacy scheme to migrate (default: every scheme)
        #[arg(short, long)]
        scheme: Option<Uuid>,

        /// Replace the tiles of resources that already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Export a scheme, or the hierarchy below a concept, as SKOS
    Export {
        /// Scheme id, or concept id with --partial
        #[arg(short, long)]
        resource: Uuid,

        /// Export the concept and its narrower concepts as a scheme
        #[arg(long)]
        partial: bool,

        /// Output file (default: <LINGO_EXPORT_DIR>/<resource>.xml)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Serialization format
        #[arg(short, long, default_value = lingo_core::defaults::EXPORT_FORMAT)]
        format: String,
    },

    /// Remove everything a load committed
    Reverse {
        /// Load to reverse
        #[arg(long)]
        load_id: Uuid,
    },

    /// Show a load event and its validation errors
    Status {
        /// Load to inspect
        #[arg(long)]
        load_id: Uuid,
    },

    /// Move a scheme between lifecycle states
    Lifecycle {
        /// Scheme id
        #[arg(short, long)]
        scheme: Uuid,

        /// Current state (draft, editing, active, retired)
        #[arg(long, value_parser = parse_state)]
        from: LifecycleState,

        /// Target state
        #[arg(long, value_parser = parse_state)]
        to: LifecycleState,
    },

    /// Reserve identifier numbers for a scheme
    Allocate {
        /// Scheme id
        #[arg(short, long)]
        scheme: Uuid,

        /// How many numbers to reserve
        #[arg(short, long, default_value_t = 1)]
        count: i64,
    },

    /// Set the first identifier number of an unused counter
    CounterStart {
        /// Scheme id
        #[arg(short, long)]
        scheme: Uuid,

        /// First number to hand out
        #[arg(long)]
        start: i64,
    },

    /// Record the identifier a scheme's URIs are built from
    SchemeIdentifier {
        /// Scheme id
        #[arg(short, long)]
        scheme: Uuid,

        /// Value substituted for <scheme_identifier>
        #[arg(short, long)]
        identifier: String,
    },

    /// Fuzzy search over concept labels
    Search {
        /// Search term
        #[arg(short, long)]
        term: String,

        /// Maximum edit distance (default: derived from the term length)
        #[arg(long)]
        max_edit_distance: Option<String>,

        /// Result order (unsorted, alphabetical, reverse-alphabetical)
        #[arg(long, default_value = "unsorted", value_parser = parse_order)]
        order: OrderMode,

        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Results per page
        #[arg(long, default_value_t = lingo_core::defaults::SEARCH_PAGE_SIZE)]
        page_size: usize,
    },

    /// Print every scheme as a concept tree
    Trees,
}

fn parse_state(raw: &str) -> Result<LifecycleState, String> {
    raw.parse()
}

fn parse_order(raw: &str) -> Result<OrderMode, String> {
    raw.parse()
}

fn overwrite_option(overwrite: bool) -> OverwriteOption {
    if overwrite {
        OverwriteOption::Overwrite
    } else {
        OverwriteOption::Ignore
    }
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: "lingo_cli=info,lingo_db=info,lingo_core=info")
///
/// Console logs go to stderr so command output on stdout stays parseable.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lingo_cli=info,lingo_db=info,lingo_core=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("lingo.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _file_guard = init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = LingoConfig::from_env().context("Invalid lingo configuration")?;
    config.validate()?;

    let database_url = cli
        .database_url
        .context("DATABASE_URL is not set; pass --database-url or set it in the environment")?;
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env())
        .await
        .context("Failed to connect to the database")?;

    match cli.command {
        Commands::Install => {
            db.migrate().await?;
            db.models.install_builtin().await?;
            info!(subsystem = "cli", op = "install", "Schema and built-in models installed");
        }
        Commands::Import { source, overwrite } => {
            let importer = LingoImporter::new(db, config);
            let summary = importer
                .execute(
                    Uuid::now_v7(),
                    &ImportSource::Skos { path: source },
                    overwrite_option(overwrite),
                )
                .await?;
            print_json(&summary)?;
        }
        Commands::Migrate { scheme, overwrite } => {
            let schemes = match scheme {
                Some(id) => vec![id],
                None => db.legacy.scheme_ids().await?,
            };
            let importer = LingoImporter::new(db, config);
            for scheme_id in schemes {
                let summary = importer
                    .execute(
                        Uuid::now_v7(),
                        &ImportSource::Rdm { scheme_id },
                        overwrite_option(overwrite),
                    )
                    .await
                    .with_context(|| format!("Migration of scheme {} failed", scheme_id))?;
                print_json(&summary)?;
            }
        }
        Commands::Export {
            resource,
            partial,
            output,
            format,
        } => {
            let exporter = LingoExporter::new(db, config);
            let request = ExportRequest {
                resource_id: resource,
                partial,
                output,
                format,
            };
            let summary = exporter.execute(Uuid::now_v7(), &request).await?;
            print_json(&summary)?;
        }
        Commands::Reverse { load_id } => {
            let removed = db.staging.reverse_load(load_id).await?;
            println!("Reversed load {}: {} tiles removed", load_id, removed);
        }
        Commands::Status { load_id } => {
            let event = db
                .load_events
                .get(load_id)
                .await?
                .with_context(|| format!("Load {} not found", load_id))?;
            let errors = db.staging.errors(load_id).await?;
            print_json(&serde_json::json!({ "event": event, "errors": errors }))?;
        }
        Commands::Lifecycle { scheme, from, to } => {
            let sync = LifecycleSynchronizer::new(db, config);
            let summary = sync
                .sync(scheme, LifecycleTransition::new(from, to))
                .await?;
            print_json(&summary)?;
        }
        Commands::Allocate { scheme, count } => {
            let first = db.identifiers.allocate(scheme, count).await?;
            println!("{}..{}", first, first + count - 1);
        }
        Commands::CounterStart { scheme, start } => {
            let counter = db.identifiers.set_counter_start(scheme, start).await?;
            print_json(&counter)?;
        }
        Commands::SchemeIdentifier { scheme, identifier } => {
            let identifier = ResourceIdentifier {
                resource_id: scheme,
                identifier,
                source: lingo_core::defaults::IDENTIFIER_SOURCE.to_string(),
                identifier_type: Some("identifier".to_string()),
            };
            db.identifiers.add_identifier(&identifier).await?;
            print_json(&identifier)?;
        }
        Commands::Search {
            term,
            max_edit_distance,
            order,
            page,
            page_size,
        } => {
            let max_edit_distance = max_edit_distance
                .as_deref()
                .map(parse_edit_distance)
                .transpose()?;
            let languages = db.models.languages().await?;
            let query = SearchQuery {
                term,
                max_edit_distance,
                order,
                page,
                page_size,
            };
            let results = db.concepts.search(&query, &config, &languages).await?;
            print_json(&results)?;
        }
        Commands::Trees => {
            let trees = db.concepts.trees().await?;
            print_json(&trees)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_import_defaults_to_ignore() {
        let cli = Cli::try_parse_from(["lingo", "import", "--source", "thesaurus.xml"]).unwrap();
        match cli.command {
            Commands::Import { source, overwrite } => {
                assert_eq!(source, PathBuf::from("thesaurus.xml"));
                assert_eq!(overwrite_option(overwrite), OverwriteOption::Ignore);
            }
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn test_lifecycle_states_parse() {
        let scheme = Uuid::from_u128(1).to_string();
        let cli = Cli::try_parse_from([
            "lingo", "lifecycle", "--scheme", &scheme, "--from", "draft", "--to", "active",
        ])
        .unwrap();
        match cli.command {
            Commands::Lifecycle { from, to, .. } => {
                assert!(LifecycleTransition::new(from, to).promotes_to_active());
            }
            _ => panic!("expected lifecycle"),
        }

        assert!(Cli::try_parse_from([
            "lingo", "lifecycle", "--scheme", &scheme, "--from", "draft", "--to", "published",
        ])
        .is_err());
    }

    #[test]
    fn test_scheme_identifier_parses() {
        let scheme = Uuid::from_u128(7).to_string();
        let cli = Cli::try_parse_from([
            "lingo", "scheme-identifier", "--scheme", &scheme, "--identifier", "MAT",
        ])
        .unwrap();
        match cli.command {
            Commands::SchemeIdentifier { scheme, identifier } => {
                assert_eq!(scheme, Uuid::from_u128(7));
                assert_eq!(identifier, "MAT");
            }
            _ => panic!("expected scheme-identifier"),
        }
    }

    #[test]
    fn test_search_defaults() {
        let cli = Cli::try_parse_from(["lingo", "search", "--term", "stone"]).unwrap();
        match cli.command {
            Commands::Search {
                order,
                page,
                page_size,
                max_edit_distance,
                ..
            } => {
                assert_eq!(order, OrderMode::Unsorted);
                assert_eq!(page, 1);
                assert_eq!(page_size, 25);
                assert!(max_edit_distance.is_none());
            }
            _ => panic!("expected search"),
        }
    }
}
