//! # MindMark Search CLI (`mindmark`)
//!
//! Operational interface for the MindMark search layer: collection
//! bootstrap, index rebuilds, ad-hoc searches, and the HTTP API server.
//!
//! ## Usage
//!
//! ```bash
//! mindmark --config ./config/mindmark.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mindmark init` | Create the engine collection (idempotent) |
//! | `mindmark health` | Check engine liveness |
//! | `mindmark search "<query>" --user <id>` | Run an owner-scoped search |
//! | `mindmark suggest "<prefix>" --user <id>` | Typeahead suggestions |
//! | `mindmark reindex --user <id> --file <json>` | Rebuild an owner's index from an export |
//! | `mindmark remove <id>` | Delete one document from the index |
//! | `mindmark serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Bootstrap the collection
//! mindmark init
//!
//! # Rebuild one user's index from a primary-store export
//! mindmark reindex --user u1 --file bookmarks.json
//!
//! # Filtered search
//! mindmark search "rust" --user u1 --content-type article --favorite true
//!
//! # Browse favorites without a query, newest first
//! mindmark search "" --user u1 --favorite true --sort created
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use mindmark_search::config::load_config;
use mindmark_search::engine::SearchEngine;
use mindmark_search::models::{Bookmark, ContentType, SearchResponse};
use mindmark_search::query::{
    build_query, DateRange, SearchOptions, SortDirection, SortField, SortSpec,
};
use mindmark_search::results::normalize;
use mindmark_search::server::run_server;
use mindmark_search::suggest::suggestions;
use mindmark_search::sync::SyncService;
use mindmark_search::typesense::TypesenseEngine;

/// MindMark search layer CLI — index synchronization and query tooling
/// for the MindMark bookmark manager.
#[derive(Parser)]
#[command(
    name = "mindmark",
    about = "MindMark search layer — index synchronization and query tooling",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mindmark.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the engine collection against the fixed bookmark schema.
    ///
    /// Idempotent — running it against an existing collection is safe.
    Init,

    /// Check engine liveness. Exits non-zero when the engine is down.
    Health,

    /// Run an owner-scoped search.
    ///
    /// An empty query browses with filters only (match-all).
    Search {
        /// The search query string. Empty means match-all.
        query: String,

        /// Owner whose bookmarks are searched. Every query is scoped to
        /// one owner.
        #[arg(long)]
        user: String,

        /// Restrict to content types (repeatable).
        #[arg(long = "content-type")]
        content_types: Vec<ContentType>,

        /// Restrict to collection ids (repeatable).
        #[arg(long = "collection")]
        collections: Vec<String>,

        /// Filter on favorite flag (true/false). Omit to not filter.
        #[arg(long)]
        favorite: Option<bool>,

        /// Filter on archived flag (true/false). Omit to not filter.
        #[arg(long)]
        archived: Option<bool>,

        /// Only bookmarks created on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Only bookmarks created on or before this date (YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,

        /// Sort field: relevance, created, or updated.
        #[arg(long, default_value = "relevance")]
        sort: String,

        /// Sort direction: asc or desc.
        #[arg(long, default_value = "desc")]
        direction: String,

        /// Maximum results to return.
        #[arg(long)]
        limit: Option<u32>,

        /// 0-based result offset.
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Typeahead suggestions for a partial query (minimum two characters).
    Suggest {
        /// Partial query text.
        partial: String,

        /// Owner whose bookmarks are suggested from.
        #[arg(long)]
        user: String,
    },

    /// Rebuild one owner's document set from a primary-store JSON export.
    ///
    /// Deletes everything the engine holds for the owner, then imports
    /// the export in one batch. Safe to re-run.
    Reindex {
        /// Owner whose index is rebuilt.
        #[arg(long)]
        user: String,

        /// JSON file containing an array of bookmark records.
        #[arg(long)]
        file: PathBuf,
    },

    /// Delete one document from the index by bookmark id.
    Remove {
        /// Bookmark id.
        id: String,
    },

    /// Start the HTTP API server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let engine: Arc<dyn SearchEngine> = Arc::new(TypesenseEngine::from_config(&config.engine)?);

    match cli.command {
        Commands::Init => {
            engine.ensure_collection().await?;
            println!("collection '{}' ready", config.engine.collection);
        }

        Commands::Health => {
            let healthy = engine.health().await.unwrap_or(false);
            if healthy {
                println!("ok");
            } else {
                eprintln!("engine at {} is not healthy", config.engine.url);
                std::process::exit(1);
            }
        }

        Commands::Search {
            query,
            user,
            content_types,
            collections,
            favorite,
            archived,
            since,
            until,
            sort,
            direction,
            limit,
            offset,
        } => {
            let mut options = SearchOptions::for_owner(user);
            options.query = query;
            options.filters.content_types = content_types;
            options.filters.collection_ids = collections;
            options.filters.is_favorite = favorite;
            options.filters.is_archived = archived;
            if since.is_some() || until.is_some() {
                options.filters.date_range = Some(DateRange {
                    start: since.as_deref().map(parse_start_date).transpose()?,
                    end: until.as_deref().map(parse_end_date).transpose()?,
                });
            }
            options.sort = parse_sort(&sort, &direction)?;
            options.limit = limit.unwrap_or(config.search.per_page);
            options.offset = offset;

            let spec = build_query(&options, &config.search)?;
            let response = normalize(&engine.search(&spec).await?);
            print_results(&response);
        }

        Commands::Suggest { partial, user } => {
            let found = suggestions(engine.as_ref(), &config.search, &user, &partial, 5).await?;
            if found.is_empty() {
                println!("No suggestions.");
            } else {
                for suggestion in found {
                    println!("{}", suggestion);
                }
            }
        }

        Commands::Reindex { user, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read export file: {}", file.display()))?;
            let bookmarks: Vec<Bookmark> = serde_json::from_str(&content)
                .with_context(|| "Failed to parse export file as a bookmark array")?;

            let sync = SyncService::new(engine.clone());
            let report = sync.reindex_for_owner(&user, &bookmarks).await?;

            println!("reindex {}", user);
            println!("  exported records: {}", bookmarks.len());
            println!("  indexed: {}", report.indexed);
            println!("  failed: {}", report.failures.len());
            for failure in &report.failures {
                eprintln!("  [{}] {}", failure.id, failure.message);
            }
            if report.failures.is_empty() {
                println!("ok");
            } else {
                std::process::exit(1);
            }
        }

        Commands::Remove { id } => {
            let sync = SyncService::new(engine.clone());
            sync.remove_one(&id).await?;
            println!("removed {}", id);
        }

        Commands::Serve => {
            run_server(&config, engine).await?;
        }
    }

    Ok(())
}

fn parse_sort(field: &str, direction: &str) -> Result<SortSpec> {
    let field = match field {
        "relevance" => SortField::Relevance,
        "created" => SortField::Created,
        "updated" => SortField::Updated,
        other => anyhow::bail!(
            "Unknown sort field: '{}'. Use relevance, created, or updated.",
            other
        ),
    };
    let direction = match direction {
        "asc" => SortDirection::Asc,
        "desc" => SortDirection::Desc,
        other => anyhow::bail!("Unknown sort direction: '{}'. Use asc or desc.", other),
    };
    Ok(SortSpec { field, direction })
}

fn parse_start_date(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))?;
    Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc())
}

fn parse_end_date(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))?;
    Ok(date.and_hms_opt(23, 59, 59).unwrap().and_utc())
}

fn print_results(response: &SearchResponse) {
    if response.hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, hit) in response.hits.iter().enumerate() {
        let doc = &hit.document;
        println!("{}. {} [{}]", i + 1, doc.title, doc.content_type);
        println!("    url: {}", doc.url);
        if !doc.description.is_empty() {
            println!("    description: {}", doc.description);
        }
        if !doc.ai_tags.is_empty() {
            println!("    tags: {}", doc.ai_tags.join(", "));
        }
        let created = chrono::DateTime::from_timestamp(doc.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!("    created: {}", created);
        println!("    id: {}", doc.id);
        println!();
    }

    println!(
        "{} result{} in {} ms",
        response.total,
        if response.total == 1 { "" } else { "s" },
        response.search_time_ms
    );

    for (field, counts) in &response.facets {
        if counts.is_empty() {
            continue;
        }
        let rendered: Vec<String> = counts
            .iter()
            .map(|c| format!("{} ({})", c.value, c.count))
            .collect();
        println!("  {}: {}", field, rendered.join(", "));
    }
}
