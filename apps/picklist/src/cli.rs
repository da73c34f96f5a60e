//! # CLI Module
//!
//! Command-line interface for picklist.
//!
//! ## Commands
//!
//! - `collections` - list supported collections and their fields
//! - `fetch` - run one page request against the configured source
//! - `serve` - run the fixture backend over a dataset
//! - `script` - replay an interaction script against one picker
//!
//! Every `cmd_*` function returns the text to print so tests can assert on it.

use crate::config::Settings;
use crate::dataset::Dataset;
use crate::driver::{Clock, DropdownDriver, shared_cache};
use crate::error::AppError;
use crate::script::{ScriptStep, parse_script};
use crate::server::{self, ServerState};
use clap::{Args, Parser, Subcommand};
use picklist_core::{
    Collection, DEFAULT_PAGE_SIZE, DEFAULT_TTL_MS, DependencyFilter, DropdownController,
    ListView, PageOutcome, PageRequest, PageResult, QueryContext, view::NO_RESULTS,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "picklist", version, about = "Remote-backed picker runtime and fixture backend")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings shared by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Records per page
    #[arg(long, env = "PICKLIST_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE, global = true)]
    pub page_size: u32,

    /// Seconds before a cached context is considered stale
    #[arg(long, env = "PICKLIST_CACHE_TTL_SECS", default_value_t = DEFAULT_TTL_MS / 1000, global = true)]
    pub cache_ttl_secs: u64,

    /// Base URL of a backend speaking the page contract
    #[arg(long, env = "PICKLIST_BACKEND_URL", global = true)]
    pub backend: Option<String>,

    /// Dataset file (JSON object keyed by collection)
    #[arg(long, env = "PICKLIST_DATA", global = true)]
    pub data: Option<PathBuf>,

    /// Bearer token sent to the backend, or required by `serve`
    #[arg(long, env = "PICKLIST_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,
}

impl GlobalArgs {
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            page_size: self.page_size,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            backend_url: self.backend.clone(),
            data_path: self.data.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List supported collections
    Collections {
        #[arg(long)]
        json: bool,
    },

    /// Fetch one page of a collection
    Fetch {
        collection: String,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value_t = 0)]
        page: u32,
        /// Dependency filter, `field=value` (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Fetch a single record by id
        #[arg(long)]
        target_id: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Serve the dataset over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1:8787")]
        bind: SocketAddr,
    },

    /// Replay an interaction script against one picker
    Script {
        file: PathBuf,
        #[arg(long)]
        collection: String,
        /// Form location the picker lives in
        #[arg(long, default_value = "cli")]
        location: String,
        /// Initial dependency filter, `field=value` (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,
        #[arg(long)]
        json: bool,
    },
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> Result<String, AppError> {
    let settings = cli.global.settings();
    match cli.command {
        Command::Collections { json } => cmd_collections(json),
        Command::Fetch {
            collection,
            search,
            page,
            filters,
            target_id,
            json,
        } => {
            let params = FetchParams {
                collection,
                search,
                page,
                filters,
                target_id,
            };
            cmd_fetch(&settings, &params, json).await
        }
        Command::Serve { bind } => {
            cmd_serve(&settings, bind).await?;
            Ok(String::new())
        }
        Command::Script {
            file,
            collection,
            location,
            filters,
            json,
        } => cmd_script(&settings, &file, &collection, &location, &filters, json).await,
    }
}

fn parse_filters(filters: &[String]) -> Result<Vec<DependencyFilter>, AppError> {
    filters
        .iter()
        .map(|f| f.parse::<DependencyFilter>().map_err(AppError::from))
        .collect()
}

// =============================================================================
// COLLECTIONS
// =============================================================================

#[derive(Debug, Serialize)]
struct CollectionInfo {
    name: &'static str,
    search_field: &'static str,
    display_field: &'static str,
}

pub fn cmd_collections(json: bool) -> Result<String, AppError> {
    let infos: Vec<CollectionInfo> = Collection::ALL
        .iter()
        .map(|c| CollectionInfo {
            name: c.as_str(),
            search_field: c.search_field(),
            display_field: c.display_field(),
        })
        .collect();

    if json {
        return Ok(serde_json::to_string_pretty(&infos)?);
    }

    let mut output = String::new();
    for info in &infos {
        output.push_str(&format!(
            "{:<20} search={:<10} display={}\n",
            info.name, info.search_field, info.display_field
        ));
    }
    Ok(output)
}

// =============================================================================
// FETCH
// =============================================================================

/// Arguments of `fetch`.
#[derive(Debug, Clone, Default)]
pub struct FetchParams {
    pub collection: String,
    pub search: String,
    pub page: u32,
    pub filters: Vec<String>,
    pub target_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct FetchReport {
    status: &'static str,
    #[serde(flatten)]
    page: PageResult,
}

pub async fn cmd_fetch(
    settings: &Settings,
    params: &FetchParams,
    json: bool,
) -> Result<String, AppError> {
    let registry = settings.build_registry()?;
    let filters = parse_filters(&params.filters)?;

    let outcome = match params.collection.parse::<Collection>() {
        Ok(collection) => {
            let request = match &params.target_id {
                Some(id) => PageRequest::by_id(collection, id.as_str()),
                None => PageRequest::page(
                    collection,
                    params.search.trim(),
                    params.page,
                    settings.page_size,
                ),
            }
            .with_filters(filters);
            registry.fetch(&request).await
        }
        Err(e) => {
            warn!(error = %e, "fetch for unsupported collection");
            PageOutcome::Unsupported
        }
    };

    let status = match &outcome {
        PageOutcome::Page(page) if page.data.is_empty() => "empty",
        PageOutcome::Page(_) => "ok",
        PageOutcome::Unsupported => "unsupported",
        PageOutcome::Failed(_) => "failed",
    };
    let page = outcome.into_page();

    if json {
        return Ok(serde_json::to_string_pretty(&FetchReport { status, page })?);
    }

    let mut output = String::new();
    if page.data.is_empty() {
        output.push_str(NO_RESULTS);
        output.push('\n');
    }
    for option in &page.data {
        output.push_str(&format!("{}\t{}\n", option.id, option.name));
    }
    output.push_str(&format!(
        "status={} count={} has_more={}\n",
        status, page.count, page.has_more
    ));
    Ok(output)
}

// =============================================================================
// SERVE
// =============================================================================

pub async fn cmd_serve(settings: &Settings, bind: SocketAddr) -> Result<(), AppError> {
    let dataset: Dataset = settings.load_dataset()?;
    info!(collections = dataset.collections().count(), "serving dataset");
    let state = ServerState::new(Arc::new(dataset), settings.api_key.clone());
    server::serve(bind, state).await
}

// =============================================================================
// SCRIPT
// =============================================================================

#[derive(Debug, Serialize)]
struct ScriptFrame {
    line: usize,
    step: String,
    view: ListView,
}

/// Replay a script. After each line every running fetch is awaited, so the
/// printed views do not depend on backend latency. Only `wait` fires the
/// search debounce.
pub async fn cmd_script(
    settings: &Settings,
    file: &Path,
    collection: &str,
    location: &str,
    filters: &[String],
    json: bool,
) -> Result<String, AppError> {
    let source = std::fs::read_to_string(file)?;
    let lines = parse_script(&source)?;
    let collection: Collection = collection.parse()?;
    let registry = Arc::new(settings.build_registry()?);

    let controller = DropdownController::new(
        QueryContext::new(collection, location),
        settings.controller_config(),
    )
    .with_filters(parse_filters(filters)?);
    let cache = shared_cache(settings.cache_ttl_ms());
    let (mut driver, _updates) =
        DropdownDriver::new(controller, Arc::clone(&cache), registry, Clock::new()).await;

    let mut frames = Vec::with_capacity(lines.len());
    for line in lines {
        match line.step {
            ScriptStep::Wait(ms) => driver.advance(Duration::from_millis(ms)).await,
            ScriptStep::Event(event) => driver.handle(event).await,
        }
        driver.drain().await;
        frames.push(ScriptFrame {
            line: line.number,
            step: line.source,
            view: driver.view().await,
        });
    }

    let stats = cache.lock().await.stats();
    info!(
        contexts = stats.size,
        hits = stats.hits,
        misses = stats.misses,
        hit_rate = stats.hit_rate_percent,
        "script finished"
    );

    if json {
        return Ok(serde_json::to_string_pretty(&frames)?);
    }

    let mut output = String::new();
    for frame in &frames {
        output.push_str(&format!("> {}\n", frame.step));
        output.push_str(&frame.view.to_text());
    }
    Ok(output)
}

// =============================================================================
// TESTS
// =============================================================================
