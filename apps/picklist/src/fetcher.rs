//! # Fetcher Registry
//!
//! Maps each [`Collection`] to the [`PageFetcher`] that knows how to reach it,
//! and turns every fetch into a [`PageOutcome`]:
//!
//! - no registered fetcher: `Unsupported` (warn)
//! - fetcher error: `Failed` (warn)
//! - otherwise a page whose `has_more` comes from the page-size heuristic
//!
//! Nothing here retries. A picker retries when the user reopens, re-searches
//! or scrolls again.

use crate::error::FetchError;
use async_trait::async_trait;
use picklist_core::{Collection, PageOutcome, PageRequest, PageResult, SelectOption};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

// =============================================================================
// PAGE FETCHER
// =============================================================================

/// Source of records for one or more collections.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the records answering `request`, already normalized.
    async fn fetch_records(&self, request: &PageRequest) -> Result<Vec<SelectOption>, FetchError>;
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Collection -> fetcher mapping. The seam between pickers and data access.
#[derive(Clone, Default)]
pub struct FetcherRegistry {
    fetchers: BTreeMap<Collection, Arc<dyn PageFetcher>>,
}

impl fmt::Debug for FetcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherRegistry")
            .field("collections", &self.fetchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FetcherRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `fetcher` for one collection, replacing any previous one.
    pub fn register(&mut self, collection: Collection, fetcher: Arc<dyn PageFetcher>) {
        self.fetchers.insert(collection, fetcher);
    }

    /// Register `fetcher` for every supported collection.
    pub fn register_all(&mut self, fetcher: Arc<dyn PageFetcher>) {
        for collection in Collection::ALL {
            self.fetchers.insert(collection, Arc::clone(&fetcher));
        }
    }

    #[must_use]
    pub fn with(mut self, collection: Collection, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.register(collection, fetcher);
        self
    }

    #[must_use]
    pub fn supports(&self, collection: Collection) -> bool {
        self.fetchers.contains_key(&collection)
    }

    pub fn collections(&self) -> impl Iterator<Item = Collection> + '_ {
        self.fetchers.keys().copied()
    }

    /// Run one page request. Never fails; see the module docs.
    pub async fn fetch(&self, request: &PageRequest) -> PageOutcome {
        let Some(fetcher) = self.fetchers.get(&request.collection) else {
            warn!(collection = %request.collection, "no fetcher registered for collection");
            return PageOutcome::Unsupported;
        };
        if let Err(e) = request.validate() {
            warn!(collection = %request.collection, error = %e, "rejected page request");
            return PageOutcome::Failed(e.to_string());
        }

        match fetcher.fetch_records(request).await {
            Ok(mut records) => {
                if let Some(target) = &request.target_id {
                    records.retain(|r| r.id == *target);
                }
                debug!(
                    collection = %request.collection,
                    page = request.page,
                    search = %request.search_term,
                    count = records.len(),
                    "page fetched"
                );
                PageOutcome::Page(PageResult::from_records(records, request.page_size))
            }
            Err(e) => {
                warn!(
                    collection = %request.collection,
                    page = request.page,
                    error = %e,
                    "page fetch failed"
                );
                PageOutcome::Failed(e.to_string())
            }
        }
    }
}

// =============================================================================
// RECORD NORMALIZATION
// =============================================================================

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Convert a remote JSON record into a [`SelectOption`].
///
/// `id` may be a string or a number. The label comes from the collection's
/// display field, falling back to `name`. Every other scalar field is kept
/// in the extension map. Records without an id yield `None`.
#[must_use]
pub fn normalize_record(record: &Value, collection: Collection) -> Option<SelectOption> {
    let object = record.as_object()?;
    let id = match object.get("id")? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let name = object
        .get(collection.display_field())
        .or_else(|| object.get("name"))
        .and_then(scalar_string)
        .unwrap_or_default();

    let mut option = SelectOption::new(id, name);
    for (field, value) in object {
        if field == "id" || field == "name" {
            continue;
        }
        if let Some(text) = scalar_string(value) {
            option.extra.insert(field.clone(), text);
        }
    }
    Some(option)
}

/// Normalize a list of records, dropping those without an id.
#[must_use]
pub fn normalize_records(records: &[Value], collection: Collection) -> Vec<SelectOption> {
    records
        .iter()
        .filter_map(|record| {
            let option = normalize_record(record, collection);
            if option.is_none() {
                debug!(%collection, "dropping record without id");
            }
            option
        })
        .collect()
}

/// Flatten a [`SelectOption`] back into a wire record.
#[must_use]
pub fn to_wire_record(option: &SelectOption) -> Value {
    let mut object = Map::new();
    object.insert("id".into(), Value::String(option.id.clone()));
    object.insert("name".into(), Value::String(option.name.clone()));
    for (field, value) in &option.extra {
        object.insert(field.clone(), Value::String(value.clone()));
    }
    Value::Object(object)
}

// =============================================================================
// TESTS
// =============================================================================
