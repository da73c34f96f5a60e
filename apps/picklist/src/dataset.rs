//! # Dataset
//!
//! In-memory records per collection, loaded from a JSON file shaped as
//! `{ "<collection>": [record, ...] }`. Backs the fixture server, `--data`
//! mode of the CLI and the tests.

use crate::error::{AppError, FetchError};
use crate::fetcher::{FetcherRegistry, PageFetcher, normalize_records};
use async_trait::async_trait;
use picklist_core::{Collection, PageRequest, SelectOption};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

// =============================================================================
// DATASET
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    records: BTreeMap<Collection, Vec<SelectOption>>,
}

impl Dataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed JSON document. Unknown collection keys are skipped.
    pub fn from_json(document: &Value) -> Result<Self, AppError> {
        let object = document.as_object().ok_or_else(|| {
            AppError::Config("dataset must be a JSON object keyed by collection".into())
        })?;

        let mut dataset = Self::new();
        for (key, records) in object {
            let collection = match key.parse::<Collection>() {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "skipping dataset section");
                    continue;
                }
            };
            let Some(records) = records.as_array() else {
                return Err(AppError::Config(format!(
                    "dataset section '{}' must be an array",
                    key
                )));
            };
            dataset.insert(collection, normalize_records(records, collection));
        }
        Ok(dataset)
    }

    /// Load a dataset file from disk.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&raw)?;
        let dataset = Self::from_json(&document)?;
        info!(
            path = %path.display(),
            collections = dataset.records.len(),
            records = dataset.total_records(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    pub fn insert(&mut self, collection: Collection, records: Vec<SelectOption>) {
        self.records.insert(collection, records);
    }

    #[must_use]
    pub fn with(mut self, collection: Collection, records: Vec<SelectOption>) -> Self {
        self.insert(collection, records);
        self
    }

    #[must_use]
    pub fn records(&self, collection: Collection) -> &[SelectOption] {
        self.records.get(&collection).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn collections(&self) -> impl Iterator<Item = Collection> + '_ {
        self.records.keys().copied()
    }

    #[must_use]
    pub fn contains(&self, collection: Collection) -> bool {
        self.records.contains_key(&collection)
    }

    #[must_use]
    pub fn total_records(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// Answer a page request. `None` when the collection is absent.
    #[must_use]
    pub fn query(&self, request: &PageRequest) -> Option<Vec<SelectOption>> {
        self.records
            .get(&request.collection)
            .map(|records| request.select_from(records))
    }
}

// =============================================================================
// STATIC FETCHER
// =============================================================================

/// Fetcher over a [`Dataset`], with an optional artificial latency.
#[derive(Debug)]
pub struct StaticFetcher {
    dataset: Arc<Dataset>,
    latency: Duration,
    calls: AtomicUsize,
}

impl StaticFetcher {
    #[must_use]
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self {
            dataset,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of fetches served so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch_records(&self, request: &PageRequest) -> Result<Vec<SelectOption>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.dataset.query(request).unwrap_or_default())
    }
}

impl FetcherRegistry {
    /// Registry with one [`StaticFetcher`] per collection present in `dataset`.
    #[must_use]
    pub fn from_dataset(dataset: Arc<Dataset>) -> Self {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(StaticFetcher::new(Arc::clone(&dataset)));
        let mut registry = Self::new();
        for collection in dataset.collections() {
            registry.register(collection, Arc::clone(&fetcher));
        }
        registry
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use picklist_core::PageOutcome;
    use serde_json::json;
    use std::io::Write;

    fn document() -> Value {
        json!({
            "institutions": [
                {"id": 1, "name": "Oslo Met"},
                {"id": 2, "name": "NTNU"}
            ],
            "people-records": [
                {"id": "p1", "full_name": "Ada Lovelace"}
            ],
            "spaceships": [
                {"id": 1, "name": "Enterprise"}
            ]
        })
    }

    #[test]
    fn from_json_skips_unknown_collections() {
        let dataset = Dataset::from_json(&document()).expect("valid dataset");
        let collections: Vec<_> = dataset.collections().collect();
        assert_eq!(
            collections,
            vec![Collection::Institutions, Collection::PeopleRecords]
        );
        assert_eq!(dataset.records(Collection::PeopleRecords)[0].name, "Ada Lovelace");
        assert!(dataset.records(Collection::Locations).is_empty());
    }

    #[test]
    fn from_json_rejects_non_array_sections() {
        let result = Dataset::from_json(&json!({"institutions": {"id": 1}}));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{}", document()).expect("write dataset");
        let dataset = Dataset::load(file.path()).expect("load");
        assert_eq!(dataset.total_records(), 3);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = Dataset::load(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[tokio::test]
    async fn static_fetcher_counts_calls() {
        let dataset = Arc::new(Dataset::from_json(&document()).expect("valid dataset"));
        let fetcher = StaticFetcher::new(dataset);
        let request = PageRequest::page(Collection::Institutions, "ntnu", 0, 10);
        let records = fetcher.fetch_records(&request).await.expect("fetch");
        assert_eq!(records.len(), 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn registry_from_dataset_only_covers_loaded_collections() {
        let dataset = Arc::new(Dataset::from_json(&document()).expect("valid dataset"));
        let registry = FetcherRegistry::from_dataset(dataset);
        assert!(registry.supports(Collection::Institutions));
        let outcome = registry
            .fetch(&PageRequest::page(Collection::Locations, "", 0, 10))
            .await;
        assert_eq!(outcome, PageOutcome::Unsupported);
    }
}
