//! # Settings
//!
//! Runtime settings resolved from CLI flags and `PICKLIST_*` environment
//! variables, and the objects built from them.

use crate::dataset::Dataset;
use crate::error::AppError;
use crate::fetcher::FetcherRegistry;
use crate::http::HttpFetcher;
use picklist_core::{ControllerConfig, DEFAULT_PAGE_SIZE, DEFAULT_TTL_MS};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub page_size: u32,
    pub cache_ttl: Duration,
    /// Remote backend speaking the page contract.
    pub backend_url: Option<String>,
    /// Local dataset file.
    pub data_path: Option<PathBuf>,
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cache_ttl: Duration::from_millis(DEFAULT_TTL_MS),
            backend_url: None,
            data_path: None,
            api_key: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.page_size == 0 {
            return Err(AppError::Config("page size must be at least 1".into()));
        }
        if self.backend_url.is_some() && self.data_path.is_some() {
            return Err(AppError::Config(
                "--backend and --data are mutually exclusive".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig::with_page_size(self.page_size)
    }

    #[must_use]
    pub fn cache_ttl_ms(&self) -> u64 {
        u64::try_from(self.cache_ttl.as_millis()).unwrap_or(u64::MAX)
    }

    /// Load the dataset named by `--data`.
    pub fn load_dataset(&self) -> Result<Dataset, AppError> {
        let path = self
            .data_path
            .as_ref()
            .ok_or_else(|| AppError::Config("no dataset: pass --data <file>".into()))?;
        Dataset::load(path)
    }

    /// Registry for the configured data source.
    pub fn build_registry(&self) -> Result<FetcherRegistry, AppError> {
        self.validate()?;

        if let Some(url) = &self.backend_url {
            let mut fetcher = HttpFetcher::new(url.as_str());
            if let Some(key) = &self.api_key {
                fetcher = fetcher.with_api_key(key.as_str());
            }
            info!(backend = %fetcher.base_url(), "using remote backend");
            let mut registry = FetcherRegistry::new();
            registry.register_all(Arc::new(fetcher));
            return Ok(registry);
        }

        if self.data_path.is_some() {
            let dataset = Arc::new(self.load_dataset()?);
            return Ok(FetcherRegistry::from_dataset(dataset));
        }

        Err(AppError::Config(
            "no data source: pass --backend <url> or --data <file>".into(),
        ))
    }
}
