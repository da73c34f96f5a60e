//! # HTTP Page Contract
//!
//! Wire types for `POST /collections/{collection}/page` and the reqwest
//! client that speaks it.

use crate::error::FetchError;
use crate::fetcher::{PageFetcher, normalize_records};
use async_trait::async_trait;
use picklist_core::{Collection, DEFAULT_PAGE_SIZE, DependencyFilter, PageRequest, SelectOption};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Request body of the page endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub filters: Vec<DependencyFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

impl PageQuery {
    /// Rebuild the full request once the collection is known from the path.
    #[must_use]
    pub fn into_request(self, collection: Collection) -> PageRequest {
        PageRequest {
            collection,
            search_term: self.search_term,
            page: self.page,
            page_size: self.page_size,
            filters: self.filters,
            target_id: self.target_id,
        }
    }
}

impl From<&PageRequest> for PageQuery {
    fn from(request: &PageRequest) -> Self {
        Self {
            search_term: request.search_term.clone(),
            page: request.page,
            page_size: request.page_size,
            filters: request.filters.clone(),
            target_id: request.target_id.clone(),
        }
    }
}

/// Response body of the page endpoint. Records are raw JSON objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRecords {
    #[serde(default)]
    pub records: Vec<serde_json::Value>,
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// CLIENT
// =============================================================================

/// Fetcher for a remote backend that speaks the page contract.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    base_url: String,
    client: Client,
    api_key: Option<String>,
}

impl HttpFetcher {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            api_key: None,
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn page_url(&self, collection: Collection) -> String {
        format!("{}/collections/{}/page", self.base_url, collection)
    }

    /// Check that the backend is reachable.
    pub async fn health(&self) -> Result<HealthResponse, FetchError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_records(&self, request: &PageRequest) -> Result<Vec<SelectOption>, FetchError> {
        let mut builder = self
            .client
            .post(self.page_url(request.collection))
            .json(&PageQuery::from(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let page: PageRecords =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(normalize_records(&page.records, request.collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picklist_core::FilterValue;

    #[test]
    fn page_url_joins_without_double_slash() {
        let fetcher = HttpFetcher::new("http://localhost:8787/");
        assert_eq!(
            fetcher.page_url(Collection::DegreePrograms),
            "http://localhost:8787/collections/degree-programs/page"
        );
    }

    #[test]
    fn query_defaults_fill_missing_fields() {
        let query: PageQuery = serde_json::from_str("{}").expect("empty body is valid");
        assert_eq!(query.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(query.page, 0);
        assert!(query.target_id.is_none());
    }

    #[test]
    fn query_carries_filters_and_target() {
        let request = PageRequest::by_id(Collection::Locations, "9").with_filters(vec![
            DependencyFilter::new("country_id", FilterValue::Number(47)),
        ]);
        let query = PageQuery::from(&request);
        let body = serde_json::to_value(&query).expect("serialize");
        assert_eq!(body["target_id"], "9");
        assert_eq!(body["filters"][0]["field"], "country_id");
        assert_eq!(body["filters"][0]["value"], 47);
        assert_eq!(query.into_request(Collection::Locations), request);
    }
}
