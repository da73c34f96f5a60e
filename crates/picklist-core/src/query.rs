//! # Query Module
//!
//! The page contract between a picker and its remote collection.
//!
//! A [`PageRequest`] names a collection, a search term, a zero-based page,
//! dependency filters and optionally a single target id. The answer is a
//! [`PageResult`] whose `has_more` is a heuristic: a full page implies there
//! may be another one.

use crate::{Collection, DependencyFilter, PicklistError, SelectOption};
use serde::{Deserialize, Serialize};

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

// =============================================================================
// PAGE REQUEST
// =============================================================================

/// One logical fetch against a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub collection: Collection,
    pub search_term: String,
    pub page: u32,
    pub page_size: u32,
    #[serde(default)]
    pub filters: Vec<DependencyFilter>,
    #[serde(default)]
    pub target_id: Option<String>,
}

impl PageRequest {
    /// Request one page of search results.
    #[must_use]
    pub fn page(
        collection: Collection,
        search_term: impl Into<String>,
        page: u32,
        page_size: u32,
    ) -> Self {
        Self {
            collection,
            search_term: search_term.into(),
            page,
            page_size: page_size.max(1),
            filters: Vec::new(),
            target_id: None,
        }
    }

    /// Request a single record by id, bypassing search and paging.
    #[must_use]
    pub fn by_id(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            search_term: String::new(),
            page: 0,
            page_size: 1,
            filters: Vec::new(),
            target_id: Some(id.into()),
        }
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Vec<DependencyFilter>) -> Self {
        self.filters = filters;
        self
    }

    /// Validate request shape.
    pub fn validate(&self) -> Result<(), PicklistError> {
        if self.page_size == 0 {
            return Err(PicklistError::InvalidPageSize(self.page_size));
        }
        Ok(())
    }

    /// Index of the first record of this page.
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page as usize).saturating_mul(self.page_size as usize)
    }

    /// Filters that actually constrain the query. `Null` values are ignored.
    pub fn active_filters(&self) -> impl Iterator<Item = &DependencyFilter> {
        self.filters.iter().filter(|f| !f.value.is_null())
    }

    /// Whether `record` belongs in the unpaged result set of this request.
    ///
    /// With a target id only the id is compared. Otherwise every active filter
    /// must equal the record's field, and the search term must appear
    /// case-insensitively in the collection's search field.
    #[must_use]
    pub fn matches(&self, record: &SelectOption) -> bool {
        if let Some(target) = &self.target_id {
            return record.id == *target;
        }

        let filters_hold = self.active_filters().all(|f| {
            match (record.field(&f.field), f.value.as_match_string()) {
                (Some(actual), Some(expected)) => actual == expected,
                _ => false,
            }
        });
        if !filters_hold {
            return false;
        }

        let term = self.search_term.trim();
        if term.is_empty() {
            return true;
        }
        let needle = term.to_lowercase();
        record
            .field(self.collection.search_field())
            .or_else(|| record.field("name"))
            .map(|haystack| haystack.to_lowercase().contains(&needle))
            .unwrap_or(false)
    }

    /// Run this request against an in-memory record list.
    #[must_use]
    pub fn select_from(&self, records: &[SelectOption]) -> Vec<SelectOption> {
        let matching = records.iter().filter(|r| self.matches(r));
        if self.target_id.is_some() {
            return matching.take(1).cloned().collect();
        }
        matching
            .skip(self.offset())
            .take(self.page_size as usize)
            .cloned()
            .collect()
    }
}

// =============================================================================
// PAGE RESULT
// =============================================================================

/// Normalized answer to a [`PageRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    pub data: Vec<SelectOption>,
    pub count: usize,
    pub has_more: bool,
}

impl PageResult {
    /// Build a result, deriving `has_more` from whether the page came back full.
    #[must_use]
    pub fn from_records(data: Vec<SelectOption>, page_size: u32) -> Self {
        let count = data.len();
        Self {
            has_more: count >= page_size.max(1) as usize,
            count,
            data,
        }
    }

    /// The empty page every failure degrades to.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

// =============================================================================
// PAGE OUTCOME
// =============================================================================

/// What actually happened to a fetch.
///
/// Unsupported collections and backend failures both degrade to the empty page
/// via [`PageOutcome::into_page`]; keeping them apart lets callers tell
/// "no results" from "could not ask".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Page(PageResult),
    Unsupported,
    Failed(String),
}

impl PageOutcome {
    #[must_use]
    pub fn into_page(self) -> PageResult {
        match self {
            Self::Page(page) => page,
            Self::Unsupported | Self::Failed(_) => PageResult::empty(),
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Page(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================
