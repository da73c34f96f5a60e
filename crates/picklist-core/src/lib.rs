//! # Picklist Core
//!
//! Deterministic state engine for remote-backed, searchable, dependent pickers.
//!
//! The crate is sans-IO: nothing here touches the network or a clock. Callers
//! pass a [`Timestamp`] in, receive [`controller::FetchCommand`]s out, perform
//! the fetch themselves and feed the [`query::PageOutcome`] back.
//!
//! ## Modules
//!
//! - [`cache`]: one [`cache::CacheEntry`] per [`QueryContext`], TTL staleness
//! - [`query`]: page request/result contract and record matching
//! - [`controller`]: the dropdown state machine with stale-response discard
//! - [`view`]: rendered list state

pub mod cache;
pub mod controller;
pub mod query;
pub mod view;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use cache::{CacheEntry, CacheStats, SelectCache, DEFAULT_TTL_MS};
pub use controller::{
    Completion, ControllerConfig, DropdownController, DropdownState, FetchCommand, FetchKind,
    Key, KeyOutcome, RequestToken, SCROLL_THRESHOLD_PX, SEARCH_DEBOUNCE_MS,
};
pub use query::{DEFAULT_PAGE_SIZE, PageOutcome, PageRequest, PageResult};
pub use view::{ListStatus, ListView};

// =============================================================================
// ERRORS
// =============================================================================

/// Errors raised while building core values from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PicklistError {
    /// The collection identifier is not one of the supported collections.
    #[error("unsupported collection: {0}")]
    UnsupportedCollection(String),

    /// A dependency filter could not be parsed.
    #[error("invalid dependency filter '{0}': expected field=value")]
    InvalidFilter(String),

    /// Page size must be at least 1.
    #[error("invalid page size: {0}")]
    InvalidPageSize(u32),
}

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Milliseconds on a caller-supplied monotonic clock.
///
/// The core never reads a clock itself; the app layer derives these from
/// a runtime instant so tests can drive time explicitly.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Timestamp `ms` milliseconds after this one.
    #[must_use]
    pub fn plus_ms(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is in the future).
    #[must_use]
    pub fn millis_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

// =============================================================================
// SELECT OPTION
// =============================================================================

/// One selectable remote record.
///
/// Identity is `id`. Display fields beyond `name` live in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl SelectOption {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Attach an extra display field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(field.into(), value.into());
        self
    }

    /// Read a field by name. `id` and `name` resolve to the core shape.
    #[must_use]
    pub fn field(&self, field: &str) -> Option<&str> {
        match field {
            "id" => Some(&self.id),
            "name" => Some(&self.name),
            other => self.extra.get(other).map(String::as_str),
        }
    }
}

// =============================================================================
// COLLECTION
// =============================================================================

/// The fixed set of remote collections a picker can query.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    Institutions,
    Locations,
    DegreePrograms,
    AcademicTerms,
    PeopleRecords,
    AcademicDisciplines,
    SpokenLanguages,
    SubjectSpecialities,
}

impl Collection {
    /// Every supported collection, in declaration order.
    pub const ALL: [Collection; 8] = [
        Collection::Institutions,
        Collection::Locations,
        Collection::DegreePrograms,
        Collection::AcademicTerms,
        Collection::PeopleRecords,
        Collection::AcademicDisciplines,
        Collection::SpokenLanguages,
        Collection::SubjectSpecialities,
    ];

    /// Wire identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Institutions => "institutions",
            Self::Locations => "locations",
            Self::DegreePrograms => "degree-programs",
            Self::AcademicTerms => "academic-terms",
            Self::PeopleRecords => "people-records",
            Self::AcademicDisciplines => "academic-disciplines",
            Self::SpokenLanguages => "spoken-languages",
            Self::SubjectSpecialities => "subject-specialities",
        }
    }

    /// Field the free-text search is matched against.
    #[must_use]
    pub fn search_field(self) -> &'static str {
        match self {
            Self::PeopleRecords => "full_name",
            Self::AcademicTerms => "label",
            _ => "name",
        }
    }

    /// Remote field shown as the option label.
    #[must_use]
    pub fn display_field(self) -> &'static str {
        self.search_field()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = PicklistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| PicklistError::UnsupportedCollection(s.to_string()))
    }
}

// =============================================================================
// QUERY CONTEXT
// =============================================================================

/// Cache key: one independent paging/search/selection slot.
///
/// The same collection used at two sites (add form vs edit form) gets two
/// contexts so their paging state never mixes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryContext {
    pub collection: Collection,
    pub location: String,
}

impl QueryContext {
    #[must_use]
    pub fn new(collection: Collection, location: impl Into<String>) -> Self {
        Self {
            collection,
            location: location.into(),
        }
    }
}

impl fmt::Display for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.collection, self.location)
    }
}

// =============================================================================
// DEPENDENCY FILTER
// =============================================================================

/// Value of a dependency filter, as taken from another form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(i64),
    Text(String),
    Null,
}

impl FilterValue {
    /// Parse a raw form value: `null` or empty is `Null`, canonical integers
    /// are `Number`. Anything that would not print back identically (`007`,
    /// `+5`) stays `Text`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == "null" {
            return Self::Null;
        }
        match raw.parse::<i64>() {
            Ok(n) if n.to_string() == raw => Self::Number(n),
            _ => Self::Text(raw.to_string()),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// String form used for equality matching against record fields.
    #[must_use]
    pub fn as_match_string(&self) -> Option<String> {
        match self {
            Self::Number(n) => Some(n.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Null => None,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
            Self::Null => f.write_str("null"),
        }
    }
}

/// A constraint derived from another field's current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyFilter {
    pub field: String,
    pub value: FilterValue,
}

impl DependencyFilter {
    #[must_use]
    pub fn new(field: impl Into<String>, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

impl FromStr for DependencyFilter {
    type Err = PicklistError;

    /// Parse `field=value`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s
            .split_once('=')
            .ok_or_else(|| PicklistError::InvalidFilter(s.to_string()))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(PicklistError::InvalidFilter(s.to_string()));
        }
        Ok(Self::new(field, FilterValue::parse(value)))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_roundtrips_through_wire_name() {
        for collection in Collection::ALL {
            assert_eq!(collection.as_str().parse::<Collection>(), Ok(collection));
        }
    }

    #[test]
    fn unknown_collection_is_rejected() {
        let err = "dormitories".parse::<Collection>();
        assert_eq!(
            err,
            Err(PicklistError::UnsupportedCollection("dormitories".into()))
        );
    }

    #[test]
    fn collection_display_is_wire_name() {
        assert_eq!(Collection::DegreePrograms.to_string(), "degree-programs");
    }

    #[test]
    fn search_fields_per_collection() {
        assert_eq!(Collection::Institutions.search_field(), "name");
        assert_eq!(Collection::PeopleRecords.search_field(), "full_name");
        assert_eq!(Collection::AcademicTerms.search_field(), "label");
    }

    #[test]
    fn option_field_lookup() {
        let opt = SelectOption::new("7", "Physics").with_field("faculty", "Science");
        assert_eq!(opt.field("id"), Some("7"));
        assert_eq!(opt.field("name"), Some("Physics"));
        assert_eq!(opt.field("faculty"), Some("Science"));
        assert_eq!(opt.field("missing"), None);
    }

    #[test]
    fn filter_parsing() {
        let f: DependencyFilter = "university_id=42".parse().expect("valid filter");
        assert_eq!(f.field, "university_id");
        assert_eq!(f.value, FilterValue::Number(42));

        let f: DependencyFilter = "country=NO".parse().expect("valid filter");
        assert_eq!(f.value, FilterValue::Text("NO".into()));

        let f: DependencyFilter = "country=null".parse().expect("valid filter");
        assert!(f.value.is_null());

        assert!("no-equals".parse::<DependencyFilter>().is_err());
        assert!("=value".parse::<DependencyFilter>().is_err());
    }

    #[test]
    fn non_canonical_integers_stay_text() {
        assert_eq!(FilterValue::parse("007"), FilterValue::Text("007".into()));
        assert_eq!(FilterValue::parse("+5"), FilterValue::Text("+5".into()));
        assert_eq!(FilterValue::parse("42"), FilterValue::Number(42));
        assert_eq!(FilterValue::parse("-3"), FilterValue::Number(-3));
        assert_eq!(FilterValue::parse(" 0 "), FilterValue::Number(0));
    }

    #[test]
    fn timestamp_arithmetic_saturates() {
        let t = Timestamp(100);
        assert_eq!(t.plus_ms(50), Timestamp(150));
        assert_eq!(Timestamp(150).millis_since(t), 50);
        assert_eq!(t.millis_since(Timestamp(150)), 0);
        assert_eq!(Timestamp(u64::MAX).plus_ms(1), Timestamp(u64::MAX));
    }

    #[test]
    fn context_display() {
        let ctx = QueryContext::new(Collection::Institutions, "add-form");
        assert_eq!(ctx.to_string(), "institutions@add-form");
    }
}
