//! # Context Cache
//!
//! One [`CacheEntry`] per [`QueryContext`], shared by every picker that uses
//! the same context.
//!
//! ## Design Principles
//!
//! - All data structures use BTreeMap for deterministic ordering
//! - No floating-point arithmetic
//! - Caller-supplied timestamps, never the wall clock
//!
//! ## Lifecycle
//!
//! Entries are created lazily on first write or fetch and never destroyed; `reset`
//! returns an entry to its empty state. An entry is stale when it was never
//! fetched, was invalidated, or its last fetch is older than the TTL.
//!
//! Every `reset` and invalidation bumps the entry's generation. A page fetch
//! records the generation it was issued under and its result is only merged
//! while that generation is still current.

use crate::query::PageResult;
use crate::{Collection, QueryContext, SelectOption, Timestamp};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// CACHE CONFIGURATION
// =============================================================================

/// Default time-to-live for a fetched entry (five minutes).
pub const DEFAULT_TTL_MS: u64 = 300_000;

static EMPTY_ENTRY: CacheEntry = CacheEntry::EMPTY;

// =============================================================================
// CACHE ENTRY
// =============================================================================

/// Paging, search and selection state of one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Loaded records in page order. No two share an id.
    pub items: Vec<SelectOption>,

    /// Last page merged into `items`.
    pub page: u32,

    /// Whether another page may exist. Once false, paging stops until reset.
    pub has_more: bool,

    /// Search term last committed for this context.
    pub search_term: String,

    /// Committed selection. Not necessarily present in `items`.
    pub selected_item: Option<SelectOption>,

    /// When `items` was last written by a fetch. `None` means never, or invalidated.
    pub last_fetched_at: Option<Timestamp>,

    /// Bumped by every reset and invalidation.
    pub generation: u64,
}

impl CacheEntry {
    /// The default-empty entry.
    pub const EMPTY: CacheEntry = CacheEntry {
        items: Vec::new(),
        page: 0,
        has_more: true,
        search_term: String::new(),
        selected_item: None,
        last_fetched_at: None,
        generation: 0,
    };

    /// Check whether an option with `id` is loaded.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|o| o.id == id)
    }

    /// Find a loaded option by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&SelectOption> {
        self.items.iter().find(|o| o.id == id)
    }

    /// Whether any page has been fetched since creation or the last reset.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.last_fetched_at.is_some()
    }

    fn merge(&mut self, items: Vec<SelectOption>) -> usize {
        merge_unique(&mut self.items, items)
    }

    fn invalidate(&mut self) {
        self.last_fetched_at = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Append options whose id is not yet in `target`. Returns how many were added.
pub(crate) fn merge_unique(target: &mut Vec<SelectOption>, items: Vec<SelectOption>) -> usize {
    let mut seen: BTreeSet<String> = target.iter().map(|o| o.id.clone()).collect();
    let before = target.len();
    for item in items {
        if seen.insert(item.id.clone()) {
            target.push(item);
        }
    }
    target.len() - before
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self::EMPTY
    }
}

// =============================================================================
// SELECT CACHE
// =============================================================================

/// Key-value store of picker state, keyed by [`QueryContext`].
///
/// Passed explicitly to each controller; nothing here is global.
#[derive(Debug)]
pub struct SelectCache {
    /// Cache storage: context -> entry.
    entries: BTreeMap<QueryContext, CacheEntry>,

    /// Age after which a fetched entry is stale.
    ttl_ms: u64,

    /// Statistics: lookups that found a loaded entry.
    hits: u64,

    /// Statistics: lookups that did not.
    misses: u64,
}

impl Default for SelectCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_MS)
    }
}

impl SelectCache {
    /// Create a cache whose entries go stale after `ttl_ms`.
    #[must_use]
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            ttl_ms,
            hits: 0,
            misses: 0,
        }
    }

    #[must_use]
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Look up the entry for `context`, or the default-empty entry.
    ///
    /// Counts a hit when the entry has been fetched, a miss otherwise.
    pub fn get(&mut self, context: &QueryContext) -> &CacheEntry {
        let loaded = self
            .entries
            .get(context)
            .map(CacheEntry::is_loaded)
            .unwrap_or(false);
        if loaded {
            self.hits = self.hits.saturating_add(1);
        } else {
            self.misses = self.misses.saturating_add(1);
        }
        self.peek(context)
    }

    /// Look up without touching statistics.
    #[must_use]
    pub fn peek(&self, context: &QueryContext) -> &CacheEntry {
        self.entries.get(context).unwrap_or(&EMPTY_ENTRY)
    }

    fn entry_mut(&mut self, context: &QueryContext) -> &mut CacheEntry {
        self.entries.entry(context.clone()).or_default()
    }

    /// Current generation of `context`. Missing entries are at generation 0.
    #[must_use]
    pub fn generation(&self, context: &QueryContext) -> u64 {
        self.peek(context).generation
    }

    /// Make sure `context` has an entry and return its generation.
    ///
    /// Called before a fetch is issued so that invalidating the collection
    /// reaches contexts whose first page is still in flight.
    pub fn register(&mut self, context: &QueryContext) -> u64 {
        self.entry_mut(context).generation
    }

    /// Whether a fetch issued under `generation` may still write to `context`.
    #[must_use]
    pub fn is_current(&self, context: &QueryContext, generation: u64) -> bool {
        self.generation(context) == generation
    }

    /// Replace the full item list with a fresh first page.
    ///
    /// Duplicate ids inside `items` keep their first occurrence.
    pub fn set_items(&mut self, context: &QueryContext, items: Vec<SelectOption>, now: Timestamp) {
        let entry = self.entry_mut(context);
        entry.items.clear();
        entry.merge(items);
        entry.page = 0;
        entry.last_fetched_at = Some(now);
    }

    /// Append a further page, skipping ids already present.
    ///
    /// Returns the number of options actually added.
    pub fn append_items(
        &mut self,
        context: &QueryContext,
        items: Vec<SelectOption>,
        now: Timestamp,
    ) -> usize {
        let entry = self.entry_mut(context);
        let added = entry.merge(items);
        entry.last_fetched_at = Some(now);
        added
    }

    /// Merge the result of fetching `page` and advance the cursor.
    ///
    /// Page 0 replaces the list; later pages append.
    pub fn apply_page(
        &mut self,
        context: &QueryContext,
        page: u32,
        result: PageResult,
        now: Timestamp,
    ) -> usize {
        let has_more = result.has_more;
        let added = if page == 0 {
            self.set_items(context, result.data, now);
            self.peek(context).items.len()
        } else {
            self.append_items(context, result.data, now)
        };
        let entry = self.entry_mut(context);
        entry.page = page;
        entry.has_more = has_more;
        added
    }

    /// Set or clear the committed selection.
    pub fn set_selected(&mut self, context: &QueryContext, option: Option<SelectOption>) {
        self.entry_mut(context).selected_item = option;
    }

    /// Record the search term committed for `context`.
    pub fn set_search_term(&mut self, context: &QueryContext, term: impl Into<String>) {
        self.entry_mut(context).search_term = term.into();
    }

    /// Return `context` to the default-empty entry and start a new generation.
    pub fn reset(&mut self, context: &QueryContext) {
        let entry = self.entry_mut(context);
        let generation = entry.generation.wrapping_add(1);
        *entry = CacheEntry {
            generation,
            ..CacheEntry::EMPTY
        };
    }

    /// Whether `context` must be refetched before its items are trusted.
    #[must_use]
    pub fn is_stale(&self, context: &QueryContext, now: Timestamp) -> bool {
        match self.entries.get(context).and_then(|e| e.last_fetched_at) {
            Some(fetched) => now.millis_since(fetched) >= self.ttl_ms,
            None => true,
        }
    }

    /// Mark one context stale without dropping its items.
    ///
    /// Fetches already in flight for `context` can no longer refresh it.
    pub fn invalidate(&mut self, context: &QueryContext) {
        self.entry_mut(context).invalidate();
    }

    /// Mark every context of `collection` stale. Returns how many were touched.
    pub fn invalidate_collection(&mut self, collection: Collection) -> usize {
        let mut touched = 0;
        for (context, entry) in &mut self.entries {
            if context.collection == collection {
                entry.invalidate();
                touched += 1;
            }
        }
        touched
    }

    /// Number of contexts with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All known contexts (deterministic order).
    pub fn contexts(&self) -> impl Iterator<Item = &QueryContext> {
        self.entries.keys()
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            hit_rate_percent: self.hit_rate_percent(),
        }
    }

    /// Calculate hit rate as integer percentage (0-100).
    #[must_use]
    pub fn hit_rate_percent(&self) -> u8 {
        let total = self.hits.saturating_add(self.misses);
        if total == 0 {
            0
        } else {
            ((self.hits.saturating_mul(100)) / total) as u8
        }
    }
}

// =============================================================================
// CACHE STATISTICS
// =============================================================================

/// Statistics about cache lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of contexts.
    pub size: usize,

    /// Lookups that found fetched data.
    pub hits: u64,

    /// Lookups that did not.
    pub misses: u64,

    /// Hit rate as integer percentage (0-100).
    pub hit_rate_percent: u8,
}

// =============================================================================
// TESTS
// =============================================================================
