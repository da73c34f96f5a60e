//! # Dropdown Controller
//!
//! State machine for one remote-backed, searchable, dependent picker.
//!
//! The controller never performs I/O. Every user event that needs data returns
//! a [`FetchCommand`]; the caller runs it and hands the [`PageOutcome`] back to
//! [`DropdownController::complete`] together with the command's token.
//!
//! ## Stale responses
//!
//! Each command carries a fresh [`RequestToken`]. The controller remembers the
//! one token it still expects per slot (base pages, search, selection
//! resolution). A completion whose token is not the expected one is
//! discarded, which covers superseded searches, dependency changes and
//! closes that happened while a fetch was in flight.
//!
//! Page fetches also record the cache generation they were issued under.
//! When the shared entry was reset or invalidated in the meantime (by this
//! picker or another one on the same context) the page is discarded and
//! [`DropdownController::revalidate`] reloads it.
//!
//! ## States
//!
//! ```text
//! Closed ──open (stale/empty)──► OpenLoading ──page──► OpenIdle
//! Closed ──open (fresh)────────────────────────────► OpenIdle
//! OpenIdle ──debounced search──► OpenSearching ──results──► OpenIdle
//! OpenIdle ──scroll near bottom──► OpenLoadingMore ──page──► OpenIdle
//! any open ──select / escape / click outside──► Closed
//! ```

use crate::cache::{SelectCache, merge_unique};
use crate::query::{DEFAULT_PAGE_SIZE, PageOutcome, PageRequest};
use crate::view::{ListStatus, ListView};
use crate::{DependencyFilter, FilterValue, QueryContext, SelectOption, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quiet period after the last keystroke before a search is issued.
pub const SEARCH_DEBOUNCE_MS: u64 = 500;

/// Distance from the bottom of the option list that triggers "load more".
pub const SCROLL_THRESHOLD_PX: u32 = 48;

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropdownState {
    #[default]
    Closed,
    OpenLoading,
    OpenIdle,
    OpenSearching,
    OpenLoadingMore,
}

impl DropdownState {
    #[must_use]
    pub fn is_open(self) -> bool {
        self != Self::Closed
    }

    #[must_use]
    pub fn is_loading(self) -> bool {
        matches!(
            self,
            Self::OpenLoading | Self::OpenSearching | Self::OpenLoadingMore
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::OpenLoading => "open-loading",
            Self::OpenIdle => "open-idle",
            Self::OpenSearching => "open-searching",
            Self::OpenLoadingMore => "open-loading-more",
        }
    }
}

impl fmt::Display for DropdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// COMMANDS AND COMPLETIONS
// =============================================================================

/// Tag identifying one issued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestToken(pub u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a fetch is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchKind {
    /// Page 0 of the cached list.
    FirstPage,
    /// A further page of the cached list.
    NextPage,
    /// Page 0 of a search.
    Search,
    /// A further page of a search.
    SearchNextPage,
    /// A single record by id, for the initial selection.
    Resolve,
}

/// A fetch the caller must perform on the controller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCommand {
    pub token: RequestToken,
    pub kind: FetchKind,
    pub context: QueryContext,
    pub request: PageRequest,
}

/// Result of handing a completed fetch back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The outcome was merged into state.
    Applied(FetchKind),
    /// Newer state superseded the request; the outcome was ignored.
    Discarded,
}

// =============================================================================
// INPUT
// =============================================================================

/// Keyboard input while the list is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Highlight moved; `None` means no row is highlighted.
    Moved(Option<usize>),
    /// The highlighted option was selected and the list closed.
    Committed(SelectOption),
    /// The list closed.
    Closed,
    Ignored,
}

/// Per-instance settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub page_size: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ControllerConfig {
    #[must_use]
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }
}

// =============================================================================
// INTERNAL STATE
// =============================================================================

/// Transient search results. Never written into the cache.
#[derive(Debug, Clone)]
struct SearchResults {
    term: String,
    items: Vec<SelectOption>,
    page: u32,
    has_more: bool,
}

#[derive(Debug, Clone)]
struct PendingSearch {
    term: String,
    deadline: Timestamp,
}

/// A request whose answer is still wanted.
#[derive(Debug, Clone)]
struct Expected {
    token: RequestToken,
    kind: FetchKind,
    page: u32,
    /// Search term, or target id for resolution.
    subject: String,
    /// Cache generation of the context when the request was issued.
    generation: u64,
}

#[derive(Debug, Clone, Default)]
struct InFlight {
    page: Option<Expected>,
    search: Option<Expected>,
    resolve: Option<Expected>,
}

impl InFlight {
    fn tokens(&self) -> Vec<RequestToken> {
        [&self.page, &self.search, &self.resolve]
            .into_iter()
            .flatten()
            .map(|e| e.token)
            .collect()
    }
}

fn take_expected(slot: &mut Option<Expected>, token: RequestToken) -> Option<Expected> {
    if slot.as_ref().is_some_and(|e| e.token == token) {
        slot.take()
    } else {
        None
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// One picker bound to one [`QueryContext`].
///
/// The cache is passed into every call so several controllers can share it.
#[derive(Debug, Clone)]
pub struct DropdownController {
    context: QueryContext,
    config: ControllerConfig,
    filters: Vec<DependencyFilter>,
    state: DropdownState,
    status: ListStatus,
    input: String,
    pending: Option<PendingSearch>,
    search: Option<SearchResults>,
    highlighted: Option<usize>,
    in_flight: InFlight,
    next_token: u64,
}

impl DropdownController {
    #[must_use]
    pub fn new(context: QueryContext, config: ControllerConfig) -> Self {
        Self {
            context,
            config,
            filters: Vec::new(),
            state: DropdownState::Closed,
            status: ListStatus::Idle,
            input: String::new(),
            pending: None,
            search: None,
            highlighted: None,
            in_flight: InFlight::default(),
            next_token: 0,
        }
    }

    /// Declare the dependency filters this picker starts with.
    #[must_use]
    pub fn with_filters(mut self, filters: Vec<DependencyFilter>) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn context(&self) -> &QueryContext {
        &self.context
    }

    #[must_use]
    pub fn config(&self) -> ControllerConfig {
        self.config
    }

    #[must_use]
    pub fn filters(&self) -> &[DependencyFilter] {
        &self.filters
    }

    #[must_use]
    pub fn state(&self) -> DropdownState {
        self.state
    }

    #[must_use]
    pub fn status(&self) -> ListStatus {
        self.status
    }

    #[must_use]
    pub fn search_input(&self) -> &str {
        &self.input
    }

    /// Term whose results are currently shown, if a search is active.
    #[must_use]
    pub fn active_search_term(&self) -> Option<&str> {
        self.search.as_ref().map(|s| s.term.as_str())
    }

    #[must_use]
    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    /// When the pending search fires, if one is pending.
    #[must_use]
    pub fn debounce_deadline(&self) -> Option<Timestamp> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Tokens whose completions would still be applied.
    #[must_use]
    pub fn awaiting(&self) -> Vec<RequestToken> {
        self.in_flight.tokens()
    }

    /// Options currently shown: search results while a search is active,
    /// otherwise the cached pages.
    #[must_use]
    pub fn visible_items<'a>(&'a self, cache: &'a SelectCache) -> &'a [SelectOption] {
        match &self.search {
            Some(search) => &search.items,
            None => &cache.peek(&self.context).items,
        }
    }

    #[must_use]
    pub fn selected<'a>(&self, cache: &'a SelectCache) -> Option<&'a SelectOption> {
        cache.peek(&self.context).selected_item.as_ref()
    }

    /// Label shown in the closed picker.
    #[must_use]
    pub fn display_label<'a>(&self, cache: &'a SelectCache) -> Option<&'a str> {
        self.selected(cache).map(|o| o.name.as_str())
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Apply an externally supplied initial value.
    ///
    /// If the id is already loaded it is selected directly. Otherwise a
    /// single-record fetch is issued; its result becomes the selection without
    /// being inserted into the paged items.
    pub fn initialize(
        &mut self,
        cache: &mut SelectCache,
        initial_value: Option<&str>,
    ) -> Option<FetchCommand> {
        let id = initial_value.map(str::trim).filter(|id| !id.is_empty())?;

        let (already_selected, loaded) = {
            let entry = cache.peek(&self.context);
            (
                entry.selected_item.as_ref().is_some_and(|s| s.id == id),
                entry.find(id).cloned(),
            )
        };
        if already_selected {
            return None;
        }
        if let Some(option) = loaded {
            cache.set_selected(&self.context, Some(option));
            return None;
        }

        let request = PageRequest::by_id(self.context.collection, id);
        let generation = cache.generation(&self.context);
        Some(self.issue(generation, FetchKind::Resolve, 0, id.to_string(), request))
    }

    /// Open the list. Fetches page 0 if the cached entry is stale or empty.
    pub fn open(&mut self, cache: &mut SelectCache, now: Timestamp) -> Option<FetchCommand> {
        if self.state.is_open() {
            return None;
        }
        self.highlighted = None;

        let stale = cache.is_stale(&self.context, now);
        let empty = cache.get(&self.context).items.is_empty();
        let generation = cache.generation(&self.context);

        if self
            .in_flight
            .page
            .as_ref()
            .is_some_and(|e| e.kind == FetchKind::FirstPage && e.generation == generation)
        {
            self.state = DropdownState::OpenLoading;
            self.status = ListStatus::Loading;
            return None;
        }

        if stale || empty {
            self.state = DropdownState::OpenLoading;
            self.status = ListStatus::Loading;
            return Some(self.fetch_first_page(cache));
        }

        self.state = DropdownState::OpenIdle;
        self.status = ListStatus::Ready;
        None
    }

    /// Close the list (click outside). Drops the transient search.
    pub fn close(&mut self) {
        self.state = DropdownState::Closed;
        self.highlighted = None;
        self.clear_search();
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    /// Record a keystroke in the search box. Returns the debounce deadline.
    ///
    /// Every call supersedes the previous pending search; only the last one
    /// ever fires.
    pub fn input_search(&mut self, text: impl Into<String>, now: Timestamp) -> Option<Timestamp> {
        if !self.state.is_open() {
            return None;
        }
        self.input = text.into();
        let deadline = now.plus_ms(SEARCH_DEBOUNCE_MS);
        self.pending = Some(PendingSearch {
            term: self.input.trim().to_string(),
            deadline,
        });
        Some(deadline)
    }

    /// Fire the pending search if its deadline has passed.
    ///
    /// An empty term restores the cached pages without fetching.
    pub fn poll_debounce(
        &mut self,
        cache: &mut SelectCache,
        now: Timestamp,
    ) -> Option<FetchCommand> {
        if !self.pending.as_ref().is_some_and(|p| now >= p.deadline) {
            return None;
        }
        let term = self.pending.take().map(|p| p.term).unwrap_or_default();
        self.highlighted = None;

        if term.is_empty() {
            self.search = None;
            self.in_flight.search = None;
            cache.set_search_term(&self.context, "");
            self.settle(cache);
            self.status = self.base_status(cache);
            return None;
        }

        let showing_same = self.in_flight.search.is_none()
            && self.search.as_ref().is_some_and(|s| s.term == term);
        let fetching_same = self
            .in_flight
            .search
            .as_ref()
            .is_some_and(|e| e.kind == FetchKind::Search && e.subject == term);
        if showing_same || fetching_same {
            return None;
        }

        cache.set_search_term(&self.context, term.clone());
        self.state = DropdownState::OpenSearching;
        self.status = ListStatus::Loading;
        let request = self.list_request(&term, 0);
        let generation = cache.generation(&self.context);
        Some(self.issue(generation, FetchKind::Search, 0, term, request))
    }

    // -------------------------------------------------------------------------
    // Paging
    // -------------------------------------------------------------------------

    /// Handle a scroll event, `remaining_px` from the bottom of the list.
    ///
    /// Issues at most one "load more" at a time and none once `has_more` is
    /// false.
    pub fn scroll(&mut self, cache: &SelectCache, remaining_px: u32) -> Option<FetchCommand> {
        if remaining_px > SCROLL_THRESHOLD_PX || self.state != DropdownState::OpenIdle {
            return None;
        }

        let generation = cache.generation(&self.context);
        if let Some(search) = &self.search {
            if !search.has_more || self.in_flight.search.is_some() {
                return None;
            }
            let term = search.term.clone();
            let page = search.page.saturating_add(1);
            let request = self.list_request(&term, page);
            let command = self.issue(generation, FetchKind::SearchNextPage, page, term, request);
            self.state = DropdownState::OpenLoadingMore;
            return Some(command);
        }

        let entry = cache.peek(&self.context);
        if !entry.has_more || !entry.is_loaded() || self.in_flight.page.is_some() {
            return None;
        }
        let page = entry.page.saturating_add(1);
        let request = self.list_request("", page);
        let command = self.issue(generation, FetchKind::NextPage, page, String::new(), request);
        self.state = DropdownState::OpenLoadingMore;
        Some(command)
    }

    // -------------------------------------------------------------------------
    // Completion
    // -------------------------------------------------------------------------

    /// Hand back the outcome of a previously issued command.
    ///
    /// Failures leave the cache untouched. A failed load-more keeps
    /// `has_more`, so scrolling again retries. A page issued before the
    /// context was last reset or invalidated is discarded.
    pub fn complete(
        &mut self,
        cache: &mut SelectCache,
        token: RequestToken,
        outcome: PageOutcome,
        now: Timestamp,
    ) -> Completion {
        if let Some(expected) = take_expected(&mut self.in_flight.resolve, token) {
            if let PageOutcome::Page(result) = outcome {
                if let Some(found) = result.data.into_iter().find(|o| o.id == expected.subject) {
                    cache.set_selected(&self.context, Some(found));
                }
            }
            return Completion::Applied(FetchKind::Resolve);
        }

        if let Some(expected) = take_expected(&mut self.in_flight.page, token) {
            if !cache.is_current(&self.context, expected.generation) {
                self.settle(cache);
                if self.search.is_none() && self.in_flight.search.is_none() {
                    self.status = self.base_status(cache);
                }
                return Completion::Discarded;
            }
            let status = match outcome {
                PageOutcome::Page(result) => {
                    cache.apply_page(&self.context, expected.page, result, now);
                    None
                }
                PageOutcome::Unsupported => Some(ListStatus::Unsupported),
                PageOutcome::Failed(_) => Some(ListStatus::Failed),
            };
            self.settle(cache);
            if self.search.is_none() && self.in_flight.search.is_none() {
                self.status = status.unwrap_or_else(|| self.base_status(cache));
            }
            return Completion::Applied(expected.kind);
        }

        if let Some(expected) = take_expected(&mut self.in_flight.search, token) {
            let failure = match outcome {
                PageOutcome::Page(result) => {
                    self.merge_search(&expected, result.data, result.has_more);
                    None
                }
                PageOutcome::Unsupported => Some(ListStatus::Unsupported),
                PageOutcome::Failed(_) => Some(ListStatus::Failed),
            };
            if failure.is_some() && expected.page == 0 {
                self.search = Some(SearchResults {
                    term: expected.subject.clone(),
                    items: Vec::new(),
                    page: 0,
                    has_more: false,
                });
            }
            self.settle(cache);
            self.status = failure.unwrap_or_else(|| {
                if self.visible_items(cache).is_empty() {
                    ListStatus::Empty
                } else {
                    ListStatus::Ready
                }
            });
            return Completion::Applied(expected.kind);
        }

        Completion::Discarded
    }

    fn merge_search(&mut self, expected: &Expected, data: Vec<SelectOption>, has_more: bool) {
        if expected.page == 0 {
            let mut items = Vec::with_capacity(data.len());
            merge_unique(&mut items, data);
            self.search = Some(SearchResults {
                term: expected.subject.clone(),
                items,
                page: 0,
                has_more,
            });
        } else if let Some(search) = self
            .search
            .as_mut()
            .filter(|s| s.term == expected.subject)
        {
            merge_unique(&mut search.items, data);
            search.page = expected.page;
            search.has_more = has_more;
        }
    }

    // -------------------------------------------------------------------------
    // Dependencies
    // -------------------------------------------------------------------------

    /// Update one dependency filter.
    ///
    /// A changed value resets the context (items, cursor and selection), drops
    /// every in-flight request and the transient search, and reloads if open.
    pub fn set_dependency(
        &mut self,
        cache: &mut SelectCache,
        field: &str,
        value: FilterValue,
    ) -> Option<FetchCommand> {
        match self.filters.iter_mut().find(|f| f.field == field) {
            Some(existing) if existing.value == value => return None,
            Some(existing) => existing.value = value,
            None => self.filters.push(DependencyFilter::new(field, value)),
        }

        cache.reset(&self.context);
        self.in_flight = InFlight::default();
        self.clear_search();
        self.highlighted = None;

        if self.state.is_open() {
            self.state = DropdownState::OpenLoading;
            self.status = ListStatus::Loading;
            Some(self.fetch_first_page(cache))
        } else {
            self.status = ListStatus::Idle;
            None
        }
    }

    /// Reload page 0 if the open list shows cached pages that went stale
    /// underneath it.
    ///
    /// Returns `None` while closed, while search results are shown or pending,
    /// and while a page fetch is already in flight.
    pub fn revalidate(&mut self, cache: &mut SelectCache, now: Timestamp) -> Option<FetchCommand> {
        if !self.state.is_open()
            || self.search.is_some()
            || self.in_flight.search.is_some()
            || self.in_flight.page.is_some()
            || !cache.is_stale(&self.context, now)
        {
            return None;
        }
        self.state = DropdownState::OpenLoading;
        self.status = ListStatus::Loading;
        Some(self.fetch_first_page(cache))
    }

    // -------------------------------------------------------------------------
    // Selection and keyboard
    // -------------------------------------------------------------------------

    /// Commit a visible option by id and close.
    pub fn select(&mut self, cache: &mut SelectCache, id: &str) -> Option<SelectOption> {
        let chosen = self
            .visible_items(cache)
            .iter()
            .find(|o| o.id == id)
            .cloned()?;
        cache.set_selected(&self.context, Some(chosen.clone()));
        self.in_flight.resolve = None;
        self.close();
        Some(chosen)
    }

    /// Clear the committed selection.
    pub fn clear_selection(&mut self, cache: &mut SelectCache) {
        cache.set_selected(&self.context, None);
        self.in_flight.resolve = None;
    }

    /// Arrow keys move a highlight clamped to the list (no wraparound).
    pub fn key(&mut self, cache: &mut SelectCache, key: Key) -> KeyOutcome {
        if !self.state.is_open() {
            return KeyOutcome::Ignored;
        }
        let len = self.visible_items(cache).len();

        match key {
            Key::ArrowDown => {
                self.highlighted = match (self.highlighted, len) {
                    (_, 0) => None,
                    (None, _) => Some(0),
                    (Some(i), n) => Some((i + 1).min(n - 1)),
                };
                KeyOutcome::Moved(self.highlighted)
            }
            Key::ArrowUp => {
                self.highlighted = match self.highlighted {
                    None | Some(0) => None,
                    Some(_) if len == 0 => None,
                    Some(i) => Some((i - 1).min(len - 1)),
                };
                KeyOutcome::Moved(self.highlighted)
            }
            Key::Enter => {
                let id = self
                    .highlighted
                    .and_then(|i| self.visible_items(cache).get(i))
                    .map(|o| o.id.clone());
                id.and_then(|id| self.select(cache, &id))
                    .map(KeyOutcome::Committed)
                    .unwrap_or(KeyOutcome::Ignored)
            }
            Key::Escape => {
                self.close();
                KeyOutcome::Closed
            }
        }
    }

    /// Render the current state.
    #[must_use]
    pub fn view(&self, cache: &SelectCache) -> ListView {
        let entry = cache.peek(&self.context);
        let has_more = match &self.search {
            Some(search) => search.has_more,
            None => entry.is_loaded() && entry.has_more,
        };
        ListView {
            context: self.context.clone(),
            state: self.state,
            status: self.status,
            search_input: self.input.clone(),
            showing_search: self.search.is_some(),
            items: self.visible_items(cache).to_vec(),
            highlighted: self.highlighted,
            selected: entry.selected_item.clone(),
            has_more,
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn issue(
        &mut self,
        generation: u64,
        kind: FetchKind,
        page: u32,
        subject: String,
        request: PageRequest,
    ) -> FetchCommand {
        self.next_token = self.next_token.saturating_add(1);
        let token = RequestToken(self.next_token);
        let expected = Expected {
            token,
            kind,
            page,
            subject,
            generation,
        };
        match kind {
            FetchKind::FirstPage | FetchKind::NextPage => self.in_flight.page = Some(expected),
            FetchKind::Search | FetchKind::SearchNextPage => self.in_flight.search = Some(expected),
            FetchKind::Resolve => self.in_flight.resolve = Some(expected),
        }
        FetchCommand {
            token,
            kind,
            context: self.context.clone(),
            request,
        }
    }

    fn list_request(&self, term: &str, page: u32) -> PageRequest {
        PageRequest::page(self.context.collection, term, page, self.config.page_size)
            .with_filters(self.filters.clone())
    }

    fn fetch_first_page(&mut self, cache: &mut SelectCache) -> FetchCommand {
        let generation = cache.register(&self.context);
        let request = self.list_request("", 0);
        self.issue(generation, FetchKind::FirstPage, 0, String::new(), request)
    }

    fn clear_search(&mut self) {
        self.input.clear();
        self.pending = None;
        self.search = None;
        self.in_flight.search = None;
    }

    fn base_status(&self, cache: &SelectCache) -> ListStatus {
        if self
            .in_flight
            .page
            .as_ref()
            .is_some_and(|e| e.kind == FetchKind::FirstPage)
        {
            ListStatus::Loading
        } else if cache.peek(&self.context).items.is_empty() {
            ListStatus::Empty
        } else {
            ListStatus::Ready
        }
    }

    /// Derive the open state from what is in flight and clamp the highlight.
    fn settle(&mut self, cache: &SelectCache) {
        if self.state.is_open() {
            let search_kind = self.in_flight.search.as_ref().map(|e| e.kind);
            let page_kind = self.in_flight.page.as_ref().map(|e| e.kind);
            self.state = match (search_kind, page_kind) {
                (Some(FetchKind::Search), _) => DropdownState::OpenSearching,
                (Some(_), _) => DropdownState::OpenLoadingMore,
                (None, _) if self.search.is_some() => DropdownState::OpenIdle,
                (None, Some(FetchKind::FirstPage)) => DropdownState::OpenLoading,
                (None, Some(_)) => DropdownState::OpenLoadingMore,
                (None, None) => DropdownState::OpenIdle,
            };
        }

        let len = self.visible_items(cache).len();
        self.highlighted = match self.highlighted {
            Some(_) if len == 0 => None,
            Some(i) => Some(i.min(len - 1)),
            None => None,
        };
    }
}

// =============================================================================
// TESTS
// =============================================================================
