//! # Dropdown Driver
//!
//! Async shell around one [`DropdownController`]. It owns the I/O the core
//! leaves out:
//!
//! - turning [`Timestamp`]s into runtime instants
//! - running every [`FetchCommand`] on a [`JoinSet`] through the registry
//! - firing the search debounce when its deadline passes
//! - publishing a fresh [`ListView`] after every change
//!
//! Several drivers may share one [`SharedCache`]; each (collection, location)
//! context keeps its own entry.

use crate::fetcher::FetcherRegistry;
use picklist_core::{
    Completion, DropdownController, FetchCommand, FetchKind, FilterValue, Key, ListView,
    PageOutcome, RequestToken, SelectCache, Timestamp,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Cache shared by every picker of a page.
pub type SharedCache = Arc<Mutex<SelectCache>>;

#[must_use]
pub fn shared_cache(ttl_ms: u64) -> SharedCache {
    Arc::new(Mutex::new(SelectCache::new(ttl_ms)))
}

// =============================================================================
// CLOCK
// =============================================================================

/// Millisecond clock anchored at creation, on tokio's (pausable) time.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        let elapsed = self.origin.elapsed().as_millis();
        Timestamp(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }

    #[must_use]
    pub fn instant_at(&self, at: Timestamp) -> Instant {
        self.origin + Duration::from_millis(at.0)
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// User interaction delivered to a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Externally supplied initial value (an id), or none.
    Initialize(Option<String>),
    Open,
    /// Click outside.
    Close,
    /// Search box contents changed.
    Input(String),
    /// Distance in pixels between the viewport bottom and the list end.
    Scroll { remaining_px: u32 },
    Key(Key),
    /// Click on an option.
    Select(String),
    ClearSelection,
    /// A parent field changed.
    SetDependency { field: String, value: FilterValue },
    /// Records of this picker's collection changed elsewhere. Every context
    /// of the collection refetches on next open; an open list reloads now.
    InvalidateCollection,
}

type FetchResult = (RequestToken, FetchKind, PageOutcome);

// =============================================================================
// DRIVER
// =============================================================================

pub struct DropdownDriver {
    controller: DropdownController,
    cache: SharedCache,
    registry: Arc<FetcherRegistry>,
    clock: Clock,
    in_flight: JoinSet<FetchResult>,
    updates: watch::Sender<ListView>,
}

impl DropdownDriver {
    /// Create a driver and the receiver its views are published on.
    pub async fn new(
        controller: DropdownController,
        cache: SharedCache,
        registry: Arc<FetcherRegistry>,
        clock: Clock,
    ) -> (Self, watch::Receiver<ListView>) {
        let view = controller.view(&*cache.lock().await);
        let (updates, receiver) = watch::channel(view);
        let driver = Self {
            controller,
            cache,
            registry,
            clock,
            in_flight: JoinSet::new(),
            updates,
        };
        (driver, receiver)
    }

    #[must_use]
    pub fn controller(&self) -> &DropdownController {
        &self.controller
    }

    /// Number of fetch tasks still running, including superseded ones.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Current view, computed from the shared cache.
    pub async fn view(&self) -> ListView {
        self.controller.view(&*self.cache.lock().await)
    }

    /// Apply one UI event.
    pub async fn handle(&mut self, event: UiEvent) {
        let now = self.clock.now();
        let command = {
            let mut cache = self.cache.lock().await;
            match event {
                UiEvent::Initialize(value) => {
                    self.controller.initialize(&mut cache, value.as_deref())
                }
                UiEvent::Open => self.controller.open(&mut cache, now),
                UiEvent::Close => {
                    self.controller.close();
                    None
                }
                UiEvent::Input(text) => {
                    self.controller.input_search(text, now);
                    None
                }
                UiEvent::Scroll { remaining_px } => self.controller.scroll(&cache, remaining_px),
                UiEvent::Key(key) => {
                    let outcome = self.controller.key(&mut cache, key);
                    debug!(?key, ?outcome, "key handled");
                    None
                }
                UiEvent::Select(id) => {
                    if self.controller.select(&mut cache, &id).is_none() {
                        debug!(%id, "select ignored: option not visible");
                    }
                    None
                }
                UiEvent::ClearSelection => {
                    self.controller.clear_selection(&mut cache);
                    None
                }
                UiEvent::SetDependency { field, value } => {
                    self.controller.set_dependency(&mut cache, &field, value)
                }
                UiEvent::InvalidateCollection => {
                    let collection = self.controller.context().collection;
                    let marked = cache.invalidate_collection(collection);
                    debug!(%collection, marked, "collection invalidated");
                    self.controller.revalidate(&mut cache, now)
                }
            }
        };
        if let Some(command) = command {
            self.spawn(command);
        }
        self.publish().await;
    }

    fn spawn(&mut self, command: FetchCommand) {
        debug!(
            token = %command.token,
            kind = ?command.kind,
            context = %command.context,
            page = command.request.page,
            search = %command.request.search_term,
            "fetch issued"
        );
        let registry = Arc::clone(&self.registry);
        self.in_flight.spawn(async move {
            let outcome = registry.fetch(&command.request).await;
            (command.token, command.kind, outcome)
        });
    }

    async fn fire_debounce(&mut self) {
        let now = self.clock.now();
        let command = {
            let mut cache = self.cache.lock().await;
            self.controller.poll_debounce(&mut cache, now)
        };
        if let Some(command) = command {
            self.spawn(command);
        }
        self.publish().await;
    }

    async fn finish(&mut self, joined: Result<FetchResult, JoinError>) {
        let (token, kind, outcome) = match joined {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "fetch task aborted");
                return;
            }
        };
        let now = self.clock.now();
        let retry = {
            let mut cache = self.cache.lock().await;
            match self.controller.complete(&mut cache, token, outcome, now) {
                Completion::Applied(kind) => {
                    debug!(%token, ?kind, "fetch applied");
                    None
                }
                Completion::Discarded => {
                    debug!(%token, ?kind, "stale response discarded");
                    self.controller.revalidate(&mut cache, now)
                }
            }
        };
        if let Some(command) = retry {
            self.spawn(command);
        }
        self.publish().await;
    }

    async fn publish(&self) {
        let view = self.view().await;
        self.updates.send_replace(view);
    }

    fn debounce_instant(&self) -> Option<Instant> {
        self.controller
            .debounce_deadline()
            .map(|at| self.clock.instant_at(at))
    }

    /// Process events until the sender side closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<UiEvent>) {
        loop {
            let deadline = self.debounce_instant();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.finish(joined).await;
                }
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_debounce().await;
                }
            }
        }
        debug!(context = %self.controller.context(), "driver stopped");
    }

    /// Let `duration` pass, handling completions and the debounce meanwhile.
    pub async fn advance(&mut self, duration: Duration) {
        let until = Instant::now() + duration;
        loop {
            let deadline = self.debounce_instant();
            tokio::select! {
                biased;
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.finish(joined).await;
                }
                () = tokio::time::sleep_until(deadline.unwrap_or(until)), if deadline.is_some_and(|d| d <= until) => {
                    self.fire_debounce().await;
                }
                () = tokio::time::sleep_until(until) => break,
            }
        }
    }

    /// Wait for every running fetch to finish. Does not fire the debounce.
    pub async fn drain(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            self.finish(joined).await;
        }
    }
}
