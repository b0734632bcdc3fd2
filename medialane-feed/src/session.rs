//! Feed session controller: pagination state, fetch sequencing and filters
//! for one feed instance.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::{
    activity::{append_unique, Activity},
    config::{DEFAULT_GLOBAL_PAGE_SIZE, DEFAULT_SEARCH_DEBOUNCE_MS},
    debounce::Debouncer,
    error::FeedError,
    filter::{Filters, TypeFilter},
    source::{Cursor, EventSource, Scope},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    pub scope: Scope,
    pub page_size: usize,
    pub search_debounce: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            scope: Scope::Global,
            page_size: DEFAULT_GLOBAL_PAGE_SIZE,
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    LoadingMore,
    Ready,
    /// The last refresh failed; previously loaded pages are kept.
    Error,
}

/// What became of a refresh or load-more call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The fetch completed and its result was applied.
    Applied,
    /// Another fetch was in flight or there was nothing more to load.
    Ignored,
    /// The session was torn down while fetching; the result was dropped.
    Stale,
}

/// Snapshot of a session for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub scope: Scope,
    pub phase: Phase,
    /// Loaded activities after filtering, in feed order.
    pub activities: Vec<Activity>,
    /// Loaded activities before filtering.
    pub total_loaded: usize,
    pub loading: bool,
    pub loading_more: bool,
    pub error: Option<FeedError>,
    pub has_more: bool,
    pub search_query: String,
    pub settled_search: String,
    pub type_filter: TypeFilter,
    pub has_active_filters: bool,
}

struct State {
    scope: Scope,
    /// Bumped on teardown; fetch results of older generations are dropped.
    generation: u64,
    phase: Phase,
    in_flight: bool,
    activities: Vec<Activity>,
    cursor: Option<Cursor>,
    has_more: bool,
    error: Option<FeedError>,
    filters: Filters,
}

impl State {
    fn new(scope: Scope) -> Self {
        Self {
            scope,
            generation: 0,
            phase: Phase::Idle,
            in_flight: false,
            activities: Vec::new(),
            cursor: None,
            has_more: false,
            error: None,
            filters: Filters::default(),
        }
    }
}

/// One feed instance over an event source. Sessions share nothing with each
/// other; every scope gets its own page list and cursor.
pub struct FeedSession {
    source: Arc<dyn EventSource>,
    page_size: usize,
    state: Arc<Mutex<State>>,
    search: Debouncer,
}

impl FeedSession {
    pub fn new(source: Arc<dyn EventSource>, options: SessionOptions) -> Self {
        Self {
            source,
            page_size: options.page_size.max(1),
            state: Arc::new(Mutex::new(State::new(options.scope))),
            search: Debouncer::new(options.search_debounce),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock_state(&self.state)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn scope(&self) -> Scope {
        self.lock().scope.clone()
    }

    /// Reloads the first page. Loaded pages stay visible until the new page
    /// replaces them; on failure they are kept and the error is surfaced.
    pub async fn refresh(&self) -> Result<FetchOutcome, FeedError> {
        let (generation, scope) = {
            let mut state = self.lock();
            if state.in_flight {
                log::debug!("refresh ignored: fetch in flight for {}", state.scope);
                return Ok(FetchOutcome::Ignored);
            }
            state.in_flight = true;
            state.phase = Phase::Loading;
            state.error = None;
            (state.generation, state.scope.clone())
        };

        let in_flight = InFlight::new(&self.state, generation);
        let result = self.source.fetch(&scope, self.page_size, None).await;
        in_flight.settle();

        let mut state = self.lock();
        if state.generation != generation {
            log::debug!("dropping stale refresh result for {}", scope);
            return Ok(FetchOutcome::Stale);
        }
        state.in_flight = false;
        match result {
            Ok(page) => {
                let mut activities = Vec::with_capacity(page.activities.len());
                append_unique(&mut activities, page.activities);
                log::info!(
                    "{}: loaded first page with {} activities, more: {}",
                    scope,
                    activities.len(),
                    page.next_cursor.is_some()
                );
                state.activities = activities;
                state.has_more = page.next_cursor.is_some();
                state.cursor = page.next_cursor;
                state.phase = Phase::Ready;
                Ok(FetchOutcome::Applied)
            }
            Err(e) => {
                log::warn!("{}: refresh failed: {}", scope, e);
                let err = FeedError::from(e);
                state.error = Some(err.clone());
                state.phase = Phase::Error;
                Err(err)
            }
        }
    }

    /// Appends the next page. A no-op while another fetch is in flight or
    /// when the source is exhausted; a failure leaves loaded pages untouched.
    pub async fn load_more(&self) -> Result<FetchOutcome, FeedError> {
        let (generation, scope, cursor) = {
            let mut state = self.lock();
            if state.in_flight || !state.has_more {
                log::debug!(
                    "load more ignored for {}: in flight {}, has more {}",
                    state.scope,
                    state.in_flight,
                    state.has_more
                );
                return Ok(FetchOutcome::Ignored);
            }
            let cursor = match state.cursor.clone() {
                Some(cursor) => cursor,
                None => return Ok(FetchOutcome::Ignored),
            };
            state.in_flight = true;
            state.phase = Phase::LoadingMore;
            (state.generation, state.scope.clone(), cursor)
        };

        let in_flight = InFlight::new(&self.state, generation);
        let result = self
            .source
            .fetch(&scope, self.page_size, Some(&cursor))
            .await;
        in_flight.settle();

        let mut state = self.lock();
        if state.generation != generation {
            log::debug!("dropping stale page for {} at {}", scope, cursor);
            return Ok(FetchOutcome::Stale);
        }
        state.in_flight = false;
        state.phase = Phase::Ready;
        match result {
            Ok(page) => {
                let appended = append_unique(&mut state.activities, page.activities);
                log::info!(
                    "{}: appended {} activities ({} loaded), more: {}",
                    scope,
                    appended,
                    state.activities.len(),
                    page.next_cursor.is_some()
                );
                state.has_more = page.next_cursor.is_some();
                state.cursor = page.next_cursor;
                state.error = None;
                Ok(FetchOutcome::Applied)
            }
            Err(e) => {
                log::warn!("{}: load more failed at {}: {}", scope, cursor, e);
                let err = FeedError::from(e);
                state.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Records a keystroke; the filter sees it once the debounce settles.
    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.lock().filters.search_query = query.clone();

        let state = Arc::clone(&self.state);
        self.search.schedule(move |ticket| {
            let mut state = lock_state(&state);
            if ticket.is_current() {
                state.filters.settled_search = query;
            }
        });
    }

    pub fn set_type_filter(&self, type_filter: TypeFilter) {
        self.lock().filters.type_filter = type_filter;
    }

    pub fn has_active_filters(&self) -> bool {
        self.lock().filters.has_active()
    }

    /// Resets search and type filter, dropping any pending search.
    pub fn clear_filters(&self) {
        let mut state = self.lock();
        self.search.cancel();
        state.filters.clear();
    }

    pub fn dismiss_error(&self) {
        let mut state = self.lock();
        state.error = None;
        if state.phase == Phase::Error {
            state.phase = if state.activities.is_empty() {
                Phase::Idle
            } else {
                Phase::Ready
            };
        }
    }

    /// Tears the session down and starts over on `scope`. Fetches still in
    /// flight are discarded when they arrive.
    pub fn set_scope(&self, scope: Scope) {
        let mut state = self.lock();
        log::info!("switching feed scope from {} to {}", state.scope, scope);
        let generation = state.generation + 1;
        let filters = std::mem::take(&mut state.filters);
        *state = State::new(scope);
        state.generation = generation;
        state.filters = filters;
    }

    /// Discards any in-flight fetch and pending search.
    pub fn close(&self) {
        self.search.cancel();
        let mut state = self.lock();
        state.generation += 1;
        state.in_flight = false;
        if matches!(state.phase, Phase::Loading | Phase::LoadingMore) {
            state.phase = if state.activities.is_empty() {
                Phase::Idle
            } else {
                Phase::Ready
            };
        }
    }

    pub fn view(&self) -> ViewState {
        let state = self.lock();
        ViewState {
            scope: state.scope.clone(),
            phase: state.phase,
            activities: state.filters.apply(&state.activities),
            total_loaded: state.activities.len(),
            loading: state.phase == Phase::Loading,
            loading_more: state.phase == Phase::LoadingMore,
            error: state.error.clone(),
            has_more: state.has_more,
            search_query: state.filters.search_query.clone(),
            settled_search: state.filters.settled_search.clone(),
            type_filter: state.filters.type_filter,
            has_active_filters: state.filters.has_active(),
        }
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.search.cancel();
    }
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a fetch of `generation` as running. Dropped without [`settle`]
/// (the caller's future was dropped mid-fetch), it releases the session so
/// the next refresh or load-more is not ignored.
///
/// [`settle`]: InFlight::settle
struct InFlight<'a> {
    state: &'a Mutex<State>,
    generation: u64,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn new(state: &'a Mutex<State>, generation: u64) -> Self {
        Self {
            state,
            generation,
            settled: false,
        }
    }

    /// The fetch returned; the caller applies its result.
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = lock_state(self.state);
        if state.generation != self.generation || !state.in_flight {
            return;
        }
        log::debug!("{}: fetch abandoned before it completed", state.scope);
        state.in_flight = false;
        if matches!(state.phase, Phase::Loading | Phase::LoadingMore) {
            state.phase = if state.activities.is_empty() {
                Phase::Idle
            } else {
                Phase::Ready
            };
        }
    }
}
