//! Debounced, cancellable address autocomplete.
//!
//! # Pipeline
//!
//! ```text
//! input("a")   -> too short: suggestions cleared, nothing sent
//! input("ab")  -> attempt 1 spawned (countdown)
//! input("abc") -> attempt 1 aborted, attempt 2 spawned
//!              ... debounce elapses ...
//!              -> GET /geocoding/autocomplete?q=abc&limit=5
//! ```
//!
//! Each attempt (countdown plus request) is one Tokio task. A newer input
//! aborts the previous task, so a pending fire and an in-flight request are
//! both cancelled. A generation counter is checked again under the state lock
//! before a result is applied, so a superseded result can never overwrite a
//! newer one. Search failures are logged and shown as an empty list.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use mapreviews_core::{LocationSuggestion, SelectedLocation};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::config::SearchConfig;

/// Observable search state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    /// Ranked candidates for `resolved_query`.
    pub suggestions: Vec<LocationSuggestion>,
    /// Whether a request is in flight.
    pub is_searching: bool,
    /// Whether the suggestion list should be shown.
    pub dropdown_open: bool,
    /// Query whose results are in `suggestions`.
    pub resolved_query: Option<String>,
}

/// Address autocomplete driven by keystrokes.
///
/// Cheap to clone; clones share state. Dropping the last clone cancels any
/// pending attempt.
#[derive(Clone)]
pub struct AddressSearch {
    inner: Arc<SearchInner>,
}

struct SearchInner {
    api: ApiClient,
    config: SearchConfig,
    state: watch::Sender<SearchState>,
    /// Bumped by every input, selection and clear
    generation: AtomicU64,
    attempt: Mutex<Option<JoinHandle<()>>>,
}

impl SearchInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Invalidate every outstanding attempt and abort the running one.
    fn supersede(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self
            .attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = previous {
            handle.abort();
        }
        self.state
            .send_if_modified(|state| std::mem::replace(&mut state.is_searching, false));
        generation
    }
}

impl Drop for SearchInner {
    fn drop(&mut self) {
        if let Some(handle) = self
            .attempt
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl AddressSearch {
    /// Create an idle search.
    #[must_use]
    pub fn new(api: ApiClient, config: SearchConfig) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            inner: Arc::new(SearchInner {
                api,
                config,
                state,
                generation: AtomicU64::new(0),
                attempt: Mutex::new(None),
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    /// Observe state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    /// Feed the current text of the address field.
    ///
    /// Restarts the countdown. A query shorter than the configured minimum
    /// (counted in characters) cancels pending work and clears the
    /// suggestions at once.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn input(&self, query: impl Into<String>) {
        let query = query.into();
        let generation = self.inner.supersede();

        if query.chars().count() < self.inner.config.min_chars {
            self.inner.state.send_modify(|state| {
                state.suggestions.clear();
                state.dropdown_open = false;
                state.resolved_query = None;
            });
            return;
        }

        let handle = tokio::spawn(run_attempt(
            Arc::downgrade(&self.inner),
            self.inner.api.clone(),
            self.inner.config,
            generation,
            query,
        ));

        let mut attempt = self
            .inner
            .attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // A newer input may have raced in between supersede and here
        if self.inner.is_current(generation) {
            *attempt = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// Choose a suggestion: clears the list, closes the dropdown and yields
    /// the structured location.
    pub fn select(&self, suggestion: &LocationSuggestion) -> SelectedLocation {
        self.inner.supersede();
        self.inner.state.send_modify(|state| {
            state.suggestions.clear();
            state.dropdown_open = false;
            state.resolved_query = None;
        });
        SelectedLocation::from(suggestion)
    }

    /// Choose the suggestion at `index` in the current list.
    pub fn select_index(&self, index: usize) -> Option<SelectedLocation> {
        let suggestion = self.inner.state.borrow().suggestions.get(index).cloned()?;
        Some(self.select(&suggestion))
    }

    /// Close the dropdown without selecting. Suggestions are kept.
    pub fn dismiss(&self) {
        self.inner
            .state
            .send_if_modified(|state| std::mem::replace(&mut state.dropdown_open, false));
    }

    /// Cancel pending work and reset to the idle state.
    pub fn clear(&self) {
        self.inner.supersede();
        self.inner.state.send_replace(SearchState::default());
    }
}

impl std::fmt::Debug for AddressSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSearch")
            .field("config", &self.inner.config)
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// One debounced attempt. Holds only a weak reference to the search while
/// waiting so an abandoned search is not kept alive.
async fn run_attempt(
    search: Weak<SearchInner>,
    api: ApiClient,
    config: SearchConfig,
    generation: u64,
    query: String,
) {
    tokio::time::sleep(config.debounce).await;

    {
        let Some(inner) = search.upgrade() else {
            return;
        };
        if !inner.is_current(generation) {
            return;
        }
        inner.state.send_modify(|state| {
            state.is_searching = true;
            state.dropdown_open = true;
        });
    }

    debug!(query = %query, "Searching addresses");
    let limit = config.limit.to_string();
    let outcome = api
        .get_json_with_query::<Vec<LocationSuggestion>>(
            &["geocoding", "autocomplete"],
            &[("q", query.as_str()), ("limit", limit.as_str())],
        )
        .await;

    let suggestions = outcome.unwrap_or_else(|e| {
        warn!(query = %query, error = %e, "Address search failed");
        Vec::new()
    });

    let Some(inner) = search.upgrade() else {
        return;
    };
    let applied = inner.state.send_if_modified(|state| {
        if !inner.is_current(generation) {
            return false;
        }
        state.suggestions = suggestions;
        state.is_searching = false;
        state.resolved_query = Some(query);
        true
    });
    if !applied {
        debug!(generation, "Discarded superseded search result");
    }
}
