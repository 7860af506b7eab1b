//! Generic cached collection state machine.

use std::sync::atomic::{AtomicU64, Ordering};

use mapreviews_core::{Entity, ErrorKind};
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::FetchOrdering;
use crate::api::{ApiClient, ApiError};

/// A recorded failure, kept in [`CollectionState::last_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl From<&ApiError> for SyncFailure {
    fn from(error: &ApiError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Observable state of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<T> {
    /// Cached entities, in server order followed by local appends.
    pub items: Vec<T>,
    /// Whether an operation is outstanding. Any completion clears it.
    pub is_loading: bool,
    /// Failure of the most recent failed operation, cleared when the next
    /// operation starts.
    pub last_error: Option<SyncFailure>,
    /// Entity shown in a detail view.
    pub focused: Option<T>,
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            is_loading: false,
            last_error: None,
            focused: None,
        }
    }
}

impl<T: Entity> CollectionState<T> {
    /// Look up a cached entity by id.
    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }
}

/// What a failed fetch does to the cached items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnFailure {
    /// Keep the previous items (stale but visible).
    KeepItems,
    /// Drop the previous items so nothing from another scope stays visible.
    ClearItems,
}

/// Sequence number of an issued fetch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FetchTicket(u64);

/// Cached collection of entities behind a `watch` channel.
///
/// Each transition is one `send_modify`/`send_if_modified` call, so it is
/// applied atomically with respect to observers and to other operations.
pub(crate) struct Collection<T> {
    /// Name used in log events
    name: &'static str,
    state: watch::Sender<CollectionState<T>>,
    ordering: FetchOrdering,
    /// Last sequence number handed out
    issued: AtomicU64,
    /// Highest sequence number whose result was applied
    applied: AtomicU64,
}

impl<T: Entity> Collection<T> {
    pub(crate) fn new(name: &'static str, ordering: FetchOrdering) -> Self {
        let (state, _) = watch::channel(CollectionState::default());
        Self {
            name,
            state,
            ordering,
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
        }
    }

    pub(crate) const fn ordering(&self) -> FetchOrdering {
        self.ordering
    }

    pub(crate) fn snapshot(&self) -> CollectionState<T> {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<CollectionState<T>> {
        self.state.subscribe()
    }

    /// Mark an operation as started.
    pub(crate) fn begin(&self) {
        self.state.send_modify(|state| {
            state.is_loading = true;
            state.last_error = None;
        });
    }

    /// Mark a list fetch as started and stamp it.
    pub(crate) fn begin_fetch(&self) -> FetchTicket {
        let ticket = FetchTicket(self.issued.fetch_add(1, Ordering::Relaxed) + 1);
        self.begin();
        ticket
    }

    /// Apply the outcome of a list fetch.
    ///
    /// Returns `false` when the outcome was discarded as stale, which only
    /// happens under [`FetchOrdering::LatestIssued`].
    pub(crate) fn finish_fetch(
        &self,
        ticket: FetchTicket,
        outcome: Result<Vec<T>, &ApiError>,
        on_failure: OnFailure,
    ) -> bool {
        let applied = self.state.send_if_modified(|state| {
            if self.ordering == FetchOrdering::LatestIssued {
                if ticket.0 < self.applied.load(Ordering::Relaxed) {
                    return false;
                }
                self.applied.store(ticket.0, Ordering::Relaxed);
            }

            match outcome {
                Ok(items) => state.items = items,
                Err(error) => {
                    state.last_error = Some(error.into());
                    if on_failure == OnFailure::ClearItems {
                        state.items.clear();
                    }
                }
            }
            state.is_loading = false;
            true
        });

        if !applied {
            debug!(
                collection = self.name,
                sequence = ticket.0,
                "Discarded stale fetch result"
            );
        }
        applied
    }

    /// Append a created entity at the end.
    pub(crate) fn apply_created(&self, item: T) {
        self.state.send_modify(|state| {
            state.items.push(item);
            state.is_loading = false;
        });
    }

    /// Replace the cached entity with the same id, in place.
    ///
    /// An entity that is no longer cached is not re-added.
    pub(crate) fn apply_updated(&self, item: T) {
        self.state.send_modify(|state| {
            if let Some(focused) = state.focused.as_mut()
                && focused.id() == item.id()
            {
                *focused = item.clone();
            }
            if let Some(slot) = state.items.iter_mut().find(|cached| cached.id() == item.id()) {
                *slot = item;
            }
            state.is_loading = false;
        });
    }

    /// Drop the cached entity with `id`.
    pub(crate) fn apply_removed(&self, id: &T::Id) {
        self.state.send_modify(|state| {
            state.items.retain(|item| item.id() != id);
            if state.focused.as_ref().is_some_and(|item| item.id() == id) {
                state.focused = None;
            }
            state.is_loading = false;
        });
    }

    /// Show a fetched entity in the detail view.
    pub(crate) fn apply_focused(&self, item: T) {
        self.state.send_modify(|state| {
            state.focused = Some(item);
            state.is_loading = false;
        });
    }

    /// Record a failed operation, leaving the items untouched.
    pub(crate) fn record_failure(&self, error: &ApiError) {
        self.state.send_modify(|state| {
            state.last_error = Some(error.into());
            state.is_loading = false;
        });
    }

    /// Set or clear the focused entity without contacting the backend.
    pub(crate) fn set_focused(&self, item: Option<T>) {
        self.state.send_modify(|state| state.focused = item);
    }
}

// =============================================================================
// Remote operations
// =============================================================================

impl<T: Entity + DeserializeOwned> Collection<T> {
    /// GET a list and apply it according to the fetch ordering.
    pub(crate) async fn fetch(&self, api: &ApiClient, segments: &[&str], on_failure: OnFailure) {
        let ticket = self.begin_fetch();
        match api.get_json::<Vec<T>>(segments).await {
            Ok(items) => {
                debug!(collection = self.name, count = items.len(), "Fetched");
                self.finish_fetch(ticket, Ok(items), on_failure);
            }
            Err(e) => {
                warn!(collection = self.name, error = %e, "Fetch failed");
                self.finish_fetch(ticket, Err(&e), on_failure);
            }
        }
    }

    /// GET one entity and focus it.
    pub(crate) async fn fetch_focused(&self, api: &ApiClient, segments: &[&str]) -> Option<T> {
        self.begin();
        match api.get_json::<T>(segments).await {
            Ok(item) => {
                self.apply_focused(item.clone());
                Some(item)
            }
            Err(e) => {
                warn!(collection = self.name, error = %e, "Fetch of one entity failed");
                self.record_failure(&e);
                None
            }
        }
    }

    /// POST a multipart form and append the created entity.
    pub(crate) async fn create(
        &self,
        api: &ApiClient,
        segments: &[&str],
        form: Result<Form, ApiError>,
    ) -> Result<T, ApiError> {
        self.begin();
        let outcome = match form {
            Ok(form) => api.post_multipart::<T>(segments, form).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(item) => {
                debug!(collection = self.name, id = %item.id(), "Created");
                self.apply_created(item.clone());
                Ok(item)
            }
            Err(e) => {
                warn!(collection = self.name, error = %e, "Create failed");
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    /// PUT a multipart form and replace the updated entity in place.
    pub(crate) async fn update(
        &self,
        api: &ApiClient,
        segments: &[&str],
        form: Result<Form, ApiError>,
    ) -> Result<T, ApiError> {
        self.begin();
        let outcome = match form {
            Ok(form) => api.put_multipart::<T>(segments, form).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(item) => {
                debug!(collection = self.name, id = %item.id(), "Updated");
                self.apply_updated(item.clone());
                Ok(item)
            }
            Err(e) => {
                warn!(collection = self.name, error = %e, "Update failed");
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    /// DELETE an entity. Reports the outcome as a boolean.
    pub(crate) async fn remove(&self, api: &ApiClient, segments: &[&str], id: &T::Id) -> bool {
        self.begin();
        match api.delete(segments).await {
            Ok(()) => {
                debug!(collection = self.name, id = %id, "Removed");
                self.apply_removed(id);
                true
            }
            Err(e) => {
                warn!(collection = self.name, id = %id, error = %e, "Remove failed");
                self.record_failure(&e);
                false
            }
        }
    }
}
