//! Visits collection (read-only).

use std::sync::Arc;

use mapreviews_core::Visit;
use tokio::sync::watch;
use tracing::instrument;

use super::FetchOrdering;
use super::collection::{Collection, CollectionState, OnFailure};
use crate::api::ApiClient;

/// Cached visits to the caller's map.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Visits {
    api: ApiClient,
    collection: Arc<Collection<Visit>>,
}

impl Visits {
    /// Create an empty visits collection.
    #[must_use]
    pub fn new(api: ApiClient, ordering: FetchOrdering) -> Self {
        Self {
            api,
            collection: Arc::new(Collection::new("visits", ordering)),
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> CollectionState<Visit> {
        self.collection.snapshot()
    }

    /// Observe state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<Visit>> {
        self.collection.subscribe()
    }

    /// Replace the cache with the visits received by the caller.
    #[instrument(skip(self))]
    pub async fn fetch(&self) {
        self.collection
            .fetch(&self.api, &["social", "visits"], OnFailure::KeepItems)
            .await;
    }
}

impl std::fmt::Debug for Visits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visits")
            .field("items", &self.collection.snapshot().items.len())
            .finish_non_exhaustive()
    }
}
