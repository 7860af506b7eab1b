//! Photo markers collection.

use std::sync::Arc;

use mapreviews_core::{Email, Marker};
use reqwest::multipart::Form;
use tokio::sync::watch;
use tracing::instrument;

use super::FetchOrdering;
use super::collection::{Collection, CollectionState, OnFailure};
use crate::api::{ApiClient, ApiError, Attachment};

/// A marker to create: a place name geocoded by the backend and one photo.
#[derive(Debug, Clone)]
pub struct NewMarker {
    /// Place name.
    pub location_name: String,
    /// Photo, sent as the `image` part.
    pub image: Attachment,
}

impl NewMarker {
    fn into_form(self) -> Result<Form, ApiError> {
        Ok(Form::new()
            .text("location_name", self.location_name)
            .part("image", self.image.into_part()?))
    }
}

/// Cached markers of one owner at a time.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Markers {
    api: ApiClient,
    collection: Arc<Collection<Marker>>,
}

impl Markers {
    /// Create an empty markers collection.
    #[must_use]
    pub fn new(api: ApiClient, ordering: FetchOrdering) -> Self {
        Self {
            api,
            collection: Arc::new(Collection::new("markers", ordering)),
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> CollectionState<Marker> {
        self.collection.snapshot()
    }

    /// Observe state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<Marker>> {
        self.collection.subscribe()
    }

    /// Replace the cache with the caller's markers.
    #[instrument(skip(self))]
    pub async fn fetch_mine(&self) {
        self.collection
            .fetch(&self.api, &["maps", "markers"], OnFailure::KeepItems)
            .await;
    }

    /// Replace the cache with another user's markers. The backend records a
    /// visit to `owner`.
    ///
    /// On failure the cache is emptied so markers of a previously viewed
    /// owner are never shown under this one.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn fetch_for_owner(&self, owner: &Email) {
        self.collection
            .fetch(
                &self.api,
                &["maps", "markers", owner.as_str()],
                OnFailure::ClearItems,
            )
            .await;
    }

    /// Create a marker and append the server's copy to the cache.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the image cannot be encoded or the backend
    /// rejects the request. The failure is also recorded in `last_error`.
    #[instrument(skip(self, marker), fields(location = %marker.location_name))]
    pub async fn create(&self, marker: NewMarker) -> Result<Marker, ApiError> {
        self.collection
            .create(&self.api, &["maps", "markers"], marker.into_form())
            .await
    }
}

impl std::fmt::Debug for Markers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Markers")
            .field("items", &self.collection.snapshot().items.len())
            .finish_non_exhaustive()
    }
}
