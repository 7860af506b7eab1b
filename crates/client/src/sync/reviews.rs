//! Reviews collection.

use std::sync::Arc;

use mapreviews_core::{Rating, Review, ReviewId};
use reqwest::multipart::Form;
use tokio::sync::watch;
use tracing::instrument;

use super::FetchOrdering;
use super::collection::{Collection, CollectionState, OnFailure};
use crate::api::{ApiClient, ApiError, Attachment};

/// Fields of a review to create. Coordinates, author and timestamps are
/// filled in by the backend.
#[derive(Debug, Clone)]
pub struct NewReview {
    /// Name of the establishment.
    pub establishment_name: String,
    /// Postal address, geocoded by the backend.
    pub address: String,
    /// Star rating.
    pub rating: Rating,
    /// Photos, uploaded in order.
    pub images: Vec<Attachment>,
}

impl NewReview {
    /// Build the multipart payload: text fields plus one `images` part per
    /// attachment.
    fn into_form(self) -> Result<Form, ApiError> {
        let mut form = Form::new()
            .text("establishment_name", self.establishment_name)
            .text("address", self.address)
            .text("rating", self.rating.to_string());
        for image in self.images {
            form = form.part("images", image.into_part()?);
        }
        Ok(form)
    }
}

/// Partial update of a review. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewPatch {
    /// New establishment name.
    pub establishment_name: Option<String>,
    /// New address (re-geocoded by the backend).
    pub address: Option<String>,
    /// New rating.
    pub rating: Option<Rating>,
}

impl ReviewPatch {
    /// Whether no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.establishment_name.is_none() && self.address.is_none() && self.rating.is_none()
    }

    fn into_form(self) -> Form {
        let mut form = Form::new();
        if let Some(name) = self.establishment_name {
            form = form.text("establishment_name", name);
        }
        if let Some(address) = self.address {
            form = form.text("address", address);
        }
        if let Some(rating) = self.rating {
            form = form.text("rating", rating.to_string());
        }
        form
    }
}

/// Cached reviews with CRUD operations.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Reviews {
    api: ApiClient,
    collection: Arc<Collection<Review>>,
}

impl Reviews {
    /// Create an empty reviews collection.
    #[must_use]
    pub fn new(api: ApiClient, ordering: FetchOrdering) -> Self {
        Self {
            api,
            collection: Arc::new(Collection::new("reviews", ordering)),
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> CollectionState<Review> {
        self.collection.snapshot()
    }

    /// Observe state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<Review>> {
        self.collection.subscribe()
    }

    /// Fetch ordering policy in effect.
    #[must_use]
    pub fn ordering(&self) -> FetchOrdering {
        self.collection.ordering()
    }

    /// Replace the cache with every review. On failure the previous items
    /// stay and `last_error` is set.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) {
        self.collection
            .fetch(&self.api, &["reviews", ""], OnFailure::KeepItems)
            .await;
    }

    /// Replace the cache with the caller's reviews. On failure the previous
    /// items stay and `last_error` is set.
    #[instrument(skip(self))]
    pub async fn fetch_mine(&self) {
        self.collection
            .fetch(&self.api, &["reviews", "mine"], OnFailure::KeepItems)
            .await;
    }

    /// Fetch one review and focus it. Returns `None` on failure, with
    /// `last_error` set.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn fetch_one(&self, id: &ReviewId) -> Option<Review> {
        self.collection
            .fetch_focused(&self.api, &["reviews", id.as_str()])
            .await
    }

    /// Create a review and append the server's copy to the cache.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if an image cannot be encoded or the backend
    /// rejects the request. The failure is also recorded in `last_error`.
    #[instrument(skip(self, review), fields(images = review.images.len()))]
    pub async fn create(&self, review: NewReview) -> Result<Review, ApiError> {
        self.collection
            .create(&self.api, &["reviews", ""], review.into_form())
            .await
    }

    /// Apply a partial update and replace the cached review in place.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the backend rejects the request. The failure is
    /// also recorded in `last_error`.
    #[instrument(skip(self, patch), fields(id = %id))]
    pub async fn update(&self, id: &ReviewId, patch: ReviewPatch) -> Result<Review, ApiError> {
        self.collection
            .update(&self.api, &["reviews", id.as_str()], Ok(patch.into_form()))
            .await
    }

    /// Delete a review. Returns `false` (with `last_error` set) on failure.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn remove(&self, id: &ReviewId) -> bool {
        self.collection
            .remove(&self.api, &["reviews", id.as_str()], id)
            .await
    }

    /// Set or clear the focused review locally.
    pub fn focus(&self, review: Option<Review>) {
        self.collection.set_focused(review);
    }
}

impl std::fmt::Debug for Reviews {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reviews")
            .field("ordering", &self.ordering())
            .field("items", &self.collection.snapshot().items.len())
            .finish_non_exhaustive()
    }
}
