//! Integration tests for the reviews collection.

use std::time::Duration;

use mapreviews_client::{Attachment, FetchOrdering, NewReview, ReviewPatch, Reviews};
use mapreviews_core::{ErrorKind, Rating, ReviewId};
use mapreviews_integration_tests::{ANA_EMAIL, BOB_EMAIL, TestContext};

fn rating(value: u8) -> Rating {
    Rating::new(value).unwrap()
}

fn new_review(name: &str, address: &str, stars: u8) -> NewReview {
    NewReview {
        establishment_name: name.to_string(),
        address: address.to_string(),
        rating: rating(stars),
        images: Vec::new(),
    }
}

// =============================================================================
// Fetch
// =============================================================================

#[tokio::test]
async fn test_fetch_all_replaces_items() {
    let ctx = TestContext::new().await;
    ctx.backend.insert_review(ANA_EMAIL, "Bar Pepe", 4);
    ctx.backend.insert_review(BOB_EMAIL, "Casa Lola", 5);
    let session = ctx.anonymous().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);

    reviews.fetch_all().await;

    let state = reviews.snapshot();
    assert!(!state.is_loading);
    assert!(state.last_error.is_none());
    let names: Vec<_> = state
        .items
        .iter()
        .map(|r| r.establishment_name.as_str())
        .collect();
    assert_eq!(names, ["Bar Pepe", "Casa Lola"]);
    assert_eq!(state.items[1].author_email.as_str(), BOB_EMAIL);
}

#[tokio::test]
async fn test_fetch_mine_is_scoped_to_caller() {
    let ctx = TestContext::new().await;
    ctx.backend.insert_review(ANA_EMAIL, "Bar Pepe", 4);
    ctx.backend.insert_review(BOB_EMAIL, "Casa Lola", 5);
    let session = ctx.signed_in().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);

    reviews.fetch_mine().await;

    let state = reviews.snapshot();
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].author_email.as_str(), ANA_EMAIL);
}

#[tokio::test]
async fn test_fetch_failure_keeps_previous_items() {
    let ctx = TestContext::new().await;
    ctx.backend.insert_review(ANA_EMAIL, "Bar Pepe", 4);
    let session = ctx.anonymous().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);
    reviews.fetch_all().await;

    ctx.backend
        .fail_next("GET", "/v1/reviews/", 500, "database unavailable");
    reviews.fetch_all().await;

    let state = reviews.snapshot();
    assert!(!state.is_loading);
    assert_eq!(state.items.len(), 1);
    let failure = state.last_error.expect("Failure should be recorded");
    assert_eq!(failure.kind, ErrorKind::ServerFailure);
    assert!(failure.message.contains("database unavailable"));

    // The next success clears the recorded failure
    reviews.fetch_all().await;
    assert!(reviews.snapshot().last_error.is_none());
}

#[tokio::test]
async fn test_fetch_one_focuses_review() {
    let ctx = TestContext::new().await;
    let id = ctx.backend.insert_review(ANA_EMAIL, "Bar Pepe", 4);
    let session = ctx.anonymous().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);

    let review = reviews.fetch_one(&ReviewId::new(&id)).await.unwrap();

    assert_eq!(review.establishment_name, "Bar Pepe");
    assert_eq!(reviews.snapshot().focused, Some(review));
    assert!(reviews.snapshot().items.is_empty());
}

#[tokio::test]
async fn test_fetch_one_missing_records_not_found() {
    let ctx = TestContext::new().await;
    let session = ctx.anonymous().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);

    let review = reviews.fetch_one(&ReviewId::new("missing")).await;

    assert!(review.is_none());
    let state = reviews.snapshot();
    assert!(state.focused.is_none());
    assert_eq!(state.last_error.map(|f| f.kind), Some(ErrorKind::NotFound));
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_create_appends_server_copy_once() {
    let ctx = TestContext::new().await;
    ctx.backend.insert_review(BOB_EMAIL, "Casa Lola", 5);
    let session = ctx.signed_in().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);
    reviews.fetch_all().await;

    let mut review = new_review("Bar Pepe", "Calle Larios 5", 4);
    review.images = vec![
        Attachment::new("front.jpg", "image/jpeg", vec![1, 2, 3]),
        Attachment::new("menu.png", "image/png", vec![4, 5]),
    ];
    let created = reviews.create(review).await.unwrap();

    let state = reviews.snapshot();
    assert_eq!(state.items.len(), 2);
    assert_eq!(state.items.last(), Some(&created));
    assert_eq!(created.author_email.as_str(), ANA_EMAIL);
    assert_eq!(created.rating.stars(), 4);
    assert_eq!(
        created.images,
        ["https://img.test/front.jpg", "https://img.test/menu.png"]
    );

    let forms = ctx.backend.forms();
    assert_eq!(forms.len(), 1);
    let form = &forms[0];
    assert_eq!(form.fields["establishment_name"], "Bar Pepe");
    assert_eq!(form.fields["address"], "Calle Larios 5");
    assert_eq!(form.fields["rating"], "4");
    assert_eq!(form.files.len(), 2);
    assert!(form.files.iter().all(|f| f.field == "images"));
    assert_eq!(form.files[0].content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(form.files[1].len, 2);
}

#[tokio::test]
async fn test_concurrent_creates_append_in_completion_order() {
    let ctx = TestContext::new().await;
    ctx.backend
        .delay_review_create("A", Duration::from_millis(300));
    let session = ctx.signed_in().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);

    let slow = {
        let reviews = reviews.clone();
        tokio::spawn(async move { reviews.create(new_review("A", "Calle A 1", 3)).await })
    };
    // Login plus the first create
    ctx.backend.wait_for_requests(2).await;

    reviews
        .create(new_review("B", "Calle B 2", 4))
        .await
        .unwrap();
    slow.await.unwrap().unwrap();

    let names: Vec<_> = reviews
        .snapshot()
        .items
        .iter()
        .map(|r| r.establishment_name.clone())
        .collect();
    assert_eq!(names, ["B", "A"]);
}

#[tokio::test]
async fn test_create_failure_is_recorded_and_returned() {
    let ctx = TestContext::new().await;
    let session = ctx.signed_in().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);

    let err = reviews
        .create(new_review("Ghost", "Calle nowhere 0", 2))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    let state = reviews.snapshot();
    assert!(state.items.is_empty());
    assert!(!state.is_loading);
    assert_eq!(state.last_error.map(|f| f.kind), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_create_requires_credential() {
    let ctx = TestContext::new().await;
    let session = ctx.anonymous().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);

    let err = reviews
        .create(new_review("Bar Pepe", "Calle Larios 5", 4))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);
    assert!(ctx.backend.forms().is_empty());
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_update_changes_only_patched_fields() {
    let ctx = TestContext::new().await;
    ctx.backend.insert_review_with_id("r1", ANA_EMAIL, "Bar Pepe", 5);
    ctx.backend.insert_review(BOB_EMAIL, "Casa Lola", 4);
    let session = ctx.signed_in().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);
    reviews.fetch_all().await;
    let before = reviews.snapshot();

    let patch = ReviewPatch {
        rating: Some(rating(3)),
        ..ReviewPatch::default()
    };
    let updated = reviews.update(&ReviewId::new("r1"), patch).await.unwrap();

    assert_eq!(updated.rating.stars(), 3);
    let after = reviews.snapshot();
    assert_eq!(after.items.len(), 2);
    assert_eq!(after.items[0].id.as_str(), "r1");
    assert_eq!(after.items[0].rating.stars(), 3);
    assert_eq!(after.items[0].establishment_name, before.items[0].establishment_name);
    assert_eq!(after.items[0].address, before.items[0].address);
    assert_eq!(after.items[1], before.items[1]);

    let forms = ctx.backend.forms();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0].path, "/v1/reviews/r1");
    assert_eq!(forms[0].fields.len(), 1);
    assert_eq!(forms[0].fields["rating"], "3");
    assert_eq!(ctx.backend.review("r1").unwrap()["rating"], 3);
}

#[tokio::test]
async fn test_update_refreshes_focused_review() {
    let ctx = TestContext::new().await;
    ctx.backend.insert_review_with_id("r1", ANA_EMAIL, "Bar Pepe", 5);
    let session = ctx.signed_in().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);
    reviews.fetch_one(&ReviewId::new("r1")).await.unwrap();

    let patch = ReviewPatch {
        establishment_name: Some("Bar Pepe II".to_string()),
        ..ReviewPatch::default()
    };
    reviews.update(&ReviewId::new("r1"), patch).await.unwrap();

    let focused = reviews.snapshot().focused.unwrap();
    assert_eq!(focused.establishment_name, "Bar Pepe II");
}

#[tokio::test]
async fn test_update_by_non_author_is_rejected() {
    let ctx = TestContext::new().await;
    ctx.backend.insert_review_with_id("r1", BOB_EMAIL, "Casa Lola", 5);
    let session = ctx.signed_in().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);
    reviews.fetch_all().await;

    let patch = ReviewPatch {
        rating: Some(rating(1)),
        ..ReviewPatch::default()
    };
    let err = reviews
        .update(&ReviewId::new("r1"), patch)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);
    let state = reviews.snapshot();
    assert_eq!(state.items[0].rating.stars(), 5);
    assert_eq!(
        state.last_error.map(|f| f.kind),
        Some(ErrorKind::AuthorizationFailure)
    );
}

// =============================================================================
// Remove
// =============================================================================

#[tokio::test]
async fn test_remove_drops_cached_review() {
    let ctx = TestContext::new().await;
    let id = ctx.backend.insert_review(ANA_EMAIL, "Bar Pepe", 4);
    ctx.backend.insert_review(BOB_EMAIL, "Casa Lola", 5);
    let session = ctx.signed_in().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);
    reviews.fetch_all().await;
    let id = ReviewId::new(id);
    reviews.fetch_one(&id).await.unwrap();

    assert!(reviews.remove(&id).await);

    let state = reviews.snapshot();
    assert_eq!(state.items.len(), 1);
    assert!(state.get(&id).is_none());
    assert!(state.focused.is_none());
    assert!(ctx.backend.review(id.as_str()).is_none());
}

#[tokio::test]
async fn test_remove_failure_returns_false() {
    let ctx = TestContext::new().await;
    let id = ctx.backend.insert_review(BOB_EMAIL, "Casa Lola", 5);
    let session = ctx.signed_in().await;
    let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);
    reviews.fetch_all().await;

    assert!(!reviews.remove(&ReviewId::new(&id)).await);

    let state = reviews.snapshot();
    assert_eq!(state.items.len(), 1);
    assert_eq!(
        state.last_error.map(|f| f.kind),
        Some(ErrorKind::AuthorizationFailure)
    );
    assert!(ctx.backend.review(&id).is_some());
}

// =============================================================================
// Overlapping fetches
// =============================================================================

/// Start a slow fetch, change the server data, then run a fast fetch.
/// Returns the number of reviews left in the cache.
async fn overlapping_fetches(ordering: FetchOrdering) -> usize {
    let ctx = TestContext::new().await;
    ctx.backend.insert_review(ANA_EMAIL, "Bar Pepe", 4);
    let session = ctx.anonymous().await;
    let reviews = Reviews::new(session.api(), ordering);

    ctx.backend
        .delay_next("GET", "/v1/reviews/", Duration::from_millis(300));
    let slow = {
        let reviews = reviews.clone();
        tokio::spawn(async move { reviews.fetch_all().await })
    };
    ctx.backend.wait_for_requests(1).await;

    ctx.backend.insert_review(BOB_EMAIL, "Casa Lola", 5);
    reviews.fetch_all().await;
    assert_eq!(reviews.snapshot().items.len(), 2);

    slow.await.unwrap();
    let state = reviews.snapshot();
    assert!(!state.is_loading);
    state.items.len()
}

#[tokio::test]
async fn test_completion_order_lets_slow_fetch_win() {
    assert_eq!(overlapping_fetches(FetchOrdering::CompletionOrder).await, 1);
}

#[tokio::test]
async fn test_latest_issued_discards_stale_fetch() {
    assert_eq!(overlapping_fetches(FetchOrdering::LatestIssued).await, 2);
}
