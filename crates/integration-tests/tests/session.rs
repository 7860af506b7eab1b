//! Integration tests for the session lifecycle.
//!
//! Each test starts a fake backend and resolves a real session against it.

use std::sync::Arc;

use mapreviews_client::{
    CredentialStore, FileCredentialStore, SessionError, SessionManager, SessionState,
};
use mapreviews_integration_tests::{ANA_EMAIL, ANA_TOKEN, BOB_TOKEN, TestContext};
use secrecy::{ExposeSecret, SecretString};

// =============================================================================
// Initialization
// =============================================================================

#[tokio::test]
async fn test_no_persisted_credential_skips_verification() {
    let ctx = TestContext::new().await;

    let session = ctx.anonymous().await;

    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(session.identity().is_none());
    assert!(ctx.backend.requests_to("POST", "/v1/auth/login").is_empty());
}

#[tokio::test]
async fn test_persisted_credential_is_verified() {
    let ctx = TestContext::new().await;

    let session = ctx.signed_in().await;

    let identity = session.identity().expect("Session should be authenticated");
    assert_eq!(identity.email.as_str(), ANA_EMAIL);
    assert_eq!(identity.label(), "Ana");

    let logins = ctx.backend.requests_to("POST", "/v1/auth/login");
    assert_eq!(logins.len(), 1);
    assert_eq!(
        logins[0].authorization.as_deref(),
        Some(format!("Bearer {ANA_TOKEN}").as_str())
    );
}

#[tokio::test]
async fn test_rejected_credential_is_discarded() {
    let ctx = TestContext::new().await;
    ctx.backend.revoke(ANA_TOKEN);

    let session = ctx.signed_in().await;

    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(!ctx.store.is_set(), "Rejected credential must be cleared");
    assert!(!session.api().has_credential().await);
}

#[tokio::test]
async fn test_initialize_publishes_terminal_state() {
    let ctx = TestContext::new().await;
    ctx.store.save(&SecretString::from(ANA_TOKEN.to_string())).unwrap();

    let store: Arc<dyn CredentialStore> = ctx.store.clone();
    let manager = SessionManager::new(&ctx.config, store);
    let mut states = manager.subscribe();
    assert_eq!(*states.borrow(), SessionState::Unresolved);

    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            let terminal = state.is_terminal();
            seen.push(state);
            if terminal {
                break;
            }
        }
        seen
    });

    let session = manager.initialize().await;
    let seen = observer.await.unwrap();

    assert!(session.is_authenticated());
    assert!(matches!(seen.last(), Some(SessionState::Authenticated(_))));
}

// =============================================================================
// Login / logout
// =============================================================================

#[tokio::test]
async fn test_login_persists_and_authenticates() {
    let ctx = TestContext::new().await;
    let session = ctx.anonymous().await;

    let identity = session
        .complete_login(SecretString::from(BOB_TOKEN.to_string()))
        .await
        .unwrap();

    assert_eq!(identity.email.as_str(), "bob@example.com");
    assert!(session.is_authenticated());
    assert_eq!(
        ctx.store.load().unwrap().unwrap().expose_secret(),
        BOB_TOKEN
    );
    assert!(session.api().has_credential().await);
}

#[tokio::test]
async fn test_failed_login_leaves_session_anonymous() {
    let ctx = TestContext::new().await;
    let session = ctx.anonymous().await;

    let err = session
        .complete_login(SecretString::from("forged".to_string()))
        .await
        .unwrap_err();

    let SessionError::Verification(api_error) = err;
    assert_eq!(api_error.status().map(|s| s.as_u16()), Some(401));
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(!ctx.store.is_set());
    assert!(!session.api().has_credential().await);
}

#[tokio::test]
async fn test_logout_removes_bearer_from_later_requests() {
    let ctx = TestContext::new().await;
    let session = ctx.signed_in().await;
    let api = session.api();

    session.logout().await;

    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(!ctx.store.is_set());
    assert!(!api.has_credential().await);

    // Requests while anonymous are still attempted, without a header
    let reviews = mapreviews_client::Reviews::new(api, ctx.config.fetch_ordering);
    reviews.fetch_mine().await;
    let mine = ctx.backend.requests_to("GET", "/v1/reviews/mine");
    assert_eq!(mine.len(), 1);
    assert!(mine[0].authorization.is_none());
    assert!(reviews.snapshot().last_error.is_some());
}

// =============================================================================
// File store
// =============================================================================

#[tokio::test]
async fn test_file_store_survives_restart() {
    let ctx = TestContext::new().await;
    let dir = tempfile::tempdir().unwrap();

    let first = SessionManager::new(&ctx.config, Arc::new(FileCredentialStore::new(dir.path())))
        .initialize()
        .await;
    first
        .complete_login(SecretString::from(ANA_TOKEN.to_string()))
        .await
        .unwrap();

    let second = SessionManager::new(&ctx.config, Arc::new(FileCredentialStore::new(dir.path())))
        .initialize()
        .await;
    assert_eq!(
        second.identity().map(|i| i.email.into_inner()),
        Some(ANA_EMAIL.to_string())
    );

    second.logout().await;
    let third = SessionManager::new(&ctx.config, Arc::new(FileCredentialStore::new(dir.path())))
        .initialize()
        .await;
    assert_eq!(third.state(), SessionState::Anonymous);
}
