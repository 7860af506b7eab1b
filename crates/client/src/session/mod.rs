//! Session lifecycle: credential verification, login and logout.
//!
//! # States
//!
//! ```text
//! Unresolved -> Resolving -> Authenticated(identity)
//!          \             \-> Anonymous
//!           \-> Anonymous (no persisted credential)
//! ```
//!
//! A [`SessionManager`] is created unresolved and cannot reach the backend
//! gateway. [`SessionManager::initialize`] consumes it, verifies any
//! persisted credential, and returns a resolved [`Session`]. Collection
//! synchronizers and the address search are built from [`Session::api`], so
//! nothing can issue requests before the session reaches a terminal state.

mod store;

pub use store::{
    CREDENTIAL_KEY, CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError,
};

use std::sync::Arc;

use mapreviews_core::Identity;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClient, ApiError};
use crate::config::ClientConfig;

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Persisted credential not yet examined.
    Unresolved,
    /// A persisted credential is being verified.
    Resolving,
    /// The credential was verified in this process.
    Authenticated(Identity),
    /// No verified credential.
    Anonymous,
}

impl SessionState {
    /// Whether initialization has finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Authenticated(_) | Self::Anonymous)
    }

    /// The verified identity, when authenticated.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend did not accept the credential.
    #[error("Credential verification failed: {0}")]
    Verification(#[from] ApiError),
}

/// Request body for credential verification.
#[derive(Serialize)]
struct LoginRequest<'a> {
    token: &'a str,
}

// =============================================================================
// SessionManager
// =============================================================================

/// An unresolved session.
pub struct SessionManager {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    /// Create an unresolved session for the configured backend.
    #[must_use]
    pub fn new(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self::with_client(ApiClient::new(config.api_url.clone()), store)
    }

    /// Create an unresolved session over an existing gateway.
    #[must_use]
    pub(crate) fn with_client(api: ApiClient, store: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Unresolved);
        Self { api, store, state }
    }

    /// Current state (always `Unresolved` until initialized).
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Observe state transitions, including the transient `Resolving` state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolve the session from the persisted credential.
    ///
    /// Never fails: a missing, unreadable or rejected credential resolves to
    /// `Anonymous`, and a rejected credential is removed from the store.
    #[instrument(skip(self))]
    pub async fn initialize(self) -> Session {
        let credential = match self.store.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Could not read persisted credential, continuing anonymously");
                None
            }
        };

        let Some(credential) = credential else {
            debug!("No persisted credential");
            self.state.send_replace(SessionState::Anonymous);
            return self.into_session();
        };

        self.state.send_replace(SessionState::Resolving);
        self.api.set_credential(Some(credential.clone())).await;

        match verify(&self.api, &credential).await {
            Ok(identity) => {
                info!(email = %identity.email, "Persisted credential verified");
                self.state.send_replace(SessionState::Authenticated(identity));
            }
            Err(e) => {
                warn!(error = %e, "Persisted credential rejected, discarding it");
                self.api.set_credential(None).await;
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Could not remove rejected credential");
                }
                self.state.send_replace(SessionState::Anonymous);
            }
        }

        self.into_session()
    }

    fn into_session(self) -> Session {
        Session {
            inner: Arc::new(SessionInner {
                api: self.api,
                store: self.store,
                state: self.state,
            }),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// A resolved session, shared by every dependent component.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    state: watch::Sender<SessionState>,
}

impl Session {
    /// Gateway for dependent components. Requests carry the session's
    /// credential, whatever it is at the time they are sent.
    #[must_use]
    pub fn api(&self) -> ApiClient {
        self.inner.api.clone()
    }

    /// Current state (`Authenticated` or `Anonymous`).
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Observe login/logout transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity().cloned()
    }

    /// Whether a verified credential is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(*self.inner.state.borrow(), SessionState::Authenticated(_))
    }

    /// Adopt a credential obtained from the identity provider.
    ///
    /// On success the credential is persisted and attached to every later
    /// request. On failure nothing changes.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Verification` if the backend rejects the
    /// credential or cannot be reached. Not retried.
    #[instrument(skip_all)]
    pub async fn complete_login(&self, credential: SecretString) -> Result<Identity, SessionError> {
        let identity = verify(&self.inner.api, &credential).await?;

        if let Err(e) = self.inner.store.save(&credential) {
            warn!(error = %e, "Could not persist credential, session will not survive a restart");
        }
        self.inner.api.set_credential(Some(credential)).await;

        info!(email = %identity.email, "Logged in");
        self.inner
            .state
            .send_replace(SessionState::Authenticated(identity.clone()));
        Ok(identity)
    }

    /// Forget the credential, locally and on disk. Does not contact the
    /// backend.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Could not remove persisted credential");
        }
        self.inner.api.set_credential(None).await;
        self.inner.state.send_replace(SessionState::Anonymous);
        info!("Logged out");
    }
}

/// Ask the backend to verify `credential` and return its identity.
async fn verify(api: &ApiClient, credential: &SecretString) -> Result<Identity, ApiError> {
    api.post_json(
        &["auth", "login"],
        &LoginRequest {
            token: credential.expose_secret(),
        },
    )
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;

    /// A gateway pointing at a port nothing listens on.
    fn unreachable_api() -> ApiClient {
        ApiClient::new(Url::parse("http://127.0.0.1:9/v1").unwrap())
    }

    #[tokio::test]
    async fn test_initialize_without_credential_is_anonymous() {
        let manager = SessionManager::with_client(
            unreachable_api(),
            Arc::new(MemoryCredentialStore::new()),
        );
        assert_eq!(manager.state(), SessionState::Unresolved);

        let session = manager.initialize().await;
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(!session.is_authenticated());
        assert!(!session.api().has_credential().await);
    }

    #[tokio::test]
    async fn test_initialize_with_unreachable_backend_discards_credential() {
        let store = Arc::new(MemoryCredentialStore::with_credential("stale"));
        let manager = SessionManager::with_client(unreachable_api(), store.clone());
        let mut states = manager.subscribe();

        let session = manager.initialize().await;

        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(!store.is_set());
        assert!(!session.api().has_credential().await);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_failed_login_changes_nothing() {
        let store = Arc::new(MemoryCredentialStore::new());
        let session = SessionManager::with_client(unreachable_api(), store.clone())
            .initialize()
            .await;

        let result = session.complete_login(SecretString::from("new".to_string())).await;

        assert!(matches!(result, Err(SessionError::Verification(ApiError::Network(_)))));
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(!store.is_set());
    }

    #[tokio::test]
    async fn test_logout_is_unconditional() {
        let store = Arc::new(MemoryCredentialStore::new());
        let session = SessionManager::with_client(unreachable_api(), store.clone())
            .initialize()
            .await;
        store.save(&SecretString::from("left-behind".to_string())).unwrap();

        session.logout().await;

        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(!store.is_set());
    }

    #[test]
    fn test_state_helpers() {
        assert!(!SessionState::Unresolved.is_terminal());
        assert!(!SessionState::Resolving.is_terminal());
        assert!(SessionState::Anonymous.is_terminal());
        assert!(SessionState::Anonymous.identity().is_none());
    }
}
