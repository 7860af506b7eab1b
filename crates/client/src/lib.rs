//! Map Reviews Client - Data synchronization layer.
//!
//! Keeps in-memory state consistent with the reviews backend under network
//! latency and failure.
//!
//! # Architecture
//!
//! - [`session`] - Credential verification, login and logout; the root
//!   dependency of everything else
//! - [`api`] - Single HTTP egress point attaching the bearer credential
//! - [`sync`] - Cached Reviews, Markers and Visits collections with CRUD
//!   operations
//! - [`search`] - Debounced, cancellable address autocomplete
//! - [`config`] - Environment-driven configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use mapreviews_client::{ClientConfig, FileCredentialStore, Reviews, SessionManager};
//!
//! let config = ClientConfig::from_env()?;
//! let store = Arc::new(FileCredentialStore::new(&config.credential_dir));
//! let session = SessionManager::new(&config, store).initialize().await;
//!
//! let reviews = Reviews::new(session.api(), config.fetch_ordering);
//! reviews.fetch_all().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod search;
pub mod session;
pub mod sync;

pub use api::{ApiClient, ApiError, Attachment};
pub use config::{ClientConfig, ConfigError, SearchConfig};
pub use search::{AddressSearch, SearchState};
pub use session::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, Session, SessionError,
    SessionManager, SessionState, StoreError,
};
pub use sync::{
    CollectionState, FetchOrdering, Markers, NewMarker, NewReview, ReviewPatch, Reviews,
    SyncFailure, Visits,
};
