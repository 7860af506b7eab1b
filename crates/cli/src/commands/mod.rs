//! Command implementations.
//!
//! Every command resolves the session first, then drives one client
//! component and prints its resulting state to stdout.

pub mod auth;
pub mod markers;
pub mod reviews;
pub mod search;
pub mod visits;

use std::sync::Arc;

use mapreviews_client::{
    ApiError, ClientConfig, ConfigError, FileCredentialStore, Session, SessionError,
    SessionManager, SyncFailure,
};
use mapreviews_core::{EmailError, RatingError};
use thiserror::Error;

/// Errors that end a command with a non-zero exit status.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A request failed.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// The credential was rejected.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// An email argument is malformed.
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    /// A rating argument is out of range.
    #[error("Invalid rating: {0}")]
    Rating(#[from] RatingError),

    /// A collection operation recorded a failure.
    #[error("{0}")]
    Sync(SyncFailure),

    /// A collection operation failed without recording why.
    #[error("{0} failed")]
    Failed(&'static str),
}

impl CliError {
    /// Turn the failure recorded by a collection into an error, if any.
    pub(crate) fn from_recorded(
        last_error: Option<SyncFailure>,
        operation: &'static str,
    ) -> Self {
        last_error.map_or(Self::Failed(operation), Self::Sync)
    }
}

/// Resolved configuration and session shared by all commands.
pub struct Context {
    pub config: ClientConfig,
    pub session: Session,
}

impl Context {
    /// Load configuration and resolve the persisted session.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Config` if an environment variable is invalid.
    pub async fn load() -> Result<Self, CliError> {
        let config = ClientConfig::from_env()?;
        tracing::debug!(api_url = %config.api_url, "Loaded configuration");

        let store = Arc::new(FileCredentialStore::new(&config.credential_dir));
        let session = SessionManager::new(&config, store).initialize().await;

        Ok(Self { config, session })
    }
}
