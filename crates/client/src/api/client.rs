//! Backend REST client implementation.
//!
//! Uses `reqwest` 0.13 for HTTP. Bodies are read as text first so decode
//! failures can be logged with the offending payload.

use std::sync::Arc;

use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use super::{ApiError, error_message};

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the reviews backend.
///
/// Cheap to clone; every clone shares the HTTP connection pool and the
/// credential slot.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    /// Bearer credential attached to every request when set
    credential: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("credential", &"[REDACTED]")
            .finish()
    }
}

impl ApiClient {
    /// Create a new backend client rooted at `base_url` (e.g.
    /// `http://localhost:8000/v1`). Starts without a credential.
    ///
    /// Only the session creates clients; dependents obtain one from
    /// [`Session::api`](crate::session::Session::api).
    #[must_use]
    pub(crate) fn new(base_url: Url) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                client: reqwest::Client::new(),
                base_url,
                credential: RwLock::new(None),
            }),
        }
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Replace (or clear) the bearer credential used by subsequent requests.
    pub(crate) async fn set_credential(&self, credential: Option<SecretString>) {
        *self.inner.credential.write().await = credential;
    }

    /// Whether a bearer credential is currently attached to requests.
    pub async fn has_credential(&self) -> bool {
        self.inner.credential.read().await.is_some()
    }

    /// Build an endpoint URL by appending percent-encoded path segments to the
    /// base URL. An empty final segment produces a trailing slash
    /// (`["reviews", ""]` is `/v1/reviews/`).
    #[must_use]
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base_url.clone();
        // Base URLs are validated as http(s) at configuration time
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// GET a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let request = self.request(Method::GET, self.endpoint(segments));
        let response = self.send(request).await?;
        decode(response).await
    }

    /// GET a JSON document with query parameters.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let mut url = self.endpoint(segments);
        url.query_pairs_mut().extend_pairs(query);
        let response = self.send(self.request(Method::GET, url)).await?;
        decode(response).await
    }

    /// POST a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST, self.endpoint(segments))
            .json(body);
        let response = self.send(request).await?;
        decode(response).await
    }

    /// POST a multipart form and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        form: Form,
    ) -> Result<T, ApiError> {
        let request = self
            .request(Method::POST, self.endpoint(segments))
            .multipart(form);
        let response = self.send(request).await?;
        decode(response).await
    }

    /// PUT a multipart form and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn put_multipart<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        form: Form,
    ) -> Result<T, ApiError> {
        let request = self
            .request(Method::PUT, self.endpoint(segments))
            .multipart(form);
        let response = self.send(request).await?;
        decode(response).await
    }

    /// DELETE a resource. The response body is ignored.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or non-success status.
    pub async fn delete(&self, segments: &[&str]) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, self.endpoint(segments)))
            .await?;
        Ok(())
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.inner.client.request(method, url)
    }

    /// Attach the credential (if any), send, and turn non-success statuses
    /// into `ApiError::Status`.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = {
            let credential = self.inner.credential.read().await;
            match credential.as_ref() {
                Some(token) => request.bearer_auth(token.expose_secret()),
                None => request,
            }
        };

        let request = request.build()?;
        debug!(
            method = %request.method(),
            path = %request.url().path(),
            authenticated = request.headers().contains_key(reqwest::header::AUTHORIZATION),
            "Sending backend request"
        );

        let response = self.inner.client.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let path = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        warn!(
            status = %status,
            path = %path,
            message = %message,
            "Backend returned non-success status"
        );
        Err(ApiError::Status { status, message })
    }
}

/// Read a success body and decode it as JSON.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        warn!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        ApiError::Decode(e)
    })
}
