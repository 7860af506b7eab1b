//! Integration tests for Map Reviews.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mapreviews-integration-tests
//! ```
//!
//! No external services are needed: every test starts its own
//! [`FakeBackend`], an in-process axum server on an ephemeral port that
//! speaks the backend's REST contract, and drives the real client against
//! it.
//!
//! # Test Categories
//!
//! - `session` - Credential verification, login and logout
//! - `gateway` - Bearer header, status mapping, network failures
//! - `reviews` - Review CRUD and concurrency ordering
//! - `markers_visits` - Markers, visits and owner scoping
//! - `search` - Debounced address autocomplete
//!
//! # Example
//!
//! ```rust,ignore
//! let ctx = TestContext::new().await;
//! let session = ctx.signed_in().await;
//! let reviews = Reviews::new(session.api(), ctx.config.fetch_ordering);
//! reviews.fetch_all().await;
//! assert_eq!(ctx.backend.requests_to("GET", "/v1/reviews/").len(), 1);
//! ```

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mapreviews_client::{
    ClientConfig, CredentialStore, MemoryCredentialStore, SearchConfig, Session, SessionManager,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Credential accepted for Ana.
pub const ANA_TOKEN: &str = "token-ana";
/// Ana's email.
pub const ANA_EMAIL: &str = "ana@example.com";
/// Credential accepted for Bob.
pub const BOB_TOKEN: &str = "token-bob";
/// Bob's email.
pub const BOB_EMAIL: &str = "bob@example.com";

/// Debounce window used by tests, short enough to keep them fast.
pub const TEST_DEBOUNCE: Duration = Duration::from_millis(80);

// =============================================================================
// Recorded traffic
// =============================================================================

/// A request as seen by the fake backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

impl RecordedRequest {
    /// Value of a query parameter.
    #[must_use]
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

/// A file part received in a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub len: usize,
}

/// A multipart form received by the fake backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedForm {
    pub path: String,
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

/// A scripted deviation applied to the next request on one route.
#[derive(Debug, Clone)]
enum Override {
    /// Answer normally, but only after this delay.
    Delay(Duration),
    /// Answer with this status and `detail` without touching any data.
    Fail(StatusCode, String),
}

// =============================================================================
// Backend state
// =============================================================================

#[derive(Default)]
struct Data {
    users: HashMap<String, Value>,
    reviews: Vec<Value>,
    markers: Vec<Value>,
    visits: Vec<Value>,
    places: Vec<Value>,
    requests: Vec<RecordedRequest>,
    forms: Vec<RecordedForm>,
    overrides: HashMap<String, VecDeque<Override>>,
    create_delays: HashMap<String, Duration>,
    id_counter: u64,
}

impl Data {
    fn next_id(&mut self, prefix: &str) -> String {
        self.id_counter += 1;
        format!("{prefix}{:04}", self.id_counter)
    }
}

type Shared = Arc<Mutex<Data>>;

fn lock(data: &Shared) -> std::sync::MutexGuard<'_, Data> {
    data.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// FakeBackend
// =============================================================================

/// In-process stand-in for the reviews backend.
///
/// The server task is aborted when the value is dropped.
pub struct FakeBackend {
    data: Shared,
    base_url: String,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Start a backend on `127.0.0.1:<ephemeral>` that accepts
    /// [`ANA_TOKEN`] and [`BOB_TOKEN`].
    pub async fn start() -> Self {
        let data: Shared = Arc::default();
        {
            let mut data = lock(&data);
            data.users.insert(
                ANA_TOKEN.to_string(),
                json!({"_id": "u1", "email": ANA_EMAIL, "name": "Ana", "picture": "https://img.test/ana.png"}),
            );
            data.users.insert(
                BOB_TOKEN.to_string(),
                json!({"_id": "u2", "email": BOB_EMAIL, "name": "Bob"}),
            );
        }

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Fake backend has no address");

        let app = router(Arc::clone(&data));
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fake backend server error");
        });

        Self {
            data,
            base_url: format!("http://{addr}/v1"),
            server,
        }
    }

    /// Base URL including the `/v1` prefix.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -------------------------------------------------------------------------
    // Traffic inspection
    // -------------------------------------------------------------------------

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.data).requests.clone()
    }

    /// Requests received for one method and path.
    #[must_use]
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Multipart forms received so far.
    #[must_use]
    pub fn forms(&self) -> Vec<RecordedForm> {
        lock(&self.data).forms.clone()
    }

    /// Wait until at least `count` requests have arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while lock(&self.data).requests.len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Timed out waiting for requests");
    }

    // -------------------------------------------------------------------------
    // Scripting
    // -------------------------------------------------------------------------

    /// Delay the response to the next request on `method path`.
    pub fn delay_next(&self, method: &str, path: &str, delay: Duration) {
        self.push_override(method, path, Override::Delay(delay));
    }

    /// Fail the next request on `method path` with `status`.
    pub fn fail_next(&self, method: &str, path: &str, status: u16, detail: &str) {
        let status = StatusCode::from_u16(status).expect("Invalid status code");
        self.push_override(method, path, Override::Fail(status, detail.to_string()));
    }

    /// Delay the response to the review create whose establishment is `name`.
    pub fn delay_review_create(&self, name: &str, delay: Duration) {
        lock(&self.data)
            .create_delays
            .insert(name.to_string(), delay);
    }

    /// Stop accepting `token`.
    pub fn revoke(&self, token: &str) {
        lock(&self.data).users.remove(token);
    }

    fn push_override(&self, method: &str, path: &str, value: Override) {
        lock(&self.data)
            .overrides
            .entry(format!("{method} {path}"))
            .or_default()
            .push_back(value);
    }

    // -------------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------------

    /// Store a review authored by `author` and return its id.
    pub fn insert_review(&self, author: &str, name: &str, rating: u8) -> String {
        let mut data = lock(&self.data);
        let id = data.next_id("r");
        let review = review_json(&id, name, &format!("{name} street 1"), rating, &[], author);
        data.reviews.push(review);
        id
    }

    /// Store a review with a fixed id.
    pub fn insert_review_with_id(&self, id: &str, author: &str, name: &str, rating: u8) {
        let review = review_json(id, name, &format!("{name} street 1"), rating, &[], author);
        lock(&self.data).reviews.push(review);
    }

    /// Server copy of a review.
    #[must_use]
    pub fn review(&self, id: &str) -> Option<Value> {
        lock(&self.data)
            .reviews
            .iter()
            .find(|r| r["_id"] == id)
            .cloned()
    }

    /// Store a marker owned by `owner` and return its id.
    pub fn insert_marker(&self, owner: &str, location: &str) -> String {
        let mut data = lock(&self.data);
        let id = data.next_id("m");
        let marker = marker_json(&id, owner, location, "https://img.test/seed.jpg");
        data.markers.push(marker);
        id
    }

    /// Number of visits recorded for `visited`.
    #[must_use]
    pub fn visits_to(&self, visited: &str) -> usize {
        lock(&self.data)
            .visits
            .iter()
            .filter(|v| v["visited_email"] == visited)
            .count()
    }

    /// Make a place available to the autocomplete endpoint.
    pub fn add_place(&self, display_name: &str, lat: f64, lon: f64) {
        lock(&self.data).places.push(json!({
            "display_name": display_name,
            "lat": lat,
            "lon": lon,
            "type": "city",
            "class": "place",
        }));
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// TestContext
// =============================================================================

/// A fake backend plus a client configuration pointing at it.
pub struct TestContext {
    pub backend: FakeBackend,
    pub config: ClientConfig,
    pub store: Arc<MemoryCredentialStore>,
}

impl TestContext {
    /// Start a backend and an empty credential store.
    pub async fn new() -> Self {
        let backend = FakeBackend::start().await;
        let mut config =
            ClientConfig::new(backend.base_url()).expect("Fake backend URL is valid");
        config.search = SearchConfig {
            debounce: TEST_DEBOUNCE,
            ..SearchConfig::default()
        };

        Self {
            backend,
            config,
            store: Arc::new(MemoryCredentialStore::new()),
        }
    }

    /// Resolve a session from the context's store.
    pub async fn session(&self) -> Session {
        let store: Arc<dyn CredentialStore> = self.store.clone();
        SessionManager::new(&self.config, store).initialize().await
    }

    /// Resolve a session with no persisted credential.
    pub async fn anonymous(&self) -> Session {
        self.session().await
    }

    /// Resolve a session from a persisted [`ANA_TOKEN`].
    pub async fn signed_in(&self) -> Session {
        self.signed_in_as(ANA_TOKEN).await
    }

    /// Resolve a session from a persisted `token`.
    pub async fn signed_in_as(&self, token: &str) -> Session {
        self.store
            .save(&secrecy::SecretString::from(token.to_string()))
            .expect("Memory store never fails");
        self.session().await
    }
}

// =============================================================================
// Wire fixtures
// =============================================================================

fn review_json(
    id: &str,
    name: &str,
    address: &str,
    rating: u8,
    images: &[String],
    author: &str,
) -> Value {
    let (latitude, longitude) = geocode(address);
    json!({
        "_id": id,
        "establishment_name": name,
        "address": address,
        "latitude": latitude,
        "longitude": longitude,
        "rating": rating,
        "images": images,
        "user_email": author,
        "user_name": author.split('@').next().unwrap_or(author),
        "token_used": "redacted",
        "created_at": "2024-03-20T10:00:00.123",
        "token_expires_at": "2024-03-20T11:00:00.123",
    })
}

fn marker_json(id: &str, owner: &str, location: &str, image_url: &str) -> Value {
    let (latitude, longitude) = geocode(location);
    json!({
        "_id": id,
        "user_email": owner,
        "location_name": location,
        "latitude": latitude,
        "longitude": longitude,
        "image_url": image_url,
        "created_at": "2024-03-20T10:00:00",
    })
}

/// Deterministic stand-in for the geocoding provider.
#[allow(clippy::cast_precision_loss)]
fn geocode(text: &str) -> (f64, f64) {
    let len = text.chars().count() as f64;
    (36.7 + len / 1000.0, -4.4 - len / 1000.0)
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

// =============================================================================
// Router
// =============================================================================

fn router(data: Shared) -> Router {
    Router::new()
        .route("/v1/auth/login", post(login))
        .route("/v1/reviews/", get(list_reviews).post(create_review))
        .route("/v1/reviews/mine", get(my_reviews))
        .route(
            "/v1/reviews/{id}",
            get(get_review).put(update_review).delete(delete_review),
        )
        .route("/v1/maps/markers", get(my_markers).post(create_marker))
        .route("/v1/maps/markers/{email}", get(owner_markers))
        .route("/v1/social/visits", get(my_visits))
        .route("/v1/geocoding/autocomplete", get(autocomplete))
        .layer(middleware::from_fn_with_state(Arc::clone(&data), record))
        .with_state(data)
}

/// Record every request, then apply any scripted override for its route.
async fn record(State(data): State<Shared>, request: Request, next: Next) -> Response {
    let key = format!("{} {}", request.method(), request.uri().path());
    let scripted = {
        let mut data = lock(&data);
        data.requests.push(RecordedRequest {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            query: request.uri().query().map(ToString::to_string),
            authorization: request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string),
        });
        data.overrides.get_mut(&key).and_then(VecDeque::pop_front)
    };

    match scripted {
        Some(Override::Fail(status, message)) => detail(status, &message),
        Some(Override::Delay(delay)) => {
            // The handler sees the data as of arrival; only the answer is late
            let response = next.run(request).await;
            tokio::time::sleep(delay).await;
            response
        }
        None => next.run(request).await,
    }
}

/// Email behind the bearer credential, or a 401 response.
fn caller(data: &Shared, headers: &HeaderMap) -> Result<String, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| detail(StatusCode::UNAUTHORIZED, "Missing token"))?;

    lock(data)
        .users
        .get(token)
        .and_then(|user| user["email"].as_str().map(ToString::to_string))
        .ok_or_else(|| detail(StatusCode::UNAUTHORIZED, "Invalid token"))
}

async fn read_form(path: &str, mut multipart: Multipart) -> Result<RecordedForm, Response> {
    let mut form = RecordedForm {
        path: path.to_string(),
        ..RecordedForm::default()
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| detail(StatusCode::BAD_REQUEST, &e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(ToString::to_string) {
            let content_type = field.content_type().map(ToString::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| detail(StatusCode::BAD_REQUEST, &e.to_string()))?;
            form.files.push(UploadedFile {
                field: name,
                file_name,
                content_type,
                len: bytes.len(),
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| detail(StatusCode::BAD_REQUEST, &e.to_string()))?;
            form.fields.insert(name, text);
        }
    }
    Ok(form)
}

fn parse_rating(raw: &str) -> Result<u8, Response> {
    raw.parse::<u8>()
        .ok()
        .filter(|rating| *rating <= 5)
        .ok_or_else(|| detail(StatusCode::UNPROCESSABLE_ENTITY, "rating must be 0-5"))
}

// -----------------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------------

#[derive(Deserialize)]
struct LoginBody {
    token: String,
}

async fn login(State(data): State<Shared>, Json(body): Json<LoginBody>) -> Response {
    let user = lock(&data).users.get(&body.token).cloned();
    user.map_or_else(
        || detail(StatusCode::UNAUTHORIZED, "Token inválido"),
        |user| Json(user).into_response(),
    )
}

async fn list_reviews(State(data): State<Shared>) -> Response {
    Json(lock(&data).reviews.clone()).into_response()
}

async fn my_reviews(State(data): State<Shared>, headers: HeaderMap) -> Response {
    let email = match caller(&data, &headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let mine: Vec<Value> = lock(&data)
        .reviews
        .iter()
        .filter(|r| r["user_email"] == email.as_str())
        .cloned()
        .collect();
    Json(mine).into_response()
}

async fn get_review(State(data): State<Shared>, Path(id): Path<String>) -> Response {
    let review = lock(&data)
        .reviews
        .iter()
        .find(|r| r["_id"] == id.as_str())
        .cloned();
    review.map_or_else(
        || detail(StatusCode::NOT_FOUND, "Reseña no encontrada"),
        |review| Json(review).into_response(),
    )
}

async fn create_review(
    State(data): State<Shared>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let email = match caller(&data, &headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let form = match read_form("/v1/reviews/", multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    lock(&data).forms.push(form.clone());

    let (Some(name), Some(address), Some(rating)) = (
        form.fields.get("establishment_name"),
        form.fields.get("address"),
        form.fields.get("rating"),
    ) else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "missing required field");
    };
    let rating = match parse_rating(rating) {
        Ok(rating) => rating,
        Err(response) => return response,
    };
    if address.contains("nowhere") {
        return detail(StatusCode::NOT_FOUND, "Dirección no encontrada");
    }

    let images: Vec<String> = form
        .files
        .iter()
        .filter(|f| f.field == "images")
        .map(|f| format!("https://img.test/{}", f.file_name))
        .collect();

    let (review, delay) = {
        let mut data = lock(&data);
        let id = data.next_id("r");
        let review = review_json(&id, name, address, rating, &images, &email);
        data.reviews.push(review.clone());
        (review, data.create_delays.get(name.as_str()).copied())
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    (StatusCode::CREATED, Json(review)).into_response()
}

async fn update_review(
    State(data): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let email = match caller(&data, &headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let form = match read_form(&format!("/v1/reviews/{id}"), multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let rating = match form.fields.get("rating").map(|r| parse_rating(r)).transpose() {
        Ok(rating) => rating,
        Err(response) => return response,
    };

    let mut guard = lock(&data);
    guard.forms.push(form.clone());
    let Some(review) = guard.reviews.iter_mut().find(|r| r["_id"] == id.as_str()) else {
        return detail(StatusCode::NOT_FOUND, "Reseña no encontrada");
    };
    if review["user_email"] != email.as_str() {
        return detail(
            StatusCode::FORBIDDEN,
            "Solo el autor puede modificar esta reseña",
        );
    }

    if let Some(name) = form.fields.get("establishment_name") {
        review["establishment_name"] = json!(name);
    }
    if let Some(address) = form.fields.get("address") {
        let (latitude, longitude) = geocode(address);
        review["address"] = json!(address);
        review["latitude"] = json!(latitude);
        review["longitude"] = json!(longitude);
    }
    if let Some(rating) = rating {
        review["rating"] = json!(rating);
    }
    Json(review.clone()).into_response()
}

async fn delete_review(
    State(data): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let email = match caller(&data, &headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let mut data = lock(&data);
    let Some(index) = data.reviews.iter().position(|r| r["_id"] == id.as_str()) else {
        return detail(StatusCode::NOT_FOUND, "Reseña no encontrada");
    };
    if data.reviews.get(index).is_some_and(|r| r["user_email"] != email.as_str()) {
        return detail(
            StatusCode::FORBIDDEN,
            "Solo el autor puede eliminar esta reseña",
        );
    }
    data.reviews.remove(index);
    Json(json!({ "message": "Reseña eliminada" })).into_response()
}

async fn my_markers(State(data): State<Shared>, headers: HeaderMap) -> Response {
    let email = match caller(&data, &headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    markers_of(&data, &email)
}

async fn owner_markers(
    State(data): State<Shared>,
    Path(owner): Path<String>,
    headers: HeaderMap,
) -> Response {
    let visitor = match caller(&data, &headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    {
        let mut data = lock(&data);
        let id = data.next_id("v");
        data.visits.push(json!({
            "_id": id,
            "visitor_email": visitor,
            "visited_email": owner,
            "visitor_token": "redacted",
            "timestamp": "2024-03-21T09:30:00",
        }));
    }
    markers_of(&data, &owner)
}

fn markers_of(data: &Shared, owner: &str) -> Response {
    let markers: Vec<Value> = lock(data)
        .markers
        .iter()
        .filter(|m| m["user_email"] == owner)
        .cloned()
        .collect();
    Json(markers).into_response()
}

async fn create_marker(
    State(data): State<Shared>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let email = match caller(&data, &headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let form = match read_form("/v1/maps/markers", multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    let mut data = lock(&data);
    data.forms.push(form.clone());
    let (Some(location), Some(image)) = (
        form.fields.get("location_name"),
        form.files.iter().find(|f| f.field == "image"),
    ) else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "missing required field");
    };

    let id = data.next_id("m");
    let marker = marker_json(
        &id,
        &email,
        location,
        &format!("https://img.test/{}", image.file_name),
    );
    data.markers.push(marker.clone());
    Json(marker).into_response()
}

async fn my_visits(State(data): State<Shared>, headers: HeaderMap) -> Response {
    let email = match caller(&data, &headers) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let visits: Vec<Value> = lock(&data)
        .visits
        .iter()
        .filter(|v| v["visited_email"] == email.as_str())
        .cloned()
        .collect();
    Json(visits).into_response()
}

async fn autocomplete(
    State(data): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = params.get("q").map(|q| q.to_lowercase()).unwrap_or_default();
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(5);

    let places: Vec<Value> = lock(&data)
        .places
        .iter()
        .filter(|p| {
            p["display_name"]
                .as_str()
                .is_some_and(|name| name.to_lowercase().contains(&query))
        })
        .take(limit)
        .cloned()
        .collect();
    Json(places).into_response()
}
