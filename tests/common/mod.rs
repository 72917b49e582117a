// In-process stand-in for the backend REST API, served on an ephemeral port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceExt;

use codestrain_web::app::{self, AppState};
use codestrain_web::backend::BackendClient;

const STAMP: &str = "2024-01-01T00:00:00";

#[derive(Default)]
struct Store {
    users: Vec<Value>,
    passwords: HashMap<String, String>,
    tokens: HashMap<String, String>,
    strains: Vec<Value>,
    versions: HashMap<String, Vec<Value>>,
    battles: Vec<Value>,
}

#[derive(Default)]
pub struct FakeBackend {
    store: Mutex<Store>,
    hits: AtomicUsize,
}

type Shared = Arc<FakeBackend>;

impl FakeBackend {
    /// Number of requests the backend has received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn authorize(fake: &FakeBackend, headers: &HeaderMap) -> Result<String, StatusCode> {
    let token = bearer(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let store = fake.store.lock().unwrap();
    store.tokens.get(&token).cloned().ok_or(StatusCode::UNAUTHORIZED)
}

async fn count(State(fake): State<Shared>, req: axum::extract::Request, next: Next) -> Response {
    fake.hits.fetch_add(1, Ordering::SeqCst);
    next.run(req).await
}

async fn list_users(State(fake): State<Shared>) -> Json<Value> {
    Json(Value::Array(fake.store.lock().unwrap().users.clone()))
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
    email: String,
    password: String,
}

async fn create_user(State(fake): State<Shared>, Json(body): Json<NewUser>) -> Response {
    let mut store = fake.store.lock().unwrap();
    if store.passwords.contains_key(&body.email) {
        return (StatusCode::CONFLICT, "email taken").into_response();
    }
    let user = json!({
        "id": new_id(),
        "name": body.name,
        "email": body.email.clone(),
        "admin": false,
        "created_at": STAMP,
        "updated_at": STAMP,
    });
    store.passwords.insert(body.email, body.password);
    store.users.push(user.clone());
    Json(user).into_response()
}

async fn get_user(State(fake): State<Shared>, Path(id): Path<String>) -> Response {
    let store = fake.store.lock().unwrap();
    match store.users.iter().find(|u| u["id"] == id.as_str()) {
        Some(user) => Json(user.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(State(fake): State<Shared>, Json(body): Json<Credentials>) -> Response {
    let mut store = fake.store.lock().unwrap();
    if store.passwords.get(&body.email) != Some(&body.password) {
        return (StatusCode::UNAUTHORIZED, "bad credentials").into_response();
    }
    let Some(user_id) = store
        .users
        .iter()
        .find(|u| u["email"] == body.email.as_str())
        .and_then(|u| u["id"].as_str().map(str::to_string))
    else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let token = format!("tok-{}", new_id());
    store.tokens.insert(token.clone(), user_id.clone());
    Json(json!({
        "id": new_id(),
        "creator_id": user_id,
        "token": token,
        "created_at": STAMP,
        "updated_at": STAMP,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct Logout {
    token: String,
}

async fn logout(State(fake): State<Shared>, Json(body): Json<Logout>) -> StatusCode {
    fake.store.lock().unwrap().tokens.remove(&body.token);
    StatusCode::OK
}

async fn me(State(fake): State<Shared>, headers: HeaderMap) -> Response {
    let user_id = match authorize(&fake, &headers) {
        Ok(id) => id,
        Err(status) => return status.into_response(),
    };
    let store = fake.store.lock().unwrap();
    match store.users.iter().find(|u| u["id"] == user_id.as_str()) {
        Some(user) => Json(user.clone()).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[derive(Deserialize)]
struct StrainFilter {
    creator_id: Option<String>,
}

async fn list_strains(
    State(fake): State<Shared>,
    Query(filter): Query<StrainFilter>,
) -> Json<Value> {
    let store = fake.store.lock().unwrap();
    let strains = store
        .strains
        .iter()
        .filter(|s| match &filter.creator_id {
            Some(creator) => s["creator_id"] == creator.as_str(),
            None => true,
        })
        .cloned()
        .collect();
    Json(Value::Array(strains))
}

#[derive(Deserialize)]
struct NewStrain {
    name: String,
    description: Option<String>,
}

async fn create_strain(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<NewStrain>,
) -> Response {
    let user_id = match authorize(&fake, &headers) {
        Ok(id) => id,
        Err(status) => return status.into_response(),
    };
    let strain = json!({
        "id": new_id(),
        "creator_id": user_id,
        "name": body.name,
        "description": body.description,
        "created_at": STAMP,
        "updated_at": STAMP,
    });
    fake.store.lock().unwrap().strains.push(strain.clone());
    Json(strain).into_response()
}

async fn get_strain(State(fake): State<Shared>, Path(id): Path<String>) -> Response {
    let store = fake.store.lock().unwrap();
    let Some(strain) = store.strains.iter().find(|s| s["id"] == id.as_str()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let versions: Vec<Value> = store
        .versions
        .get(&id)
        .map(|vs| {
            vs.iter()
                .map(|v| {
                    let mut meta = v.clone();
                    if let Some(obj) = meta.as_object_mut() {
                        obj.remove("code");
                    }
                    meta
                })
                .collect()
        })
        .unwrap_or_default();
    let mut body = strain.clone();
    body["versions"] = Value::Array(versions);
    Json(body).into_response()
}

async fn delete_strain(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> StatusCode {
    if let Err(status) = authorize(&fake, &headers) {
        return status;
    }
    let mut store = fake.store.lock().unwrap();
    let before = store.strains.len();
    store.strains.retain(|s| s["id"] != id.as_str());
    if store.strains.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

#[derive(Deserialize)]
struct NewVersion {
    code: String,
    wasm: String,
}

async fn create_version(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Path(strain_id): Path<String>,
    Json(body): Json<NewVersion>,
) -> Response {
    if let Err(status) = authorize(&fake, &headers) {
        return status.into_response();
    }
    if body.wasm.is_empty() {
        return StatusCode::UNPROCESSABLE_ENTITY.into_response();
    }
    let id = new_id();
    let version = json!({
        "id": id.clone(),
        "strain_id": strain_id.clone(),
        "code": body.code,
        "created_at": STAMP,
        "updated_at": STAMP,
    });
    fake.store
        .lock()
        .unwrap()
        .versions
        .entry(strain_id.clone())
        .or_default()
        .push(version);
    Json(json!({
        "id": id,
        "strain_id": strain_id,
        "created_at": STAMP,
        "updated_at": STAMP,
    }))
    .into_response()
}

fn find_version(fake: &FakeBackend, strain_id: &str, version_id: &str) -> Option<Value> {
    let store = fake.store.lock().unwrap();
    store
        .versions
        .get(strain_id)?
        .iter()
        .find(|v| v["id"] == version_id)
        .cloned()
}

async fn get_version(
    State(fake): State<Shared>,
    Path((strain_id, version_id)): Path<(String, String)>,
) -> Response {
    match find_version(&fake, &strain_id, &version_id) {
        Some(version) => Json(version).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn run_version(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Path((strain_id, version_id)): Path<(String, String)>,
) -> Response {
    if let Err(status) = authorize(&fake, &headers) {
        return status.into_response();
    }
    match find_version(&fake, &strain_id, &version_id) {
        Some(version) => {
            let code = version["code"].as_str().unwrap_or_default();
            format!("ran: {code}").into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Deserialize)]
struct NewBattle {
    strain_a: String,
    strain_b: String,
}

async fn create_battle(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<NewBattle>,
) -> Response {
    if let Err(status) = authorize(&fake, &headers) {
        return status.into_response();
    }
    let battle = json!({
        "id": new_id(),
        "arena_size": 8,
        "strain_a": body.strain_a.clone(),
        "strain_b": body.strain_b,
        "winner": body.strain_a,
        "score_a": 12.0,
        "score_b": 3.0,
        "log": [
            {"player": false, "x": 0, "y": 0, "allowed": true},
            {"player": true, "x": 7, "y": 7, "allowed": true},
        ],
    });
    fake.store.lock().unwrap().battles.push(battle.clone());
    Json(battle).into_response()
}

async fn list_battles(State(fake): State<Shared>) -> Json<Value> {
    let store = fake.store.lock().unwrap();
    let battles = store
        .battles
        .iter()
        .map(|b| {
            let mut meta = b.clone();
            if let Some(obj) = meta.as_object_mut() {
                obj.remove("log");
            }
            meta
        })
        .collect();
    Json(Value::Array(battles))
}

async fn get_battle(State(fake): State<Shared>, Path(id): Path<String>) -> Response {
    let store = fake.store.lock().unwrap();
    match store.battles.iter().find(|b| b["id"] == id.as_str()) {
        Some(battle) => Json(battle.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start the fake backend and return it with its base URL.
pub async fn spawn_backend() -> (Shared, String) {
    let fake: Shared = Arc::default();
    let router = Router::new()
        .route("/user", get(list_users).post(create_user))
        .route("/user/{id}", get(get_user))
        .route("/login", axum::routing::post(login))
        .route("/logout", axum::routing::post(logout))
        .route("/me", get(me))
        .route("/strain", get(list_strains).post(create_strain))
        .route("/strain/{id}", get(get_strain).delete(delete_strain))
        .route("/strain/{id}/version", axum::routing::post(create_version))
        .route("/strain/{id}/version/{vid}", get(get_version))
        .route("/strain/{id}/version/{vid}/run", get(run_version))
        .route("/battle", get(list_battles).post(create_battle))
        .route("/battle/{id}", get(get_battle))
        .layer(middleware::from_fn_with_state(fake.clone(), count))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (fake, format!("http://{addr}"))
}

/// The web app under test, wired to a fresh fake backend.
pub struct TestApp {
    pub router: Router,
    pub backend: Shared,
}

impl TestApp {
    pub async fn new() -> Self {
        let (backend, url) = spawn_backend().await;
        let client = BackendClient::new(&url, Duration::from_secs(5)).unwrap();
        Self {
            router: app::router(AppState { backend: client }, None),
            backend,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>) -> TestResponse {
        self.post_body(uri, "application/x-www-form-urlencoded", form, cookie)
            .await
    }

    pub async fn post_body(
        &self,
        uri: &str,
        content_type: &str,
        body: &str,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let resp = self.router.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }

    /// Register and log in; returns the `session=...` cookie pair.
    pub async fn sign_in(&self, name: &str) -> String {
        let email = format!("{name}@example.com");
        let form = format!("name={name}&email={email}&password=secret");
        let resp = self.post_form("/register", &form, None).await;
        assert_eq!(resp.status, StatusCode::FOUND, "register: {}", resp.body);

        let form = format!("email={email}&password=secret");
        let resp = self.post_form("/login", &form, None).await;
        assert_eq!(resp.status, StatusCode::FOUND, "login: {}", resp.body);
        resp.session_cookie().expect("login sets the session cookie")
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    /// The `session=value` pair from a Set-Cookie header, ready for a Cookie header.
    pub fn session_cookie(&self) -> Option<String> {
        self.set_cookies()
            .into_iter()
            .find(|c| c.starts_with("session="))
            .and_then(|c| c.split(';').next().map(str::to_string))
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}
