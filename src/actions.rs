// Form action handlers: validate submitted fields, call the backend, and
// answer with a redirect, an in-place result, or a structured failure.
//
// Missing fields fail with 400 before any backend call. Backend failures are
// logged here and turned into a fixed message; the backend's own status and
// body never reach the user.

use axum::{
    extract::{rejection::FormRejection, Form, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::Backend;
use crate::backend::BackendError;
use crate::metrics;
use crate::session;

/// A failed action, rendered as `status` with `{"message": .., "error": true}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    pub status: StatusCode,
    pub message: &'static str,
}

impl ActionFailure {
    fn new(action: &'static str, status: StatusCode, message: &'static str) -> Self {
        metrics::ACTION_FAILURES_TOTAL
            .with_label_values(&[action, status.as_str()])
            .inc();
        Self { status, message }
    }

    fn bad_request(action: &'static str, message: &'static str) -> Self {
        Self::new(action, StatusCode::BAD_REQUEST, message)
    }

    fn unauthenticated(action: &'static str) -> Self {
        Self::new(action, StatusCode::UNAUTHORIZED, "You must be logged in")
    }

    /// Log the backend error and hide it behind `message`.
    fn backend(action: &'static str, error: BackendError, message: &'static str) -> Self {
        tracing::error!("{action} failed: {error}");
        Self::new(action, StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ActionFailure {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "message": self.message, "error": true })),
        )
            .into_response()
    }
}

type ActionResult = Result<Response, ActionFailure>;

/// `302 Found` to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Same-origin path with each segment percent-encoded, plus an optional query.
fn local_path(segments: &[&str], query: &[(&str, &str)]) -> String {
    let Ok(mut url) = Url::parse("http://localhost/") else {
        return "/".to_string();
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

/// A form field counts as present only when non-empty.
fn field(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn require_session(jar: &CookieJar, action: &'static str) -> Result<String, ActionFailure> {
    session::session_token(jar).ok_or_else(|| ActionFailure::unauthenticated(action))
}

/// The submitted form, or a 400 when the body cannot be read as one.
fn submitted<T>(
    form: Result<Form<T>, FormRejection>,
    action: &'static str,
) -> Result<T, ActionFailure> {
    form.map(|Form(form)| form).map_err(|rejection| {
        tracing::debug!("{action}: unreadable form body: {}", rejection.body_text());
        ActionFailure::bad_request(action, "Invalid form submission")
    })
}

// ── Authentication ────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    Backend(backend): Backend,
    jar: CookieJar,
    form: Result<Form<LoginForm>, FormRejection>,
) -> ActionResult {
    const ACTION: &str = "login";
    let form = submitted(form, ACTION)?;
    let (Some(email), Some(password)) = (field(&form.email), field(&form.password)) else {
        return Err(ActionFailure::bad_request(
            ACTION,
            "Email and password are required",
        ));
    };

    let session = match backend.login(email, password).await {
        Ok(session) => session,
        Err(BackendError::Http(e)) => {
            tracing::error!(status = e.status, "Login rejected: {}", e.body);
            return Err(ActionFailure::new(
                ACTION,
                StatusCode::UNAUTHORIZED,
                "Failed to login",
            ));
        }
        Err(e) => return Err(ActionFailure::backend(ACTION, e, "Failed to login")),
    };

    let Some(cookie) = session::session_cookie(&session.token) else {
        tracing::error!(session_id = %session.id, "Session token cannot be stored in a cookie");
        return Err(ActionFailure::new(
            ACTION,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save session",
        ));
    };

    Ok((jar.add(cookie), found("/")).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn register(
    Backend(backend): Backend,
    form: Result<Form<RegisterForm>, FormRejection>,
) -> ActionResult {
    const ACTION: &str = "register";
    let form = submitted(form, ACTION)?;
    let (Some(name), Some(email), Some(password)) =
        (field(&form.name), field(&form.email), field(&form.password))
    else {
        return Err(ActionFailure::bad_request(
            ACTION,
            "Name, email and password are required",
        ));
    };

    match backend.create_user(name, email, password).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "Registered new user");
            Ok(found("/login"))
        }
        Err(BackendError::Http(e)) => {
            tracing::error!(status = e.status, "Registration rejected: {}", e.body);
            Err(ActionFailure::new(
                ACTION,
                StatusCode::UNAUTHORIZED,
                "Failed to register",
            ))
        }
        Err(e) => Err(ActionFailure::backend(ACTION, e, "Failed to register")),
    }
}

/// Best-effort logout: the backend is told, but its answer never changes the
/// outcome. The user always lands on the login page with the cookie cleared.
pub async fn logout(Backend(backend): Backend, jar: CookieJar) -> Response {
    let Some(token) = session::session_token(&jar) else {
        return found("/login");
    };
    if let Err(e) = backend.logout(&token).await {
        tracing::debug!("Logout notification failed: {e}");
    }
    (jar.remove(session::removal_cookie()), found("/login")).into_response()
}

// ── Strains ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateStrainForm {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub async fn create_strain(
    Backend(backend): Backend,
    jar: CookieJar,
    form: Result<Form<CreateStrainForm>, FormRejection>,
) -> ActionResult {
    const ACTION: &str = "create strain";
    let form = submitted(form, ACTION)?;
    let Some(name) = field(&form.name) else {
        return Err(ActionFailure::bad_request(ACTION, "name is required"));
    };
    let token = require_session(&jar, ACTION)?;

    let strain = backend
        .create_strain(name, field(&form.description), &token)
        .await
        .map_err(|e| ActionFailure::backend(ACTION, e, "Failed to create strain"))?;
    Ok(found(&local_path(&["strain", &strain.id], &[])))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateVersionForm {
    pub code: Option<String>,
    pub wasm: Option<String>,
}

pub async fn create_strain_version(
    Backend(backend): Backend,
    jar: CookieJar,
    Path(strain_id): Path<String>,
    form: Result<Form<CreateVersionForm>, FormRejection>,
) -> ActionResult {
    const ACTION: &str = "create strain version";
    let form = submitted(form, ACTION)?;
    let (Some(code), Some(wasm)) = (field(&form.code), field(&form.wasm)) else {
        return Err(ActionFailure::bad_request(
            ACTION,
            "code and wasm are required",
        ));
    };
    let token = require_session(&jar, ACTION)?;

    let version = backend
        .create_strain_version(&strain_id, code, wasm, &token)
        .await
        .map_err(|e| ActionFailure::backend(ACTION, e, "Failed to create strain version"))?;
    Ok(found(&local_path(
        &["strain", &strain_id],
        &[("version", &version.id)],
    )))
}

#[derive(Debug, Default, Deserialize)]
pub struct RunVersionForm {
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub output: String,
}

/// Runs a version and answers in place with its execution trace.
pub async fn run_strain_version(
    Backend(backend): Backend,
    jar: CookieJar,
    Path(strain_id): Path<String>,
    form: Result<Form<RunVersionForm>, FormRejection>,
) -> ActionResult {
    const ACTION: &str = "run strain version";
    let form = submitted(form, ACTION)?;
    let Some(version_id) = field(&form.version) else {
        return Err(ActionFailure::bad_request(ACTION, "version is required"));
    };
    let token = require_session(&jar, ACTION)?;

    let output = backend
        .run_strain_version(&strain_id, version_id, &token)
        .await
        .map_err(|e| ActionFailure::backend(ACTION, e, "Failed to run strain version"))?;
    Ok(Json(RunOutput { output }).into_response())
}

pub async fn delete_strain(
    Backend(backend): Backend,
    jar: CookieJar,
    Path(strain_id): Path<String>,
) -> ActionResult {
    const ACTION: &str = "delete strain";
    let token = require_session(&jar, ACTION)?;

    backend
        .delete_strain(&strain_id, &token)
        .await
        .map_err(|e| ActionFailure::backend(ACTION, e, "Failed to delete strain"))?;
    Ok(found("/profile"))
}

// ── Battles ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct BattleForm {
    pub strain_a: Option<String>,
    pub strain_b: Option<String>,
}

pub async fn request_battle(
    Backend(backend): Backend,
    jar: CookieJar,
    form: Result<Form<BattleForm>, FormRejection>,
) -> ActionResult {
    const ACTION: &str = "request battle";
    let form = submitted(form, ACTION)?;
    let (Some(strain_a), Some(strain_b)) = (field(&form.strain_a), field(&form.strain_b)) else {
        return Err(ActionFailure::bad_request(
            ACTION,
            "strain_a and strain_b are required",
        ));
    };
    let token = require_session(&jar, ACTION)?;

    let battle = backend
        .request_battle(strain_a, strain_b, &token)
        .await
        .map_err(|e| ActionFailure::backend(ACTION, e, "Failed to run battle"))?;
    Ok(found(&local_path(&["battle", &battle.meta.id], &[])))
}
