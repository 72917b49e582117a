// Shared state, the request-scoped backend extractor, and router assembly.

use std::convert::Infallible;
use std::path::PathBuf;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::services::ServeDir;

use crate::backend::{BackendClient, REQUEST_ID_HEADER};
use crate::{actions, metrics, pages, session};

#[derive(Clone, Debug)]
pub struct AppState {
    pub backend: BackendClient,
}

/// Correlation id of the inbound request, shared by every extractor that asks for it.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// The backend client scoped to the current request.
///
/// Reuses the inbound `x-request-id` header when present, otherwise a fresh
/// UUID, and forwards it on every backend call made for this request.
#[derive(Debug, Clone)]
pub struct Backend(pub BackendClient);

impl FromRequestParts<AppState> for Backend {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let request_id = match parts.extensions.get::<RequestId>() {
            Some(id) => id.0.clone(),
            None => {
                let id = parts
                    .headers
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                parts.extensions.insert(RequestId(id.clone()));
                id
            }
        };
        Ok(Backend(state.backend.scoped(request_id)))
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "codestrain-web" }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

/// Page loaders run behind the session resolver; form actions read the
/// session cookie themselves so their own cookie changes are never overridden.
pub fn router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let pages = Router::new()
        .route("/", get(pages::home))
        .route("/profile", get(pages::profile))
        .route("/user/{id}", get(pages::user))
        .route("/strain/{id}", get(pages::strain))
        .route("/battle", get(pages::battles))
        .route("/battle/{id}", get(pages::battle))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::resolve_session,
        ));

    let actions = Router::new()
        .route("/login", post(actions::login))
        .route("/register", post(actions::register))
        .route("/logout", get(actions::logout))
        .route("/strain", post(actions::create_strain))
        .route("/strain/{id}/version", post(actions::create_strain_version))
        .route("/strain/{id}/run", post(actions::run_strain_version))
        .route("/strain/{id}/delete", post(actions::delete_strain))
        .route("/battle", post(actions::request_battle));

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(pages)
        .merge(actions)
        .with_state(state);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}
