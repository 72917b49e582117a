// Typed client for the Codestrain backend REST API.
//
// Every operation builds one request, hands it to the injected transport and
// maps the answer: 2xx is decoded, anything else becomes an `HttpError`.
// Nothing is retried and nothing is cached.

pub mod error;
pub mod transport;
pub mod types;


use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::metrics;

pub use error::{BackendError, HttpError, TransportError};
pub use transport::{BackendRequest, BackendResponse, ReqwestTransport, Transport};
use types::*;

/// Header carrying the inbound request's correlation id to the backend.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct BackendClient {
    base_url: Url,
    transport: Arc<dyn Transport>,
    request_id: Option<String>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url.as_str())
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Client over reqwest with a bounded per-call timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let transport = ReqwestTransport::new(timeout).map_err(|source| BackendError::Transport {
            operation: "initialize backend client",
            source,
        })?;
        Self::with_transport(base_url, Arc::new(transport))
    }

    pub fn with_transport(
        base_url: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, BackendError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| BackendError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(BackendError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url: parsed,
            transport,
            request_id: None,
        })
    }

    /// A copy of this client that stamps `request_id` on every backend call.
    pub fn scoped(&self, request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append percent-encoded path segments to the base URL.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // The base was checked to be a base URL in the constructor.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url, token: Option<&str>) -> BackendRequest {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Dropping session token that is not a valid header value"),
            }
        }
        if let Some(id) = self.request_id.as_deref() {
            if let Ok(value) = HeaderValue::from_str(id) {
                headers.insert(REQUEST_ID_HEADER, value);
            }
        }
        BackendRequest {
            method,
            url,
            headers,
            body: None,
        }
    }

    fn json_request<B: Serialize>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        token: Option<&str>,
        body: &B,
    ) -> Result<BackendRequest, BackendError> {
        let mut request = self.request(method, url, token);
        let bytes =
            serde_json::to_vec(body).map_err(|source| BackendError::Json { operation, source })?;
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request.body = Some(bytes);
        Ok(request)
    }

    async fn execute(
        &self,
        operation: &'static str,
        request: BackendRequest,
    ) -> Result<BackendResponse, BackendError> {
        let method = request.method.clone();
        let path = request.url.path().to_string();

        let timer = metrics::BACKEND_REQUEST_DURATION_SECONDS
            .with_label_values(&[operation])
            .start_timer();
        let result = self.transport.send(request).await;
        timer.observe_duration();

        let response = match result {
            Ok(response) => response,
            Err(source) => {
                metrics::BACKEND_REQUESTS_TOTAL
                    .with_label_values(&[operation, "error"])
                    .inc();
                tracing::debug!(%method, %path, "backend call failed: {source}");
                return Err(BackendError::Transport { operation, source });
            }
        };

        metrics::BACKEND_REQUESTS_TOTAL
            .with_label_values(&[operation, response.status.as_str()])
            .inc();
        tracing::debug!(%method, %path, status = response.status.as_u16(), "backend {operation}");

        if !response.status.is_success() {
            return Err(HttpError {
                operation,
                status: response.status.as_u16(),
                body: response.text(),
            }
            .into());
        }
        Ok(response)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: BackendRequest,
    ) -> Result<T, BackendError> {
        let response = self.execute(operation, request).await?;
        serde_json::from_slice(&response.body)
            .map_err(|source| BackendError::Json { operation, source })
    }

    // ── Users & sessions ──────────────────────────────────────────────

    pub async fn get_users(&self) -> Result<Vec<User>, BackendError> {
        let request = self.request(Method::GET, self.endpoint(&["user"]), None);
        self.fetch_json("fetch users", request).await
    }

    pub async fn get_user(&self, id: &str) -> Result<User, BackendError> {
        let request = self.request(Method::GET, self.endpoint(&["user", id]), None);
        self.fetch_json("fetch user", request).await
    }

    /// Registration.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, BackendError> {
        const OP: &str = "register";
        let body = CreateUserRequest {
            name,
            email,
            password,
        };
        let request = self.json_request(OP, Method::POST, self.endpoint(&["user"]), None, &body)?;
        self.fetch_json(OP, request).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        const OP: &str = "login";
        let body = LoginRequest { email, password };
        let request = self.json_request(OP, Method::POST, self.endpoint(&["login"]), None, &body)?;
        self.fetch_json(OP, request).await
    }

    pub async fn logout(&self, token: &str) -> Result<(), BackendError> {
        const OP: &str = "logout";
        let body = LogoutRequest { token };
        let request = self.json_request(OP, Method::POST, self.endpoint(&["logout"]), None, &body)?;
        self.execute(OP, request).await.map(|_| ())
    }

    /// The user owning `token`. Fails when the backend rejects the token.
    pub async fn me(&self, token: &str) -> Result<User, BackendError> {
        let request = self.request(Method::GET, self.endpoint(&["me"]), Some(token));
        self.fetch_json("fetch current user", request).await
    }

    // ── Strains ───────────────────────────────────────────────────────

    /// All strains, or only those of `creator_id` when given.
    pub async fn get_strains(&self, creator_id: Option<&str>) -> Result<Vec<Strain>, BackendError> {
        let mut url = self.endpoint(&["strain"]);
        if let Some(creator_id) = creator_id {
            url.query_pairs_mut().append_pair("creator_id", creator_id);
        }
        let request = self.request(Method::GET, url, None);
        self.fetch_json("fetch strains", request).await
    }

    pub async fn create_strain(
        &self,
        name: &str,
        description: Option<&str>,
        token: &str,
    ) -> Result<Strain, BackendError> {
        const OP: &str = "create strain";
        let body = CreateStrainRequest { name, description };
        let request =
            self.json_request(OP, Method::POST, self.endpoint(&["strain"]), Some(token), &body)?;
        self.fetch_json(OP, request).await
    }

    pub async fn get_strain(&self, id: &str) -> Result<Strain, BackendError> {
        let request = self.request(Method::GET, self.endpoint(&["strain", id]), None);
        self.fetch_json("fetch strain", request).await
    }

    pub async fn get_strain_with_versions(
        &self,
        id: &str,
    ) -> Result<StrainWithVersions, BackendError> {
        let request = self.request(Method::GET, self.endpoint(&["strain", id]), None);
        self.fetch_json("fetch strain", request).await
    }

    pub async fn delete_strain(&self, id: &str, token: &str) -> Result<(), BackendError> {
        let request = self.request(Method::DELETE, self.endpoint(&["strain", id]), Some(token));
        self.execute("delete strain", request).await.map(|_| ())
    }

    // ── Strain versions ───────────────────────────────────────────────

    pub async fn create_strain_version(
        &self,
        strain_id: &str,
        code: &str,
        wasm: &str,
        token: &str,
    ) -> Result<StrainVersionMeta, BackendError> {
        const OP: &str = "create strain version";
        let body = CreateStrainVersionRequest { code, wasm };
        let url = self.endpoint(&["strain", strain_id, "version"]);
        let request = self.json_request(OP, Method::POST, url, Some(token), &body)?;
        self.fetch_json(OP, request).await
    }

    pub async fn get_strain_version(
        &self,
        strain_id: &str,
        version_id: &str,
    ) -> Result<StrainVersion, BackendError> {
        let url = self.endpoint(&["strain", strain_id, "version", version_id]);
        let request = self.request(Method::GET, url, None);
        self.fetch_json("fetch strain version", request).await
    }

    /// Execute a version on the backend. The answer is the raw execution trace.
    pub async fn run_strain_version(
        &self,
        strain_id: &str,
        version_id: &str,
        token: &str,
    ) -> Result<String, BackendError> {
        let url = self.endpoint(&["strain", strain_id, "version", version_id, "run"]);
        let request = self.request(Method::GET, url, Some(token));
        let response = self.execute("run strain version", request).await?;
        Ok(response.text())
    }

    // ── Battles ───────────────────────────────────────────────────────

    pub async fn request_battle(
        &self,
        strain_a: &str,
        strain_b: &str,
        token: &str,
    ) -> Result<BattleResult, BackendError> {
        const OP: &str = "request battle";
        let body = BattleRequest { strain_a, strain_b };
        let request =
            self.json_request(OP, Method::POST, self.endpoint(&["battle"]), Some(token), &body)?;
        self.fetch_json(OP, request).await
    }

    pub async fn get_battle(&self, id: &str) -> Result<BattleResult, BackendError> {
        let request = self.request(Method::GET, self.endpoint(&["battle", id]), None);
        self.fetch_json("fetch battle", request).await
    }

    pub async fn get_battles(&self) -> Result<Vec<BattleMeta>, BackendError> {
        let request = self.request(Method::GET, self.endpoint(&["battle"]), None);
        self.fetch_json("fetch battles", request).await
    }
}
