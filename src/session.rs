// Session resolution: turn the `session` cookie into an authenticated user
// for one page render, and evict cookies the backend no longer accepts.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::app::Backend;
use crate::backend::types::User;
use crate::backend::{BackendClient, BackendError};
use crate::metrics;
use crate::pages::LoadError;

pub const SESSION_COOKIE: &str = "session";

/// 30 days.
pub const SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 30;

/// Who is making the current request.
///
/// The only transition this module performs is `Authenticated -> Anonymous`,
/// when the backend rejects the token. Logging in happens in the login action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionContext {
    #[default]
    Anonymous,
    Authenticated { token: String, user: User },
}

impl SessionContext {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionContext::Authenticated { user, .. } => Some(user),
            SessionContext::Anonymous => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            SessionContext::Authenticated { token, .. } => Some(token),
            SessionContext::Anonymous => None,
        }
    }
}

/// The session token carried by the request, if any.
pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// RFC 6265 cookie-octet: printable ASCII minus space, `"`, `,`, `;` and `\`.
fn is_cookie_value(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E))
}

/// Root-scoped, secure, HTTP-only session cookie for `token`.
///
/// Returns `None` when the token cannot be stored in a cookie as-is.
pub fn session_cookie(token: &str) -> Option<Cookie<'static>> {
    if !is_cookie_value(token) {
        return None;
    }
    Some(
        Cookie::build((SESSION_COOKIE, token.to_string()))
            .path("/")
            .max_age(time::Duration::seconds(SESSION_MAX_AGE_SECS))
            .secure(true)
            .http_only(true)
            .build(),
    )
}

/// Cookie matching the session cookie's scope, for removal from a jar.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Resolve the request's session against the backend's `/me`.
///
/// No cookie yields `Anonymous`. A rejection (any non-2xx) evicts the cookie
/// and yields `Anonymous`. Failing to reach the backend at all is a load error.
pub async fn resolve(
    backend: &BackendClient,
    jar: CookieJar,
) -> Result<(CookieJar, SessionContext), BackendError> {
    let Some(token) = session_token(&jar) else {
        return Ok((jar, SessionContext::Anonymous));
    };

    match backend.me(&token).await {
        Ok(user) => Ok((jar, SessionContext::Authenticated { token, user })),
        Err(BackendError::Http(e)) => {
            tracing::warn!(status = e.status, "Session rejected by backend, clearing cookie");
            metrics::SESSIONS_EVICTED_TOTAL.inc();
            Ok((jar.remove(removal_cookie()), SessionContext::Anonymous))
        }
        Err(e) => Err(e),
    }
}

/// Middleware: resolve the session once, expose it to the page loader as an
/// extension, and attach any cookie eviction to the response.
pub async fn resolve_session(
    Backend(backend): Backend,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let (jar, context) = match resolve(&backend, jar).await {
        Ok(resolved) => resolved,
        Err(e) => return LoadError::from(e).into_response(),
    };
    req.extensions_mut().insert(context);
    let response = next.run(req).await;
    (jar, response).into_response()
}
