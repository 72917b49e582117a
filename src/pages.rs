// Page data loaders.
//
// Each loader gathers exactly what its page needs and either returns all of
// it or fails on the first backend error. There is no partial rendering.

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::Backend;
use crate::backend::types::{
    BattleMeta, BattleResult, Strain, StrainVersion, StrainWithVersions, User,
};
use crate::backend::{BackendClient, BackendError};
use crate::session::SessionContext;

/// An unrecoverable load failure. Rendered as a generic error page.
#[derive(Debug)]
pub struct LoadError(pub BackendError);

impl From<BackendError> for LoadError {
    fn from(e: BackendError) -> Self {
        LoadError(e)
    }
}

impl IntoResponse for LoadError {
    fn into_response(self) -> Response {
        tracing::error!("Page load failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to load page" })),
        )
            .into_response()
    }
}

type PageResult<T> = Result<Json<T>, LoadError>;

/// Inherited by every page: the signed-in user, if any. The token stays server-side.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutData {
    pub user: Option<User>,
}

impl LayoutData {
    fn from_session(session: &SessionContext) -> Self {
        Self {
            user: session.user().cloned(),
        }
    }
}

// ── Home ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HomeData {
    #[serde(flatten)]
    pub layout: LayoutData,
    pub users: Vec<User>,
}

pub async fn load_home(
    backend: &BackendClient,
    session: &SessionContext,
) -> Result<HomeData, BackendError> {
    let users = backend.get_users().await?;
    Ok(HomeData {
        layout: LayoutData::from_session(session),
        users,
    })
}

pub async fn home(
    Backend(backend): Backend,
    Extension(session): Extension<SessionContext>,
) -> PageResult<HomeData> {
    Ok(Json(load_home(&backend, &session).await?))
}

// ── Profile ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ProfileUser {
    #[serde(flatten)]
    pub user: User,
    pub strains: Vec<Strain>,
}

/// Empty for anonymous visitors.
#[derive(Debug, Serialize)]
pub struct ProfileData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ProfileUser>,
}

pub async fn load_profile(
    backend: &BackendClient,
    session: &SessionContext,
) -> Result<ProfileData, BackendError> {
    let Some(user) = session.user() else {
        return Ok(ProfileData { user: None });
    };
    let strains = backend.get_strains(Some(user.id.as_str())).await?;
    Ok(ProfileData {
        user: Some(ProfileUser {
            user: user.clone(),
            strains,
        }),
    })
}

pub async fn profile(
    Backend(backend): Backend,
    Extension(session): Extension<SessionContext>,
) -> PageResult<ProfileData> {
    Ok(Json(load_profile(&backend, &session).await?))
}

// ── Another user's page ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UserPageData {
    #[serde(flatten)]
    pub layout: LayoutData,
    pub profile: User,
    pub strains: Vec<Strain>,
}

pub async fn load_user(
    backend: &BackendClient,
    session: &SessionContext,
    id: &str,
) -> Result<UserPageData, BackendError> {
    let (profile, strains) =
        tokio::try_join!(backend.get_user(id), backend.get_strains(Some(id)))?;
    Ok(UserPageData {
        layout: LayoutData::from_session(session),
        profile,
        strains,
    })
}

pub async fn user(
    Backend(backend): Backend,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> PageResult<UserPageData> {
    Ok(Json(load_user(&backend, &session, &id).await?))
}

// ── Strain ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct StrainPageQuery {
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StrainPageData {
    #[serde(flatten)]
    pub layout: LayoutData,
    pub strain: StrainWithVersions,
    /// Only loaded when the page was asked for a specific version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<StrainVersion>,
}

pub async fn load_strain(
    backend: &BackendClient,
    session: &SessionContext,
    id: &str,
    version_id: Option<&str>,
) -> Result<StrainPageData, BackendError> {
    let strain = backend.get_strain_with_versions(id).await?;
    let version = match version_id.filter(|v| !v.is_empty()) {
        Some(version_id) => Some(backend.get_strain_version(id, version_id).await?),
        None => None,
    };
    Ok(StrainPageData {
        layout: LayoutData::from_session(session),
        strain,
        version,
    })
}

pub async fn strain(
    Backend(backend): Backend,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    Query(query): Query<StrainPageQuery>,
) -> PageResult<StrainPageData> {
    Ok(Json(
        load_strain(&backend, &session, &id, query.version.as_deref()).await?,
    ))
}

// ── Battles ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BattlesData {
    #[serde(flatten)]
    pub layout: LayoutData,
    pub strains: Vec<Strain>,
    pub battles: Vec<BattleMeta>,
}

pub async fn load_battles(
    backend: &BackendClient,
    session: &SessionContext,
) -> Result<BattlesData, BackendError> {
    let (strains, battles) =
        tokio::try_join!(backend.get_strains(None), backend.get_battles())?;
    Ok(BattlesData {
        layout: LayoutData::from_session(session),
        strains,
        battles,
    })
}

pub async fn battles(
    Backend(backend): Backend,
    Extension(session): Extension<SessionContext>,
) -> PageResult<BattlesData> {
    Ok(Json(load_battles(&backend, &session).await?))
}

#[derive(Debug, Serialize)]
pub struct BattleData {
    #[serde(flatten)]
    pub layout: LayoutData,
    pub battle: BattleResult,
    pub strain_a: Strain,
    pub strain_b: Strain,
}

/// The battle first, then both participants at once.
pub async fn load_battle(
    backend: &BackendClient,
    session: &SessionContext,
    id: &str,
) -> Result<BattleData, BackendError> {
    let battle = backend.get_battle(id).await?;
    if !battle.meta.winner_is_participant() {
        tracing::warn!(battle_id = %battle.meta.id, "Battle winner is not one of its participants");
    }
    let (strain_a, strain_b) = tokio::try_join!(
        backend.get_strain(&battle.meta.strain_a),
        backend.get_strain(&battle.meta.strain_b),
    )?;
    Ok(BattleData {
        layout: LayoutData::from_session(session),
        battle,
        strain_a,
        strain_b,
    })
}

pub async fn battle(
    Backend(backend): Backend,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> PageResult<BattleData> {
    Ok(Json(load_battle(&backend, &session, &id).await?))
}
