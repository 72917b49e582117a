// Records exchanged with the backend API as JSON.
//
// Ids and timestamps are opaque strings: they are passed through untouched and
// never parsed by this layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub admin: bool,
    /// Write-only. The backend never returns it and it is never serialized back out.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub creator_id: String,
    pub token: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strain {
    pub id: String,
    pub creator_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A version as listed on its strain or returned on creation. No source code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrainVersionMeta {
    pub id: String,
    pub strain_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A single version in detail view, carrying its source code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrainVersion {
    #[serde(flatten)]
    pub meta: StrainVersionMeta,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrainWithVersions {
    #[serde(flatten)]
    pub strain: Strain,
    #[serde(default)]
    pub versions: Vec<StrainVersionMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleMeta {
    pub id: String,
    pub arena_size: u32,
    pub strain_a: String,
    pub strain_b: String,
    #[serde(default)]
    pub winner: Option<String>,
    pub score_a: f64,
    pub score_b: f64,
}

impl BattleMeta {
    /// A winner, when present, must be one of the two participants.
    pub fn winner_is_participant(&self) -> bool {
        match &self.winner {
            Some(winner) => *winner == self.strain_a || *winner == self.strain_b,
            None => true,
        }
    }
}

/// One simulation step. `player` is `false` for strain A and `true` for strain B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleStep {
    pub player: bool,
    pub x: i32,
    pub y: i32,
    pub allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleResult {
    #[serde(flatten)]
    pub meta: BattleMeta,
    #[serde(default)]
    pub log: Vec<BattleStep>,
}

// ── Request bodies ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreateUserRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LogoutRequest<'a> {
    pub token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateStrainRequest<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct CreateStrainVersionRequest<'a> {
    pub code: &'a str,
    pub wasm: &'a str,
}

#[derive(Debug, Serialize)]
pub struct BattleRequest<'a> {
    pub strain_a: &'a str,
    pub strain_b: &'a str,
}

/// The first API generation, where code and wasm lived inline on the strain.
///
/// Kept only so stored payloads from that generation can still be read during
/// migration. Nothing in the client talks this shape to the backend.
pub mod legacy {
    use serde::{Deserialize, Serialize};

    use super::Strain;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct StrainWithExtra {
        #[serde(flatten)]
        pub strain: Strain,
        pub code: String,
        pub wasm_size: u64,
        pub wasm_hash: String,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct CreateStrainInline {
        pub name: String,
        pub description: Option<String>,
        pub code: String,
        pub wasm: String,
    }
}
