pub mod central;
pub mod jwt;
pub mod password;

pub use password::{hash_password, verify_password};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use ecto_domain::entities::{IdentityType, Member};
use ecto_domain::trace::TraceEvent;
use ecto_domain::{EctoError, Result};
use uuid::Uuid;

use crate::state::AppState;

pub struct VerifiedIdentity {
    pub user_id: Uuid,
    pub identity_type: IdentityType,
    /// Present only for the server-JWT path; the caller must compare this
    /// against the member's current `token_version` before trusting it.
    pub token_version_claim: Option<i32>,
}

/// Ordered try-list per §4.6: server-JWT first, central token second. Only
/// the central path is cached (JWT verification is a cheap local op).
pub async fn verify_token(state: &AppState, token: &str) -> Result<VerifiedIdentity> {
    match jwt::decode(&state.config.jwt_secret, token) {
        Ok(claims) => {
            TraceEvent::TokenVerified { user_id: claims.sub.to_string(), cache_hit: false }.emit();
            return Ok(VerifiedIdentity { user_id: claims.sub, identity_type: claims.identity_type, token_version_claim: claims.tv });
        }
        Err(jwt_err) => {
            let Some(central_url) = state.config.central_url.as_deref() else {
                return Err(jwt_err);
            };

            if let Some((user_id, _tv)) = state.token_cache.get(token) {
                TraceEvent::TokenVerified { user_id: user_id.to_string(), cache_hit: true }.emit();
                return Ok(VerifiedIdentity { user_id, identity_type: IdentityType::Global, token_version_claim: None });
            }

            let verified = central::verify(&state.http, central_url, token)
                .await?
                .ok_or_else(|| EctoError::Auth("token rejected by central auth".into()))?;

            ecto_db::repo::users::upsert_cached_profile(
                &state.db,
                verified.user_id,
                &verified.username,
                &verified.discriminator,
                verified.display_name.as_deref(),
                verified.avatar_url.as_deref(),
            )
            .await?;

            state.token_cache.insert(token, verified.user_id, 0);
            TraceEvent::TokenVerified { user_id: verified.user_id.to_string(), cache_hit: false }.emit();
            Ok(VerifiedIdentity { user_id: verified.user_id, identity_type: IdentityType::Global, token_version_claim: None })
        }
    }
}

/// Resolves a bearer token all the way down to a `Member` row of this
/// process's single tenant server, rejecting stale (token-version-bumped)
/// JWTs along the way.
pub async fn authenticate(state: &AppState, token: &str) -> Result<Member> {
    let identity = verify_token(state, token).await?;
    let member = ecto_db::repo::members::get(&state.db, state.server_id, identity.user_id).await.map_err(|_| {
        EctoError::Auth("not a member of this server".into())
    })?;
    if let Some(tv) = identity.token_version_claim {
        if tv != member.token_version {
            return Err(EctoError::Auth("token has been invalidated".into()));
        }
    }
    Ok(member)
}

/// Axum extractor: `Authenticated(member)`. Reads `Authorization: Bearer`,
/// runs the full verification try-list, and resolves the caller's `Member`
/// row. Use in any RPC handler that requires a logged-in member.
pub struct Authenticated(pub Member);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(unauthorized)?;

        let member = authenticate(state, token).await.map_err(|_| unauthorized())?;
        Ok(Authenticated(member))
    }
}

fn unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "ecto_code": 1000, "ecto_error": "missing or invalid bearer token" })))
}
