use crate::db::{Actor, Region};
use crate::error::{VotingError, VotingResult};
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use tracing::debug;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_REGION_HEADER: &str = "x-user-region";

/// Reads the caller's identity from request headers. The id is required;
/// a missing region is kept as an empty one, which tallies as another
/// region.
pub fn actor_from_headers(headers: &HeaderMap) -> VotingResult<Actor> {
    let id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(VotingError::MissingIdentity)?;

    let region = headers
        .get(USER_REGION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    let actor = Actor::new(id, Region::new(region));
    if !actor.region.is_known() {
        debug!(actor = %actor.id, region = %actor.region, "unrecognised region");
    }
    Ok(actor)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = VotingError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
    }
}
