use crate::db::Actor;
use crate::error::VotingError;
use crate::startup::AppState;
use crate::voting::{BusRequest, Decision};
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PastTopicsQuery {
    pub limit: Option<usize>,
}

/// Active topics with their tallies; `has_voted` is set for the caller
/// when an identity is supplied.
pub async fn list_active_topics(
    Extension(app_state): Extension<AppState>,
    actor: Option<Actor>,
) -> Result<impl IntoResponse, VotingError> {
    let topics = app_state.manager.list_active_topics().await?;
    let views = app_state
        .manager
        .topic_views(topics, actor.as_ref())
        .await?;

    Ok((StatusCode::OK, Json(views)))
}

pub async fn list_past_topics(
    Extension(app_state): Extension<AppState>,
    actor: Option<Actor>,
    Query(query): Query<PastTopicsQuery>,
) -> Result<impl IntoResponse, VotingError> {
    let limit = query.limit.unwrap_or(app_state.past_topics_limit);
    let topics = app_state.manager.list_past_topics(Some(limit)).await?;
    let views = app_state
        .manager
        .topic_views(topics, actor.as_ref())
        .await?;

    Ok((StatusCode::OK, Json(views)))
}

pub async fn review_queue(
    Extension(app_state): Extension<AppState>,
) -> Result<impl IntoResponse, VotingError> {
    let views = app_state.manager.review_queue(Utc::now()).await?;
    Ok((StatusCode::OK, Json(views)))
}

/// Request an additional bus (students) or open a topic (coordinators)
pub async fn create_topic(
    Extension(app_state): Extension<AppState>,
    actor: Actor,
    Json(payload): Json<BusRequest>,
) -> Result<impl IntoResponse, VotingError> {
    let topic = app_state.manager.create_topic(&payload, &actor).await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

pub async fn get_topic(
    Extension(app_state): Extension<AppState>,
    actor: Option<Actor>,
    Path(topic_id): Path<Uuid>,
) -> Result<impl IntoResponse, VotingError> {
    let topic = app_state.manager.get_topic(topic_id).await?;
    let view = app_state.manager.topic_view(topic, actor.as_ref()).await?;
    Ok((StatusCode::OK, Json(view)))
}

pub async fn cast_vote(
    Extension(app_state): Extension<AppState>,
    actor: Actor,
    Path(topic_id): Path<Uuid>,
) -> Result<impl IntoResponse, VotingError> {
    let receipt = app_state.manager.cast_vote(topic_id, &actor).await?;
    Ok((StatusCode::OK, Json(receipt)))
}

/// Approve or reject an active topic (coordinators)
pub async fn dispose_topic(
    Extension(app_state): Extension<AppState>,
    actor: Actor,
    Path(topic_id): Path<Uuid>,
    Json(decision): Json<Decision>,
) -> Result<impl IntoResponse, VotingError> {
    info!(%topic_id, coordinator = %actor.id, "Disposition requested");
    let topic = app_state.manager.dispose_topic(topic_id, decision).await?;
    Ok((StatusCode::OK, Json(topic)))
}

pub async fn complete_topic(
    Extension(app_state): Extension<AppState>,
    actor: Actor,
    Path(topic_id): Path<Uuid>,
) -> Result<impl IntoResponse, VotingError> {
    info!(%topic_id, coordinator = %actor.id, "Completion requested");
    let topic = app_state
        .manager
        .complete_topic(topic_id, Utc::now())
        .await?;
    Ok((StatusCode::OK, Json(topic)))
}
