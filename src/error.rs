use crate::db::{StoreError, TopicStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VotingError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Missing user identity")]
    MissingIdentity,
    #[error("Topic not found")]
    TopicNotFound,
    #[error("User already voted on this topic")]
    DuplicateVote,
    #[error("Topic is {status}, not active")]
    InvalidState { status: TopicStatus },
    #[error("Store error: {0}")]
    Store(String),
}

pub type VotingResult<T> = Result<T, VotingError>;

impl VotingError {
    pub fn validation(message: impl Into<String>) -> Self {
        VotingError::Validation(message.into())
    }
}

impl IntoResponse for VotingError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            VotingError::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            VotingError::MissingIdentity => (StatusCode::UNAUTHORIZED, "Missing user identity"),
            VotingError::TopicNotFound => (StatusCode::NOT_FOUND, "Topic not found"),
            VotingError::DuplicateVote => {
                (StatusCode::CONFLICT, "User already voted on this topic")
            }
            VotingError::InvalidState { .. } => (StatusCode::CONFLICT, "Topic is not active"),
            VotingError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Store error"),
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for VotingError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UniqueViolation => VotingError::DuplicateVote,
            other => VotingError::Store(other.to_string()),
        }
    }
}
