//! The persistence seam used by the voting engine.
//!
//! The engine owns no storage; it talks to a [`TopicStore`]. Two
//! implementations exist: [`PgTopicStore`] for Postgres and
//! [`crate::db::memory::InMemoryTopicStore`] for running without a database.

use crate::db::connection::DbPool;
use crate::db::models::{Actor, NewTopic, Region, Topic, TopicFilter, TopicStatus, Vote};
use crate::db::repositories;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),
    #[error("Unique constraint violated")]
    UniqueViolation,
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation
            }
            _ => StoreError::Database(error),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type SharedTopicStore = Arc<dyn TopicStore>;

#[async_trait]
pub trait TopicStore: Send + Sync {
    /// Topics whose status is in the filter, most recent first.
    async fn list_topics(&self, filter: &TopicFilter) -> StoreResult<Vec<Topic>>;

    async fn get_topic(&self, topic_id: Uuid) -> StoreResult<Option<Topic>>;

    async fn count_votes(&self, topic_id: Uuid) -> StoreResult<i64>;

    /// The region of every voter on the topic, one entry per vote.
    async fn voter_regions(&self, topic_id: Uuid) -> StoreResult<Vec<Region>>;

    async fn find_vote(&self, topic_id: Uuid, voter_id: &str) -> StoreResult<Option<Vote>>;

    /// Fails with [`StoreError::UniqueViolation`] if the voter already
    /// has a vote on the topic.
    async fn insert_vote(&self, topic_id: Uuid, voter_id: &str) -> StoreResult<Vote>;

    async fn insert_topic(&self, topic: NewTopic) -> StoreResult<Topic>;

    /// Compare-and-set on the topic status. Returns whether a row changed.
    async fn update_topic_status(
        &self,
        topic_id: Uuid,
        expected: TopicStatus,
        status: TopicStatus,
        reason: Option<&str>,
    ) -> StoreResult<bool>;

    async fn save_profile(&self, actor: &Actor) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct PgTopicStore {
    pool: DbPool,
}

impl PgTopicStore {
    pub fn new(pool: DbPool) -> Self {
        PgTopicStore { pool }
    }
}

#[async_trait]
impl TopicStore for PgTopicStore {
    async fn list_topics(&self, filter: &TopicFilter) -> StoreResult<Vec<Topic>> {
        Ok(repositories::list_topics(&self.pool, filter).await?)
    }

    async fn get_topic(&self, topic_id: Uuid) -> StoreResult<Option<Topic>> {
        Ok(repositories::get_topic(&self.pool, topic_id).await?)
    }

    async fn count_votes(&self, topic_id: Uuid) -> StoreResult<i64> {
        Ok(repositories::count_votes(&self.pool, topic_id).await?)
    }

    async fn voter_regions(&self, topic_id: Uuid) -> StoreResult<Vec<Region>> {
        Ok(repositories::voter_regions(&self.pool, topic_id).await?)
    }

    async fn find_vote(&self, topic_id: Uuid, voter_id: &str) -> StoreResult<Option<Vote>> {
        Ok(repositories::find_vote(&self.pool, topic_id, voter_id).await?)
    }

    async fn insert_vote(&self, topic_id: Uuid, voter_id: &str) -> StoreResult<Vote> {
        Ok(repositories::insert_vote(&self.pool, topic_id, voter_id).await?)
    }

    async fn insert_topic(&self, topic: NewTopic) -> StoreResult<Topic> {
        Ok(repositories::create_topic(&self.pool, &topic).await?)
    }

    async fn update_topic_status(
        &self,
        topic_id: Uuid,
        expected: TopicStatus,
        status: TopicStatus,
        reason: Option<&str>,
    ) -> StoreResult<bool> {
        Ok(repositories::update_topic_status(&self.pool, topic_id, expected, status, reason).await?)
    }

    async fn save_profile(&self, actor: &Actor) -> StoreResult<()> {
        Ok(repositories::save_profile(&self.pool, actor).await?)
    }
}
