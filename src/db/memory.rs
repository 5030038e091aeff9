use crate::db::models::{Actor, NewTopic, Region, Topic, TopicFilter, TopicStatus, Vote};
use crate::db::store::{StoreError, StoreResult, TopicStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    topics: Vec<Topic>,
    votes: Vec<Vote>,
    profiles: HashMap<String, Region>,
}

/// Process-local [`TopicStore`]. Used when no database is configured;
/// enforces the same (topic, voter) uniqueness as the Postgres schema.
#[derive(Default)]
pub struct InMemoryTopicStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl InMemoryTopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TopicStore for InMemoryTopicStore {
    async fn list_topics(&self, filter: &TopicFilter) -> StoreResult<Vec<Topic>> {
        self.check_online()?;
        let tables = self.tables.lock().await;

        // Newest insert first, then a stable sort keeps that order for ties.
        let mut topics: Vec<Topic> = tables
            .topics
            .iter()
            .rev()
            .filter(|t| filter.statuses.contains(&t.status))
            .cloned()
            .collect();
        topics.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(limit) = filter.limit {
            topics.truncate(limit);
        }
        Ok(topics)
    }

    async fn get_topic(&self, topic_id: Uuid) -> StoreResult<Option<Topic>> {
        self.check_online()?;
        let tables = self.tables.lock().await;
        Ok(tables.topics.iter().find(|t| t.id == topic_id).cloned())
    }

    async fn count_votes(&self, topic_id: Uuid) -> StoreResult<i64> {
        self.check_online()?;
        let tables = self.tables.lock().await;
        Ok(tables.votes.iter().filter(|v| v.topic_id == topic_id).count() as i64)
    }

    async fn voter_regions(&self, topic_id: Uuid) -> StoreResult<Vec<Region>> {
        self.check_online()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .votes
            .iter()
            .filter(|v| v.topic_id == topic_id)
            .map(|v| tables.profiles.get(&v.voter_id).cloned().unwrap_or_default())
            .collect())
    }

    async fn find_vote(&self, topic_id: Uuid, voter_id: &str) -> StoreResult<Option<Vote>> {
        self.check_online()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .votes
            .iter()
            .find(|v| v.topic_id == topic_id && v.voter_id == voter_id)
            .cloned())
    }

    async fn insert_vote(&self, topic_id: Uuid, voter_id: &str) -> StoreResult<Vote> {
        self.check_online()?;
        let mut tables = self.tables.lock().await;

        if tables
            .votes
            .iter()
            .any(|v| v.topic_id == topic_id && v.voter_id == voter_id)
        {
            return Err(StoreError::UniqueViolation);
        }

        let vote = Vote {
            id: Uuid::new_v4(),
            topic_id,
            voter_id: voter_id.to_string(),
            created_at: Utc::now(),
        };
        tables.votes.push(vote.clone());
        Ok(vote)
    }

    async fn insert_topic(&self, topic: NewTopic) -> StoreResult<Topic> {
        self.check_online()?;
        let mut tables = self.tables.lock().await;

        let stored = Topic {
            id: Uuid::new_v4(),
            title: topic.title,
            description: topic.description,
            destination: topic.destination,
            status: TopicStatus::Active,
            start_at: topic.start_at,
            end_at: topic.end_at,
            region: topic.region,
            creator_id: topic.creator_id,
            created_at: Utc::now(),
            rejection_reason: None,
        };
        tables.topics.push(stored.clone());
        Ok(stored)
    }

    async fn update_topic_status(
        &self,
        topic_id: Uuid,
        expected: TopicStatus,
        status: TopicStatus,
        reason: Option<&str>,
    ) -> StoreResult<bool> {
        self.check_online()?;
        let mut tables = self.tables.lock().await;

        match tables
            .topics
            .iter_mut()
            .find(|t| t.id == topic_id && t.status == expected)
        {
            Some(topic) => {
                topic.status = status;
                topic.rejection_reason = reason.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save_profile(&self, actor: &Actor) -> StoreResult<()> {
        self.check_online()?;
        let mut tables = self.tables.lock().await;
        tables
            .profiles
            .insert(actor.id.clone(), actor.region.clone());
        Ok(())
    }
}
