//! Topic state machine and vote casting.
//!
//! ```text
//! (none) --create--> active --approve--> approved
//!                      |  \---reject---> rejected
//!                      \----complete---> completed
//! ```
//!
//! Every transition out of `active` is a coordinator action; a topic whose
//! deadline has passed stays `active` until someone disposes of it.

use crate::config::Config;
use crate::db::{Actor, SharedTopicStore, StoreError, Topic, TopicFilter, TopicStatus, Vote};
use crate::error::{VotingError, VotingResult};
use crate::voting::submission::{BusRequest, format_request};
use crate::voting::tally::{Tally, tally};
use chrono::{DateTime, FixedOffset, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub vote_threshold: f64,
    pub campus_offset: FixedOffset,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        EngineSettings {
            vote_threshold: config.vote_threshold,
            campus_offset: config.campus_offset,
        }
    }
}

/// A topic as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicView {
    #[serde(flatten)]
    pub topic: Topic,
    pub tally: Tally,
    pub has_voted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteReceipt {
    pub vote: Vote,
    pub tally: Tally,
}

/// A coordinator's terminal decision on an active topic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "decision")]
pub enum Decision {
    /// The assignment is logged but not stored.
    #[serde(rename = "approved")]
    Approve {
        #[serde(default)]
        bus: String,
        #[serde(default)]
        driver: String,
    },
    #[serde(rename = "rejected")]
    Reject {
        #[serde(default)]
        reason: String,
    },
}

impl Decision {
    fn status(&self) -> TopicStatus {
        match self {
            Decision::Approve { .. } => TopicStatus::Approved,
            Decision::Reject { .. } => TopicStatus::Rejected,
        }
    }

    fn validate(&self) -> VotingResult<()> {
        match self {
            Decision::Approve { bus, driver } => {
                if bus.trim().is_empty() || driver.trim().is_empty() {
                    return Err(VotingError::validation(
                        "approval requires an assigned bus and driver",
                    ));
                }
            }
            Decision::Reject { reason } => {
                if reason.trim().is_empty() {
                    return Err(VotingError::validation("rejection requires a reason"));
                }
            }
        }
        Ok(())
    }
}

pub struct LifecycleManager {
    store: SharedTopicStore,
    settings: EngineSettings,
}

impl LifecycleManager {
    pub fn new(store: SharedTopicStore, settings: EngineSettings) -> Self {
        LifecycleManager { store, settings }
    }

    /// Validates and stores a new bus request. Nothing is written if the
    /// request is malformed.
    pub async fn create_topic(&self, request: &BusRequest, creator: &Actor) -> VotingResult<Topic> {
        let new_topic = format_request(request, creator, self.settings.campus_offset, Utc::now())?;

        self.store.save_profile(creator).await?;
        let topic = self.store.insert_topic(new_topic).await?;

        info!(
            topic_id = %topic.id,
            creator = %creator.id,
            region = %topic.region,
            end_at = %topic.end_at,
            "Bus request created"
        );
        Ok(topic)
    }

    pub async fn get_topic(&self, topic_id: Uuid) -> VotingResult<Topic> {
        self.store
            .get_topic(topic_id)
            .await?
            .ok_or(VotingError::TopicNotFound)
    }

    /// Records `voter`'s vote on an active topic and returns the new tally.
    ///
    /// The existing-vote lookup only saves a doomed write; the store's
    /// uniqueness check on insert is what rules out a second vote when two
    /// requests from the same voter race.
    pub async fn cast_vote(&self, topic_id: Uuid, voter: &Actor) -> VotingResult<VoteReceipt> {
        let topic = self.get_topic(topic_id).await?;
        if topic.status != TopicStatus::Active {
            warn!(%topic_id, status = %topic.status, voter = %voter.id, "Vote on closed topic");
            return Err(VotingError::InvalidState {
                status: topic.status,
            });
        }

        if self.store.find_vote(topic_id, &voter.id).await?.is_some() {
            warn!(%topic_id, voter = %voter.id, "Duplicate vote rejected");
            return Err(VotingError::DuplicateVote);
        }

        self.store.save_profile(voter).await?;
        let vote = match self.store.insert_vote(topic_id, &voter.id).await {
            Ok(vote) => vote,
            Err(StoreError::UniqueViolation) => {
                warn!(%topic_id, voter = %voter.id, "Concurrent duplicate vote rejected");
                return Err(VotingError::DuplicateVote);
            }
            Err(e) => return Err(e.into()),
        };

        // A failure here leaves the vote in place; the next refresh reconciles.
        let tally = self.tally_topic(&topic).await?;

        info!(
            %topic_id,
            voter = %voter.id,
            weighted_score = tally.weighted_score,
            threshold_met = tally.threshold_met,
            "Vote recorded"
        );
        Ok(VoteReceipt { vote, tally })
    }

    /// Approves or rejects an active topic. A closed or unknown topic is
    /// reported before the decision itself is checked.
    pub async fn dispose_topic(&self, topic_id: Uuid, decision: Decision) -> VotingResult<Topic> {
        let topic = self.get_topic(topic_id).await?;
        if topic.status != TopicStatus::Active {
            return Err(VotingError::InvalidState {
                status: topic.status,
            });
        }
        decision.validate()?;

        let reason = match &decision {
            Decision::Reject { reason } => Some(reason.trim().to_string()),
            Decision::Approve { .. } => None,
        };

        let topic = self
            .transition(topic, decision.status(), reason.as_deref())
            .await?;

        match &decision {
            Decision::Approve { bus, driver } => {
                info!(%topic_id, bus = %bus, driver = %driver, "Bus request approved")
            }
            Decision::Reject { reason } => {
                info!(%topic_id, reason = %reason.trim(), "Bus request rejected")
            }
        }
        Ok(topic)
    }

    /// Marks an active topic completed once its threshold is met or its
    /// deadline has passed.
    pub async fn complete_topic(&self, topic_id: Uuid, now: DateTime<Utc>) -> VotingResult<Topic> {
        let topic = self.get_topic(topic_id).await?;
        if topic.status != TopicStatus::Active {
            return Err(VotingError::InvalidState {
                status: topic.status,
            });
        }

        let tally = self.tally_topic(&topic).await?;
        if !Self::is_due(&topic, &tally, now) {
            return Err(VotingError::validation(
                "topic has neither reached its threshold nor passed its deadline",
            ));
        }

        let topic = self.transition(topic, TopicStatus::Completed, None).await?;
        info!(%topic_id, weighted_score = tally.weighted_score, "Bus request completed");
        Ok(topic)
    }

    async fn transition(
        &self,
        mut topic: Topic,
        status: TopicStatus,
        reason: Option<&str>,
    ) -> VotingResult<Topic> {
        if topic.status != TopicStatus::Active {
            warn!(topic_id = %topic.id, status = %topic.status, "Transition on closed topic");
            return Err(VotingError::InvalidState {
                status: topic.status,
            });
        }

        let changed = self
            .store
            .update_topic_status(topic.id, TopicStatus::Active, status, reason)
            .await?;

        if !changed {
            // Someone else closed it between our read and write.
            let current = self.get_topic(topic.id).await?;
            warn!(topic_id = %topic.id, status = %current.status, "Transition lost a race");
            return Err(VotingError::InvalidState {
                status: current.status,
            });
        }

        topic.status = status;
        topic.rejection_reason = reason.map(str::to_string);
        Ok(topic)
    }

    pub async fn list_active_topics(&self) -> VotingResult<Vec<Topic>> {
        Ok(self.store.list_topics(&TopicFilter::active()).await?)
    }

    /// Completed, approved and rejected topics, most recent first.
    pub async fn list_past_topics(&self, limit: Option<usize>) -> VotingResult<Vec<Topic>> {
        Ok(self.store.list_topics(&TopicFilter::past(limit)).await?)
    }

    pub async fn tally_topic(&self, topic: &Topic) -> VotingResult<Tally> {
        let regions = self.store.voter_regions(topic.id).await?;
        Ok(tally(&topic.region, &regions, self.settings.vote_threshold))
    }

    pub async fn vote_count(&self, topic_id: Uuid) -> VotingResult<i64> {
        Ok(self.store.count_votes(topic_id).await?)
    }

    pub async fn topic_view(&self, topic: Topic, viewer: Option<&Actor>) -> VotingResult<TopicView> {
        let tally = self.tally_topic(&topic).await?;
        let has_voted = match viewer {
            Some(actor) => self.store.find_vote(topic.id, &actor.id).await?.is_some(),
            None => false,
        };
        Ok(TopicView {
            topic,
            tally,
            has_voted,
        })
    }

    pub async fn topic_views(
        &self,
        topics: Vec<Topic>,
        viewer: Option<&Actor>,
    ) -> VotingResult<Vec<TopicView>> {
        try_join_all(topics.into_iter().map(|topic| self.topic_view(topic, viewer))).await
    }

    /// Active topics a coordinator should look at: threshold met or
    /// deadline passed.
    pub async fn review_queue(&self, now: DateTime<Utc>) -> VotingResult<Vec<TopicView>> {
        let active = self.list_active_topics().await?;
        let views = self.topic_views(active, None).await?;
        Ok(views
            .into_iter()
            .filter(|view| Self::is_due(&view.topic, &view.tally, now))
            .collect())
    }

    fn is_due(topic: &Topic, tally: &Tally, now: DateTime<Utc>) -> bool {
        tally.threshold_met || topic.end_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryTopicStore, TopicStore};
    use chrono::Duration;
    use std::sync::Arc;

    fn settings(threshold: f64) -> EngineSettings {
        EngineSettings {
            vote_threshold: threshold,
            campus_offset: FixedOffset::east_opt(330 * 60).unwrap(),
        }
    }

    fn manager_with(threshold: f64) -> (LifecycleManager, Arc<InMemoryTopicStore>) {
        let store = Arc::new(InMemoryTopicStore::new());
        (LifecycleManager::new(store.clone(), settings(threshold)), store)
    }

    fn tomorrow() -> String {
        (Utc::now() + Duration::days(1)).date_naive().to_string()
    }

    fn evening_bus(destination: &str) -> BusRequest {
        BusRequest {
            destination: destination.into(),
            description: "Need an evening bus".into(),
            date: tomorrow(),
            time: "18:30".into(),
        }
    }

    fn hubli_student(id: &str) -> Actor {
        Actor::new(id, "Hubli")
    }

    #[tokio::test]
    async fn create_topic_starts_active_with_no_votes() {
        let (manager, _) = manager_with(25.0);
        let topic = manager
            .create_topic(&evening_bus("Dharwad"), &hubli_student("s-1"))
            .await
            .unwrap();

        assert_eq!(topic.status, TopicStatus::Active);
        assert_eq!(topic.title, "Additional Bus to Dharwad");
        assert_eq!(topic.region.as_str(), "Hubli");
        assert_eq!(manager.tally_topic(&topic).await.unwrap().raw_count, 0);
        assert_eq!(manager.list_active_topics().await.unwrap(), vec![topic]);
    }

    #[tokio::test]
    async fn invalid_request_writes_nothing() {
        let (manager, store) = manager_with(25.0);
        let mut request = evening_bus("Dharwad");
        request.description = "Short".into();

        let err = manager
            .create_topic(&request, &hubli_student("s-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, VotingError::Validation(_)));
        assert!(store.list_topics(&TopicFilter::active()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_region_vote_weighs_one() {
        let (manager, _) = manager_with(25.0);
        let topic = manager
            .create_topic(&evening_bus("Dharwad"), &hubli_student("s-1"))
            .await
            .unwrap();

        let receipt = manager.cast_vote(topic.id, &hubli_student("s-2")).await.unwrap();

        assert_eq!(receipt.tally.weighted_score, 1.0);
        assert_eq!(receipt.tally.same_region_count, 1);
        assert_eq!(receipt.vote.voter_id, "s-2");
    }

    #[tokio::test]
    async fn other_region_vote_weighs_half() {
        let (manager, _) = manager_with(25.0);
        let topic = manager
            .create_topic(&evening_bus("Dharwad"), &hubli_student("s-1"))
            .await
            .unwrap();

        let receipt = manager
            .cast_vote(topic.id, &Actor::new("s-3", "Dharwad"))
            .await
            .unwrap();

        assert_eq!(receipt.tally.weighted_score, 0.5);
        assert_eq!(receipt.tally.other_region_count, 1);
    }

    #[tokio::test]
    async fn second_vote_is_rejected_and_not_counted() {
        let (manager, _) = manager_with(25.0);
        let topic = manager
            .create_topic(&evening_bus("Dharwad"), &hubli_student("s-1"))
            .await
            .unwrap();
        let voter = hubli_student("s-2");

        manager.cast_vote(topic.id, &voter).await.unwrap();
        let err = manager.cast_vote(topic.id, &voter).await.unwrap_err();

        assert!(matches!(err, VotingError::DuplicateVote));
        assert_eq!(manager.vote_count(topic.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn racing_votes_from_one_voter_count_once() {
        let (manager, _) = manager_with(25.0);
        let manager = Arc::new(manager);
        let topic = manager
            .create_topic(&evening_bus("Dharwad"), &hubli_student("s-1"))
            .await
            .unwrap();

        let topic_id = topic.id;

        let attempts = (0..8).map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move {
                let voter = hubli_student("s-2");
                manager.cast_vote(topic_id, &voter).await
            })
        });
        let results = futures::future::join_all(attempts).await;

        let accepted = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(manager.vote_count(topic_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn vote_on_unknown_topic_is_not_found() {
        let (manager, _) = manager_with(25.0);
        let err = manager
            .cast_vote(Uuid::new_v4(), &hubli_student("s-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::TopicNotFound));
    }

    #[tokio::test]
    async fn rejected_topic_is_terminal() {
        let (manager, _) = manager_with(25.0);
        let topic = manager
            .create_topic(&evening_bus("Dharwad"), &hubli_student("s-1"))
            .await
            .unwrap();

        let rejected = manager
            .dispose_topic(
                topic.id,
                Decision::Reject {
                    reason: "Insufficient driver availability".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, TopicStatus::Rejected);
        assert_eq!(
            manager.get_topic(topic.id).await.unwrap().rejection_reason.as_deref(),
            Some("Insufficient driver availability")
        );

        let vote = manager.cast_vote(topic.id, &hubli_student("s-2")).await;
        assert!(matches!(
            vote,
            Err(VotingError::InvalidState {
                status: TopicStatus::Rejected
            })
        ));

        let again = manager
            .dispose_topic(
                topic.id,
                Decision::Approve {
                    bus: "KA-25-F-1234".into(),
                    driver: "d-7".into(),
                },
            )
            .await;
        assert!(matches!(again, Err(VotingError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn approval_needs_assignment_and_rejection_needs_reason() {
        let (manager, _) = manager_with(25.0);
        let topic = manager
            .create_topic(&evening_bus("Dharwad"), &hubli_student("s-1"))
            .await
            .unwrap();

        let no_reason = manager
            .dispose_topic(topic.id, Decision::Reject { reason: "  ".into() })
            .await;
        assert!(matches!(no_reason, Err(VotingError::Validation(_))));

        let no_driver = manager
            .dispose_topic(
                topic.id,
                Decision::Approve {
                    bus: "KA-25-F-1234".into(),
                    driver: String::new(),
                },
            )
            .await;
        assert!(matches!(no_driver, Err(VotingError::Validation(_))));

        let approved = manager
            .dispose_topic(
                topic.id,
                Decision::Approve {
                    bus: "KA-25-F-1234".into(),
                    driver: "d-7".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(approved.status, TopicStatus::Approved);
        assert!(approved.rejection_reason.is_none());
    }

    #[tokio::test]
    async fn closed_or_unknown_topic_is_reported_before_a_bad_decision() {
        let (manager, _) = manager_with(25.0);
        let topic = manager
            .create_topic(&evening_bus("Dharwad"), &hubli_student("s-1"))
            .await
            .unwrap();
        manager
            .dispose_topic(topic.id, Decision::Reject { reason: "No buses".into() })
            .await
            .unwrap();

        let again = manager
            .dispose_topic(topic.id, Decision::Reject { reason: String::new() })
            .await;
        assert!(matches!(
            again,
            Err(VotingError::InvalidState {
                status: TopicStatus::Rejected
            })
        ));

        let unknown = manager
            .dispose_topic(Uuid::new_v4(), Decision::Reject { reason: String::new() })
            .await;
        assert!(matches!(unknown, Err(VotingError::TopicNotFound)));
    }

    #[tokio::test]
    async fn past_topics_exclude_active_and_respect_limit() {
        let (manager, _) = manager_with(25.0);
        let student = hubli_student("s-1");
        let mut ids = Vec::new();
        for destination in ["Alnavar", "Kalghatgi", "Navalgund"] {
            ids.push(manager.create_topic(&evening_bus(destination), &student).await.unwrap().id);
        }
        for id in &ids[..2] {
            manager
                .dispose_topic(*id, Decision::Reject { reason: "No buses".into() })
                .await
                .unwrap();
        }

        let past = manager.list_past_topics(None).await.unwrap();
        assert_eq!(past.len(), 2);
        assert!(past.iter().all(|t| t.status.is_terminal()));
        assert_eq!(manager.list_past_topics(Some(1)).await.unwrap().len(), 1);

        let active = manager.list_active_topics().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active, manager.list_active_topics().await.unwrap());
    }

    #[tokio::test]
    async fn completion_requires_threshold_or_deadline() {
        let (manager, _) = manager_with(2.0);
        let topic = manager
            .create_topic(&evening_bus("Dharwad"), &hubli_student("s-1"))
            .await
            .unwrap();

        let early = manager.complete_topic(topic.id, Utc::now()).await;
        assert!(matches!(early, Err(VotingError::Validation(_))));
        assert!(manager.review_queue(Utc::now()).await.unwrap().is_empty());

        let after_deadline = topic.end_at + Duration::minutes(1);
        assert_eq!(manager.review_queue(after_deadline).await.unwrap().len(), 1);

        manager.cast_vote(topic.id, &hubli_student("s-2")).await.unwrap();
        manager.cast_vote(topic.id, &hubli_student("s-3")).await.unwrap();
        let queue = manager.review_queue(Utc::now()).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert!(queue[0].tally.threshold_met);

        let completed = manager.complete_topic(topic.id, Utc::now()).await.unwrap();
        assert_eq!(completed.status, TopicStatus::Completed);
        assert!(manager.list_active_topics().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_topic_stays_active_until_disposed() {
        let (manager, _) = manager_with(25.0);
        let mut request = evening_bus("Dharwad");
        request.date = (Utc::now() - Duration::days(2)).date_naive().to_string();
        let topic = manager.create_topic(&request, &hubli_student("s-1")).await.unwrap();

        assert!(topic.end_at < Utc::now());
        let receipt = manager.cast_vote(topic.id, &hubli_student("s-2")).await.unwrap();
        assert_eq!(receipt.tally.raw_count, 1);
        assert_eq!(manager.get_topic(topic.id).await.unwrap().status, TopicStatus::Active);
    }

    #[tokio::test]
    async fn views_report_whether_viewer_voted() {
        let (manager, _) = manager_with(25.0);
        let topic = manager
            .create_topic(&evening_bus("Dharwad"), &hubli_student("s-1"))
            .await
            .unwrap();
        let voter = Actor::new("s-2", "Dharwad");
        manager.cast_vote(topic.id, &voter).await.unwrap();

        let views = manager
            .topic_views(vec![topic.clone()], Some(&voter))
            .await
            .unwrap();
        assert!(views[0].has_voted);
        assert_eq!(views[0].tally.weighted_score, 0.5);

        let other = manager
            .topic_view(topic, Some(&hubli_student("s-9")))
            .await
            .unwrap();
        assert!(!other.has_voted);
    }

    #[test]
    fn decision_deserializes_from_tagged_json() {
        let reject: Decision = serde_json::from_value(serde_json::json!({
            "decision": "rejected",
            "reason": "Insufficient driver availability"
        }))
        .unwrap();
        assert_eq!(
            reject,
            Decision::Reject {
                reason: "Insufficient driver availability".into()
            }
        );

        let approve: Decision = serde_json::from_value(serde_json::json!({
            "decision": "approved",
            "bus": "KA-25-F-1234",
            "driver": "d-7"
        }))
        .unwrap();
        assert!(matches!(approve, Decision::Approve { .. }));

        let bare: Decision =
            serde_json::from_value(serde_json::json!({"decision": "rejected"})).unwrap();
        assert!(matches!(bare.validate(), Err(VotingError::Validation(_))));
    }
}
