//! Client-side view of the voting engine for one student.
//!
//! The board keeps a snapshot of active and past topics for its actor and
//! exposes the operations a dashboard needs. The snapshot is never
//! authoritative: every refresh replaces it with what the store says.

use crate::db::{Actor, Topic};
use crate::error::VotingResult;
use crate::voting::lifecycle::{LifecycleManager, TopicView, VoteReceipt};
use crate::voting::refresh::{RefreshHandle, spawn_refresh};
use crate::voting::submission::BusRequest;
use crate::voting::tally::Tally;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoardSnapshot {
    pub voting_topics: Vec<TopicView>,
    pub past_voting_topics: Vec<TopicView>,
    pub is_loading: bool,
    pub is_submitting: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct BoardState {
    voting_topics: Vec<TopicView>,
    past_voting_topics: Vec<TopicView>,
    loads_in_flight: usize,
    submits_in_flight: usize,
    error: Option<String>,
    applied_sequence: u64,
}

#[derive(Clone, Copy)]
enum Activity {
    Loading,
    Submitting,
}

/// Clears its activity flag on every exit path, including cancellation.
struct Busy<'a> {
    board: &'a VotingBoard,
    activity: Activity,
}

impl<'a> Busy<'a> {
    fn start(board: &'a VotingBoard, activity: Activity) -> Self {
        let mut state = board.state();
        match activity {
            Activity::Loading => state.loads_in_flight += 1,
            Activity::Submitting => state.submits_in_flight += 1,
        }
        Busy { board, activity }
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        let mut state = self.board.state();
        match self.activity {
            Activity::Loading => state.loads_in_flight = state.loads_in_flight.saturating_sub(1),
            Activity::Submitting => {
                state.submits_in_flight = state.submits_in_flight.saturating_sub(1)
            }
        }
    }
}

pub struct VotingBoard {
    manager: Arc<LifecycleManager>,
    actor: Actor,
    past_limit: Option<usize>,
    state: Mutex<BoardState>,
    sequence: AtomicU64,
}

impl VotingBoard {
    pub fn new(manager: Arc<LifecycleManager>, actor: Actor, past_limit: Option<usize>) -> Self {
        VotingBoard {
            manager,
            actor,
            past_limit,
            state: Mutex::new(BoardState::default()),
            sequence: AtomicU64::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let state = self.state();
        BoardSnapshot {
            voting_topics: state.voting_topics.clone(),
            past_voting_topics: state.past_voting_topics.clone(),
            is_loading: state.loads_in_flight > 0,
            is_submitting: state.submits_in_flight > 0,
            error: state.error.clone(),
        }
    }

    pub fn voting_topics(&self) -> Vec<TopicView> {
        self.state().voting_topics.clone()
    }

    pub fn past_voting_topics(&self) -> Vec<TopicView> {
        self.state().past_voting_topics.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loads_in_flight > 0
    }

    pub fn is_submitting(&self) -> bool {
        self.state().submits_in_flight > 0
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    /// Re-reads active and past topics with their tallies. Returns `false`
    /// if a newer result was applied while this one was in flight, in which
    /// case this result is dropped.
    pub async fn refresh(&self) -> VotingResult<bool> {
        let sequence = self.next_sequence();
        let _busy = Busy::start(self, Activity::Loading);

        match self.load().await {
            Ok((active, past)) => Ok(self.apply_refresh(sequence, active, past)),
            Err(e) => {
                let mut state = self.state();
                if sequence > state.applied_sequence {
                    state.error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn load(&self) -> VotingResult<(Vec<TopicView>, Vec<TopicView>)> {
        let manager = &self.manager;
        let viewer = Some(&self.actor);

        let (active, past) = futures::try_join!(
            manager.list_active_topics(),
            manager.list_past_topics(self.past_limit)
        )?;
        futures::try_join!(
            manager.topic_views(active, viewer),
            manager.topic_views(past, viewer)
        )
    }

    fn apply_refresh(&self, sequence: u64, active: Vec<TopicView>, past: Vec<TopicView>) -> bool {
        let mut state = self.state();
        if sequence <= state.applied_sequence {
            debug!(
                sequence,
                applied = state.applied_sequence,
                "discarding stale refresh"
            );
            return false;
        }
        state.voting_topics = active;
        state.past_voting_topics = past;
        state.error = None;
        state.applied_sequence = sequence;
        true
    }

    /// Votes on `topic_id` as this board's actor and updates the local
    /// snapshot with the returned tally.
    pub async fn cast_vote(&self, topic_id: Uuid) -> VotingResult<VoteReceipt> {
        let _busy = Busy::start(self, Activity::Submitting);

        match self.manager.cast_vote(topic_id, &self.actor).await {
            Ok(receipt) => {
                let sequence = self.next_sequence();
                let mut state = self.state();
                if let Some(view) = state
                    .voting_topics
                    .iter_mut()
                    .find(|view| view.topic.id == topic_id)
                {
                    view.tally = receipt.tally;
                    view.has_voted = true;
                }
                state.error = None;
                state.applied_sequence = state.applied_sequence.max(sequence);
                Ok(receipt)
            }
            Err(e) => {
                self.state().error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Submits a "request a new bus" form and shows the new topic at the
    /// top of the active list.
    pub async fn request_new_bus(&self, request: &BusRequest) -> VotingResult<Topic> {
        let _busy = Busy::start(self, Activity::Submitting);

        match self.manager.create_topic(request, &self.actor).await {
            Ok(topic) => {
                let sequence = self.next_sequence();
                let mut state = self.state();
                state.voting_topics.insert(
                    0,
                    TopicView {
                        topic: topic.clone(),
                        tally: Tally::empty(),
                        has_voted: false,
                    },
                );
                state.error = None;
                state.applied_sequence = state.applied_sequence.max(sequence);
                Ok(topic)
            }
            Err(e) => {
                self.state().error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Refreshes now and then every `period` until the handle is stopped.
    pub fn watch(self: &Arc<Self>, period: Duration) -> RefreshHandle {
        let board = Arc::clone(self);
        spawn_refresh(period, move || {
            let board = board.clone();
            async move {
                if let Err(e) = board.refresh().await {
                    error!(actor = %board.actor.id, error = %e, "board refresh failed");
                }
            }
        })
    }
}
