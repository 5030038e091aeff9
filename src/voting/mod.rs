//! Bus-request voting: weighted tallies, the topic lifecycle, request
//! formatting and the polling board built on top of them.

pub mod board;
pub mod lifecycle;
pub mod refresh;
pub mod submission;
pub mod tally;

pub use board::{BoardSnapshot, VotingBoard};
pub use lifecycle::{Decision, EngineSettings, LifecycleManager, TopicView, VoteReceipt};
pub use refresh::{RefreshHandle, spawn_refresh};
pub use submission::{BusRequest, format_request};
pub use tally::{Tally, tally};
