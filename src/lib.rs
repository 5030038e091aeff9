//! Campus shuttle bus-request voting.
//!
//! Students request additional buses and vote on each other's requests;
//! votes from the requesting region weigh more than votes from elsewhere.
//! Coordinators approve or reject requests once they have enough support.

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod startup;
pub mod topics;
pub mod voting;

pub use config::Config;
pub use error::{VotingError, VotingResult};
