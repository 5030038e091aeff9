pub mod profile_repository;
pub mod topic_repository;
pub mod vote_repository;

pub use profile_repository::*;
pub use topic_repository::*;
pub use vote_repository::*;
