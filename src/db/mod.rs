pub mod connection;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use connection::*;
pub use memory::InMemoryTopicStore;
pub use models::*;
pub use store::{PgTopicStore, SharedTopicStore, StoreError, StoreResult, TopicStore};
