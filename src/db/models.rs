use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle state of a bus-request topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Active,
    Completed,
    Approved,
    Rejected,
}

impl TopicStatus {
    pub const PAST: [TopicStatus; 3] = [
        TopicStatus::Completed,
        TopicStatus::Approved,
        TopicStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TopicStatus::Active => "active",
            TopicStatus::Completed => "completed",
            TopicStatus::Approved => "approved",
            TopicStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TopicStatus::Active)
    }
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown topic status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for TopicStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TopicStatus::Active),
            "completed" => Ok(TopicStatus::Completed),
            "approved" => Ok(TopicStatus::Approved),
            "rejected" => Ok(TopicStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Campus region of a student or coordinator. Any string is accepted;
/// only equality with a topic's region matters for weighting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub const HUBLI: &'static str = "Hubli";
    pub const DHARWAD: &'static str = "Dharwad";

    pub fn new(name: impl Into<String>) -> Self {
        Region(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        self.0 == Self::HUBLI || self.0 == Self::DHARWAD
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(name: &str) -> Self {
        Region::new(name)
    }
}

/// The acting identity, supplied explicitly to every engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub region: Region,
}

impl Actor {
    pub fn new(id: impl Into<String>, region: impl Into<Region>) -> Self {
        Actor {
            id: id.into(),
            region: region.into(),
        }
    }
}

/// A request for an additional bus. `end_at` doubles as the target
/// arrival time and the voting deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub destination: String,
    pub status: TopicStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub region: Region,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub rejection_reason: Option<String>,
}

/// Fields for a topic that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTopic {
    pub title: String,
    pub description: String,
    pub destination: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub region: Region,
    pub creator_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub voter_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    pub statuses: Vec<TopicStatus>,
    pub limit: Option<usize>,
}

impl TopicFilter {
    pub fn active() -> Self {
        TopicFilter {
            statuses: vec![TopicStatus::Active],
            limit: None,
        }
    }

    pub fn past(limit: Option<usize>) -> Self {
        TopicFilter {
            statuses: TopicStatus::PAST.to_vec(),
            limit,
        }
    }
}
