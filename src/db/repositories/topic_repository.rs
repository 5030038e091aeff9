use crate::db::connection::DbPool;
use crate::db::models::{NewTopic, Region, Topic, TopicFilter, TopicStatus};
use sqlx::Error;
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

const TOPIC_COLUMNS: &str = "id, title, description, destination, status, start_at, end_at, \
     region, creator_id, created_at, rejection_reason";

#[derive(Debug, sqlx::FromRow)]
struct TopicRow {
    id: Uuid,
    title: String,
    description: String,
    destination: String,
    status: String,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    region: String,
    creator_id: String,
    created_at: DateTime<Utc>,
    rejection_reason: Option<String>,
}

impl TryFrom<TopicRow> for Topic {
    type Error = Error;

    fn try_from(row: TopicRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TopicStatus>()
            .map_err(|e| Error::Decode(Box::new(e)))?;

        Ok(Topic {
            id: row.id,
            title: row.title,
            description: row.description,
            destination: row.destination,
            status,
            start_at: row.start_at,
            end_at: row.end_at,
            region: Region::new(row.region),
            creator_id: row.creator_id,
            created_at: row.created_at,
            rejection_reason: row.rejection_reason,
        })
    }
}

pub async fn create_topic(pool: &DbPool, topic: &NewTopic) -> Result<Topic, Error> {
    let topic_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, TopicRow>(&format!(
        "INSERT INTO topics (id, title, description, destination, status, start_at, end_at, region, creator_id) \
         VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $8) RETURNING {TOPIC_COLUMNS}"
    ))
    .bind(topic_id)
    .bind(&topic.title)
    .bind(&topic.description)
    .bind(&topic.destination)
    .bind(topic.start_at)
    .bind(topic.end_at)
    .bind(topic.region.as_str())
    .bind(&topic.creator_id)
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn get_topic(pool: &DbPool, topic_id: Uuid) -> Result<Option<Topic>, Error> {
    let row = sqlx::query_as::<_, TopicRow>(&format!(
        "SELECT {TOPIC_COLUMNS} FROM topics WHERE id = $1"
    ))
    .bind(topic_id)
    .fetch_optional(pool)
    .await?;

    row.map(Topic::try_from).transpose()
}

/// Postgres rejects a negative `LIMIT`, so oversized limits saturate.
fn sql_limit(limit: Option<usize>) -> Option<i64> {
    limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX))
}

pub async fn list_topics(pool: &DbPool, filter: &TopicFilter) -> Result<Vec<Topic>, Error> {
    let statuses: Vec<String> = filter
        .statuses
        .iter()
        .map(|s| s.as_str().to_string())
        .collect();
    let limit = sql_limit(filter.limit);

    let rows = sqlx::query_as::<_, TopicRow>(&format!(
        "SELECT {TOPIC_COLUMNS} FROM topics WHERE status = ANY($1) \
         ORDER BY created_at DESC, id LIMIT $2"
    ))
    .bind(statuses)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Topic::try_from).collect()
}

/// Moves a topic from `expected` to `status`. Returns `false` when the
/// topic was not in `expected` (or does not exist), leaving it untouched.
pub async fn update_topic_status(
    pool: &DbPool,
    topic_id: Uuid,
    expected: TopicStatus,
    status: TopicStatus,
    reason: Option<&str>,
) -> Result<bool, Error> {
    let result = sqlx::query(
        "UPDATE topics SET status = $1, rejection_reason = $2 WHERE id = $3 AND status = $4",
    )
    .bind(status.as_str())
    .bind(reason)
    .bind(topic_id)
    .bind(expected.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_limit_saturates_instead_of_wrapping() {
        assert_eq!(sql_limit(None), None);
        assert_eq!(sql_limit(Some(20)), Some(20));
        assert_eq!(sql_limit(Some(usize::MAX)), Some(i64::MAX));
    }
}
