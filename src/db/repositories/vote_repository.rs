use crate::db::connection::DbPool;
use crate::db::models::{Region, Vote};
use sqlx::{Error, Row};
use uuid::Uuid;

pub async fn find_vote(pool: &DbPool, topic_id: Uuid, voter_id: &str) -> Result<Option<Vote>, Error> {
    let row = sqlx::query(
        "SELECT id, topic_id, voter_id, created_at FROM votes WHERE topic_id = $1 AND voter_id = $2",
    )
    .bind(topic_id)
    .bind(voter_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| Vote {
        id: r.get("id"),
        topic_id: r.get("topic_id"),
        voter_id: r.get("voter_id"),
        created_at: r.get("created_at"),
    }))
}

/// Inserts a vote. A second vote for the same (topic, voter) pair is
/// rejected by the table's unique constraint.
pub async fn insert_vote(pool: &DbPool, topic_id: Uuid, voter_id: &str) -> Result<Vote, Error> {
    let vote_id = Uuid::new_v4();

    let row = sqlx::query(
        "INSERT INTO votes (id, topic_id, voter_id) VALUES ($1, $2, $3) \
         RETURNING id, topic_id, voter_id, created_at",
    )
    .bind(vote_id)
    .bind(topic_id)
    .bind(voter_id)
    .fetch_one(pool)
    .await?;

    Ok(Vote {
        id: row.get("id"),
        topic_id: row.get("topic_id"),
        voter_id: row.get("voter_id"),
        created_at: row.get("created_at"),
    })
}

pub async fn count_votes(pool: &DbPool, topic_id: Uuid) -> Result<i64, Error> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM votes WHERE topic_id = $1")
        .bind(topic_id)
        .fetch_one(pool)
        .await?;

    Ok(row.get::<i64, _>("total"))
}

/// One region per vote on the topic, read from the voter's profile.
/// Votes from voters without a profile report an empty region.
pub async fn voter_regions(pool: &DbPool, topic_id: Uuid) -> Result<Vec<Region>, Error> {
    let rows = sqlx::query(
        "SELECT COALESCE(p.region, '') AS region FROM votes v \
         LEFT JOIN profiles p ON p.id = v.voter_id WHERE v.topic_id = $1",
    )
    .bind(topic_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Region::new(r.get::<String, _>("region")))
        .collect())
}
