use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub type DbPool = Pool<Postgres>;

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .max_lifetime(Duration::from_secs(30 * 60))
        .idle_timeout(Duration::from_secs(10 * 60))
        .connect(database_url)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            region TEXT NOT NULL DEFAULT '',
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS topics (
            id UUID PRIMARY KEY,
            title VARCHAR(255) NOT NULL,
            description TEXT NOT NULL,
            destination VARCHAR(255) NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'completed', 'approved', 'rejected')),
            start_at TIMESTAMP WITH TIME ZONE NOT NULL,
            end_at TIMESTAMP WITH TIME ZONE NOT NULL,
            region TEXT NOT NULL,
            creator_id TEXT NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
            rejection_reason TEXT
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // The unique pair is what actually enforces one vote per student.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id UUID PRIMARY KEY,
            topic_id UUID NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
            voter_id TEXT NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(topic_id, voter_id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_topics_status_created_at ON topics(status, created_at DESC)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_votes_topic_id ON votes(topic_id)
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

pub fn get_pool_stats(pool: &DbPool) -> String {
    let size = pool.size() as usize;
    let num_idle = pool.num_idle();
    format!(
        "Pool stats: size={}, idle={}, in_use={}",
        size,
        num_idle,
        size.saturating_sub(num_idle)
    )
}
