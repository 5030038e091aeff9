use crate::db::connection::DbPool;
use crate::db::models::Actor;
use sqlx::Error;

/// Records the actor's current region so later tallies can weight
/// their votes.
pub async fn save_profile(pool: &DbPool, actor: &Actor) -> Result<(), Error> {
    sqlx::query(
        "INSERT INTO profiles (id, region) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET region = EXCLUDED.region, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(&actor.id)
    .bind(actor.region.as_str())
    .execute(pool)
    .await?;

    Ok(())
}
