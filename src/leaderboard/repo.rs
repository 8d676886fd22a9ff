use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Summed score per submitter. `user_id` is NULL for the anonymous bucket.
#[derive(Debug, Clone, FromRow)]
pub struct UserTotal {
    pub user_id: Option<Uuid>,
    pub total_score: i64,
    pub username: Option<String>,
}

pub async fn user_totals(db: &PgPool) -> Result<Vec<UserTotal>, sqlx::Error> {
    sqlx::query_as::<_, UserTotal>(
        r#"
        SELECT m.user_id,
               SUM(m.score)::BIGINT AS total_score,
               p.username
        FROM meals m
        LEFT JOIN profiles p ON p.id = m.user_id
        GROUP BY m.user_id, p.username
        "#,
    )
    .fetch_all(db)
    .await
}
