use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Meal record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Option<Uuid>,       // NULL for anonymous submissions
    pub image_before: String,
    pub image_after: String,
    pub score: i32,                  // final score, bonus included
    pub original_score: i32,
    pub bonus_applied: bool,
    pub bonus_label: Option<String>,
    pub analysis: Option<String>,
    pub food_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub image_before: String,
    pub image_after: String,
    pub score: i32,
    pub original_score: i32,
    pub bonus_applied: bool,
    pub bonus_label: Option<String>,
    pub analysis: Option<String>,
    pub food_type: Option<String>,
}

const MEAL_COLUMNS: &str = "id, user_id, image_before, image_after, score, original_score, \
     bonus_applied, bonus_label, analysis, food_type, created_at";

pub async fn insert_meal(db: &PgPool, m: &NewMeal) -> Result<Meal, sqlx::Error> {
    sqlx::query_as::<_, Meal>(&format!(
        r#"
        INSERT INTO meals (id, user_id, image_before, image_after, score, original_score,
                           bonus_applied, bonus_label, analysis, food_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {MEAL_COLUMNS}
        "#
    ))
    .bind(m.id)
    .bind(m.user_id)
    .bind(&m.image_before)
    .bind(&m.image_after)
    .bind(m.score)
    .bind(m.original_score)
    .bind(m.bonus_applied)
    .bind(&m.bonus_label)
    .bind(&m.analysis)
    .bind(&m.food_type)
    .fetch_one(db)
    .await
}

/// Latest meals, newest first.
pub async fn list_latest(db: &PgPool, limit: i64, offset: i64) -> Result<Vec<Meal>, sqlx::Error> {
    sqlx::query_as::<_, Meal>(&format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meals
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn get_meal(db: &PgPool, id: Uuid) -> Result<Option<Meal>, sqlx::Error> {
    sqlx::query_as::<_, Meal>(&format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meals
        WHERE id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Create or rename the profile shown on the leaderboard.
pub async fn upsert_profile(db: &PgPool, user_id: Uuid, username: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO profiles (id, username)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username, updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(username)
    .execute(db)
    .await
    .context("upsert profile")?;
    Ok(())
}
