use bytes::Bytes;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo::{self, Meal, NewMeal};
use super::scoring::FoodType;
use crate::auth::AuthUser;
use crate::bonus::{apply_bonus, ScoreBonusApplication};
use crate::compression::{CompressionResult, CompressionSummary, OUTPUT_CONTENT_TYPE};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// One before/after meal, already scored by the AI model.
#[derive(Debug, Default)]
pub struct MealSubmission {
    pub user: Option<AuthUser>,
    pub before: Option<Bytes>,
    pub after: Option<Bytes>,
    pub score: u32,
    pub commentary: Option<String>,
    pub food_type: Option<FoodType>,
}

#[derive(Debug, Serialize)]
pub struct CompressionReport {
    pub before: CompressionSummary,
    pub after: CompressionSummary,
}

#[derive(Debug, Serialize)]
pub struct SubmittedMeal {
    pub meal: Meal,
    pub bonus: ScoreBonusApplication,
    pub compression: CompressionReport,
}

pub fn object_key(id: Uuid) -> String {
    format!("meals/{id}.jpg")
}

/// A submission whose photos are compressed and whose score has the bonus
/// applied. Nothing is uploaded or stored yet.
#[derive(Debug)]
pub struct PreparedMeal {
    pub user: Option<AuthUser>,
    pub before: CompressionResult,
    pub after: CompressionResult,
    pub bonus: ScoreBonusApplication,
    pub bonus_label: Option<String>,
    pub commentary: Option<String>,
    pub food_type: Option<FoodType>,
}

impl PreparedMeal {
    pub fn to_new_meal(&self, id: Uuid, image_before: String, image_after: String) -> NewMeal {
        NewMeal {
            id,
            user_id: self.user.as_ref().map(|u| u.id),
            image_before,
            image_after,
            score: self.bonus.final_score as i32,
            original_score: self.bonus.original_score as i32,
            bonus_applied: self.bonus.bonus_applied,
            bonus_label: self.bonus_label.clone(),
            analysis: self.commentary.clone(),
            food_type: self.food_type.map(|f| f.as_str().to_string()),
        }
    }
}

/// Compress both photos and apply the bonus multiplier if a bonus window is
/// open right now.
pub async fn prepare_meal(st: &AppState, sub: MealSubmission) -> AppResult<PreparedMeal> {
    let options = st.compressor.defaults();
    let before = st.compressor.compress(sub.before, options).await?;
    let after = st.compressor.compress(sub.after, options).await?;

    let status = st.bonus.current_status().await?;
    let bonus = apply_bonus(sub.score, status.is_active);

    Ok(PreparedMeal {
        user: sub.user,
        before,
        after,
        bonus,
        bonus_label: status.active_window.map(|w| w.label),
        commentary: sub.commentary,
        food_type: sub.food_type,
    })
}

/// Prepare the meal, upload both photos, then store it. Uploaded objects
/// are removed again if a later step fails.
#[instrument(skip(st, sub), fields(user_id = ?sub.user.as_ref().map(|u| u.id), score = sub.score))]
pub async fn submit_meal(st: &AppState, sub: MealSubmission) -> AppResult<SubmittedMeal> {
    let prepared = prepare_meal(st, sub).await?;

    let before_key = upload(st, &prepared.before).await?;
    let after_key = match upload(st, &prepared.after).await {
        Ok(key) => key,
        Err(e) => {
            discard(st, &[before_key.as_str()]).await;
            return Err(e);
        }
    };

    if let Some(user) = &prepared.user {
        if let Some(username) = user.username() {
            // leaderboard falls back to "Unknown" without a profile
            if let Err(e) = repo::upsert_profile(&st.db, user.id, username).await {
                warn!(error = %e, user_id = %user.id, "profile upsert skipped");
            }
        }
    }

    let new_meal = prepared.to_new_meal(
        Uuid::new_v4(),
        st.storage.public_url(&before_key),
        st.storage.public_url(&after_key),
    );

    let meal = match repo::insert_meal(&st.db, &new_meal).await {
        Ok(meal) => meal,
        Err(e) => {
            discard(st, &[before_key.as_str(), after_key.as_str()]).await;
            return Err(e.into());
        }
    };

    info!(
        meal_id = %meal.id,
        score = meal.score,
        bonus_applied = meal.bonus_applied,
        "meal saved"
    );

    Ok(SubmittedMeal {
        meal,
        bonus: prepared.bonus,
        compression: CompressionReport {
            before: prepared.before.summary(),
            after: prepared.after.summary(),
        },
    })
}

async fn upload(st: &AppState, image: &CompressionResult) -> AppResult<String> {
    let key = object_key(Uuid::new_v4());
    st.storage
        .put_object(&key, image.encoded.clone(), OUTPUT_CONTENT_TYPE)
        .await
        .map_err(|e| AppError::Storage(format!("{e:#}")))?;
    Ok(key)
}

async fn discard(st: &AppState, keys: &[&str]) {
    for key in keys {
        if let Err(e) = st.storage.delete_object(key).await {
            warn!(error = %e, %key, "failed to remove orphaned upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonus::{BonusScheduler, FixedClock, MemoryStore, SystemClock};
    use crate::compression::codec::tests::{noisy_image, png_bytes};
    use crate::compression::CompressionError;
    use crate::storage::{MemoryStorage, StorageClient};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use time::macros::{date, datetime};
    use time::Duration;

    /// Accepts the first upload and fails every later one.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        puts: Mutex<usize>,
    }

    #[async_trait]
    impl StorageClient for FlakyStorage {
        async fn put_object(&self, key: &str, body: Bytes, ct: &str) -> anyhow::Result<()> {
            let n = {
                let mut puts = self.puts.lock().unwrap();
                *puts += 1;
                *puts
            };
            if n > 1 {
                anyhow::bail!("bucket is full");
            }
            self.inner.put_object(key, body, ct).await
        }
        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            self.inner.delete_object(key).await
        }
        fn public_url(&self, key: &str) -> String {
            self.inner.public_url(key)
        }
    }

    fn scheduler() -> Arc<BonusScheduler> {
        Arc::new(BonusScheduler::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            time::UtcOffset::UTC,
        ))
    }

    #[test]
    fn object_keys_are_jpg_under_meals() {
        let id = Uuid::nil();
        assert_eq!(object_key(id), format!("meals/{id}.jpg"));
    }

    #[tokio::test]
    async fn missing_photo_is_invalid_input() {
        let storage = Arc::new(MemoryStorage::default());
        let st = AppState::fake_with(storage.clone(), scheduler());
        let err = submit_meal(
            &st,
            MealSubmission {
                before: None,
                after: Some(png_bytes(&noisy_image(8, 8))),
                score: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            AppError::Compression(CompressionError::InvalidInput)
        ));
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn undecodable_photo_uploads_nothing() {
        let storage = Arc::new(MemoryStorage::default());
        let st = AppState::fake_with(storage.clone(), scheduler());
        let err = submit_meal(
            &st,
            MealSubmission {
                before: Some(png_bytes(&noisy_image(8, 8))),
                after: Some(Bytes::from_static(b"GIF89a-but-not-really")),
                score: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Compression(CompressionError::Decode(_))));
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn failed_second_upload_removes_the_first() {
        let storage = Arc::new(FlakyStorage::default());
        let st = AppState::fake_with(storage.clone(), scheduler());
        let err = submit_meal(
            &st,
            MealSubmission {
                before: Some(png_bytes(&noisy_image(16, 16))),
                after: Some(png_bytes(&noisy_image(16, 16))),
                score: 70,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(*storage.puts.lock().unwrap(), 2);
        assert!(storage.inner.keys().is_empty());
    }

    fn photos(score: u32) -> MealSubmission {
        MealSubmission {
            before: Some(png_bytes(&noisy_image(16, 16))),
            after: Some(png_bytes(&noisy_image(12, 12))),
            score,
            commentary: Some("Clean plate".into()),
            food_type: Some(FoodType::MainCourse),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn failed_insert_removes_both_uploads() {
        let storage = Arc::new(MemoryStorage::default());
        let st = AppState::fake_with(storage.clone(), scheduler());

        let err = submit_meal(&st, photos(40)).await.unwrap_err();

        assert!(matches!(err, AppError::Database(_)), "{err:?}");
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn open_window_multiplies_the_stored_score() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-03-14 00:00 UTC)));
        let bonus = Arc::new(BonusScheduler::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            time::UtcOffset::UTC,
        ));
        let lunch = bonus
            .get_or_create_daily_schedule(date!(2026 - 03 - 14))
            .await
            .unwrap()
            .lunch;
        clock.set(lunch.start + Duration::minutes(5));
        let st = AppState::fake_with(Arc::new(MemoryStorage::default()), bonus);

        let prepared = prepare_meal(&st, photos(77)).await.unwrap();
        assert!(prepared.bonus.bonus_applied);
        assert_eq!(prepared.bonus.final_score, 115);
        assert_eq!(prepared.bonus_label.as_deref(), Some("Lunch Bonus"));

        let row = prepared.to_new_meal(Uuid::nil(), "b".into(), "a".into());
        assert_eq!(row.score, 115);
        assert_eq!(row.original_score, 77);
        assert!(row.bonus_applied);
        assert_eq!(row.bonus_label.as_deref(), Some("Lunch Bonus"));
        assert_eq!(row.food_type.as_deref(), Some("main_course"));
        assert_eq!(row.analysis.as_deref(), Some("Clean plate"));
    }

    #[tokio::test]
    async fn closed_window_keeps_the_raw_score() {
        let clock = Arc::new(FixedClock::new(datetime!(2026-03-14 03:00 UTC)));
        let bonus = Arc::new(BonusScheduler::new(
            Arc::new(MemoryStore::new()),
            clock,
            time::UtcOffset::UTC,
        ));
        let st = AppState::fake_with(Arc::new(MemoryStorage::default()), bonus);

        let prepared = prepare_meal(&st, photos(77)).await.unwrap();
        let row = prepared.to_new_meal(Uuid::nil(), "b".into(), "a".into());
        assert_eq!(row.score, 77);
        assert!(!row.bonus_applied);
        assert_eq!(row.bonus_label, None);
        assert_eq!(row.user_id, None);
    }
}
