use bytes::Bytes;
use serde::Deserialize;

use super::scoring::{parse_ai_response, FoodType};
use super::services::MealSubmission;
use crate::auth::AuthUser;
use crate::error::AppError;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Pagination {
    /// `(limit, offset)` clamped to sane bounds.
    pub fn bounds(&self) -> (i64, i64) {
        (self.limit.clamp(1, MAX_LIMIT), self.offset.max(0))
    }
}

/// Multipart fields of `POST /meals`, collected before validation.
#[derive(Debug, Default)]
pub struct MealForm {
    pub before: Option<Bytes>,
    pub after: Option<Bytes>,
    pub score: Option<String>,
    pub commentary: Option<String>,
    pub food_type: Option<String>,
    pub ai_response: Option<String>,
}

impl MealForm {
    /// Validate the form. A raw `ai_response` takes precedence over the
    /// separate `score` / `commentary` / `food_type` fields.
    pub fn into_submission(self, user: Option<AuthUser>) -> Result<MealSubmission, AppError> {
        let (score, commentary, food_type) = match self.ai_response.as_deref() {
            Some(raw) => {
                let parsed =
                    parse_ai_response(raw).map_err(|e| AppError::BadRequest(e.to_string()))?;
                (parsed.score, Some(parsed.commentary), parsed.food_type)
            }
            None => {
                let raw = self
                    .score
                    .as_deref()
                    .ok_or_else(|| AppError::BadRequest("score is required".into()))?;
                let score = raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|s| *s <= 100)
                    .ok_or_else(|| {
                        AppError::BadRequest("score must be an integer between 0 and 100".into())
                    })?;
                let food_type = self
                    .food_type
                    .as_deref()
                    .filter(|f| !f.trim().is_empty())
                    .map(str::parse::<FoodType>)
                    .transpose()
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                (score, self.commentary, food_type)
            }
        };

        Ok(MealSubmission {
            user,
            before: self.before,
            after: self.after,
            score,
            commentary: commentary.filter(|c| !c.trim().is_empty()),
            food_type,
        })
    }
}
