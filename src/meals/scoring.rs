use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodType {
    MainCourse,
    NonMainCourse,
    InstantNoodles,
}

impl FoodType {
    pub fn as_str(self) -> &'static str {
        match self {
            FoodType::MainCourse => "main_course",
            FoodType::NonMainCourse => "non_main_course",
            FoodType::InstantNoodles => "instant_noodles",
        }
    }
}

impl FromStr for FoodType {
    type Err = ScoreParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "main_course" => Ok(FoodType::MainCourse),
            "non_main_course" => Ok(FoodType::NonMainCourse),
            "instant_noodles" => Ok(FoodType::InstantNoodles),
            other => Err(ScoreParseError::FoodType(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoreParseError {
    #[error("AI response is not valid score JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown food type: {0}")]
    FoodType(String),
}

/// Score verdict returned by the multimodal model for a before/after pair.
#[derive(Debug, Clone, PartialEq)]
pub struct AiMealScore {
    pub score: u32,
    pub commentary: String,
    pub food_type: Option<FoodType>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAiScore {
    score: f64,
    #[serde(default)]
    commentary: String,
    #[serde(default)]
    food_type: Option<String>,
}

/// Parse the model's reply, tolerating markdown code fences around the JSON.
/// Scores are rounded and clamped into 0..=100; an unknown food type is dropped.
pub fn parse_ai_response(text: &str) -> Result<AiMealScore, ScoreParseError> {
    let json = text.replace("```json", "").replace("```", "");
    let raw: RawAiScore = serde_json::from_str(json.trim())?;

    let score = if raw.score.is_finite() {
        raw.score.round().clamp(0.0, 100.0) as u32
    } else {
        0
    };

    Ok(AiMealScore {
        score,
        commentary: raw.commentary.trim().to_string(),
        food_type: raw.food_type.and_then(|f| f.parse().ok()),
    })
}
