use serde::Serialize;

use super::periods::BONUS_MULTIPLIER;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBonusApplication {
    pub final_score: u32,
    pub bonus_applied: bool,
    pub original_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
}

/// Multiply `score` by the bonus multiplier (rounded down) when `is_active`.
pub fn apply_bonus(score: u32, is_active: bool) -> ScoreBonusApplication {
    if !is_active {
        return ScoreBonusApplication {
            final_score: score,
            bonus_applied: false,
            original_score: score,
            multiplier: None,
        };
    }

    ScoreBonusApplication {
        final_score: (score as f64 * BONUS_MULTIPLIER).floor() as u32,
        bonus_applied: true,
        original_score: score,
        multiplier: Some(BONUS_MULTIPLIER),
    }
}
