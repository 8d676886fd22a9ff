use rand::Rng;
use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime, Time, UtcOffset};

use super::periods::{MealPeriod, MealType, MEAL_PERIODS, WINDOW_MINUTES};

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("persisted bonus schedule is corrupt: {0}")]
    Corrupt(String),
    #[error("failed to serialize bonus schedule: {0}")]
    Serialize(String),
    #[error(transparent)]
    Store(#[from] super::store::StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusWindow {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    pub label: String,
}

impl BonusWindow {
    /// Inclusive on both ends.
    pub fn contains(&self, at: OffsetDateTime) -> bool {
        at >= self.start && at <= self.end
    }
}

/// The three bonus windows of one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBonusSchedule {
    pub breakfast: BonusWindow,
    pub lunch: BonusWindow,
    pub dinner: BonusWindow,
}

impl DailyBonusSchedule {
    /// Place one random window inside each meal period of `date`.
    pub fn generate<R: Rng>(date: Date, offset: UtcOffset, rng: &mut R) -> Self {
        let [breakfast, lunch, dinner] = MEAL_PERIODS.map(|p| random_window(&p, date, offset, &mut *rng));
        Self {
            breakfast,
            lunch,
            dinner,
        }
    }

    pub fn window(&self, meal: MealType) -> &BonusWindow {
        match meal {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch => &self.lunch,
            MealType::Dinner => &self.dinner,
        }
    }

    /// Windows in lookup order: breakfast, lunch, dinner.
    pub fn windows(&self) -> [(MealType, &BonusWindow); 3] {
        [
            (MealType::Breakfast, &self.breakfast),
            (MealType::Lunch, &self.lunch),
            (MealType::Dinner, &self.dinner),
        ]
    }

    pub fn to_json(&self) -> Result<String, ScheduleError> {
        serde_json::to_string(self).map_err(|e| ScheduleError::Serialize(e.to_string()))
    }

    /// Parse a persisted schedule; anything unreadable or malformed is `Corrupt`.
    pub fn from_json(raw: &str) -> Result<Self, ScheduleError> {
        let schedule: Self =
            serde_json::from_str(raw).map_err(|e| ScheduleError::Corrupt(e.to_string()))?;
        for (meal, w) in schedule.windows() {
            if w.end - w.start != Duration::minutes(WINDOW_MINUTES) {
                return Err(ScheduleError::Corrupt(format!(
                    "{meal} window is not {WINDOW_MINUTES} minutes long"
                )));
            }
        }
        Ok(schedule)
    }
}

fn random_window<R: Rng>(
    period: &MealPeriod,
    date: Date,
    offset: UtcOffset,
    rng: &mut R,
) -> BonusWindow {
    let slot = rng.gen_range(0..period.start_slots());
    let period_start = date
        .with_time(Time::from_hms(period.start_hour, 0, 0).unwrap_or(Time::MIDNIGHT))
        .assume_offset(offset);
    let start = period_start + Duration::minutes(slot);

    BonusWindow {
        start,
        end: start + Duration::minutes(WINDOW_MINUTES),
        label: period.label.to_string(),
    }
}
