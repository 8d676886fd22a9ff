use serde::{Deserialize, Serialize};

/// Score multiplier while a bonus window is open.
pub const BONUS_MULTIPLIER: f64 = 1.5;
/// Length of each daily bonus window.
pub const WINDOW_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed local hour range `[start_hour, end_hour)` a bonus window is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealPeriod {
    pub meal_type: MealType,
    pub start_hour: u8,
    pub end_hour: u8,
    pub label: &'static str,
}

impl MealPeriod {
    /// Number of whole-minute offsets a window can start at.
    pub fn start_slots(&self) -> i64 {
        (self.end_hour as i64 - self.start_hour as i64) * 60 - WINDOW_MINUTES
    }
}

/// Breakfast, lunch and dinner, in lookup order. Periods never overlap.
pub const MEAL_PERIODS: [MealPeriod; 3] = [
    MealPeriod {
        meal_type: MealType::Breakfast,
        start_hour: 7,
        end_hour: 10,
        label: "Breakfast Bonus",
    },
    MealPeriod {
        meal_type: MealType::Lunch,
        start_hour: 12,
        end_hour: 14,
        label: "Lunch Bonus",
    },
    MealPeriod {
        meal_type: MealType::Dinner,
        start_hour: 18,
        end_hour: 21,
        label: "Dinner Bonus",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods_are_ordered_and_disjoint() {
        for pair in MEAL_PERIODS.windows(2) {
            assert!(pair[0].end_hour <= pair[1].start_hour);
        }
        for p in MEAL_PERIODS {
            assert!(p.end_hour > p.start_hour && p.end_hour <= 23);
            assert!(p.start_slots() > 0);
        }
    }

    #[test]
    fn slot_counts() {
        assert_eq!(MEAL_PERIODS[0].start_slots(), 150);
        assert_eq!(MEAL_PERIODS[1].start_slots(), 90);
        assert_eq!(MEAL_PERIODS[2].start_slots(), 150);
    }

    #[test]
    fn meal_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MealType::Lunch).unwrap(), "\"lunch\"");
        assert_eq!(MealType::Dinner.to_string(), "dinner");
    }
}
