//! Daily randomized bonus windows: one 30-minute window inside each meal
//! period, persisted per local date, multiplying scores while open.

pub mod clock;
pub mod handlers;
pub mod periods;
pub mod schedule;
pub mod scheduler;
pub mod score;
pub mod store;

use axum::Router;

use crate::state::AppState;

pub use clock::{Clock, FixedClock, SystemClock};
pub use periods::{MealPeriod, MealType, BONUS_MULTIPLIER, MEAL_PERIODS};
pub use schedule::{BonusWindow, DailyBonusSchedule, ScheduleError};
pub use scheduler::{ActiveWindow, BonusScheduler, BonusStatus};
pub use score::{apply_bonus, ScoreBonusApplication};
pub use store::{BonusStore, MemoryStore, PgBonusStore, StoreError};

pub fn router() -> Router<AppState> {
    handlers::bonus_routes()
}
