use std::sync::{Arc, Mutex};

use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use time::{Date, OffsetDateTime, UtcOffset};
use tracing::{debug, info, instrument, warn};

use super::clock::Clock;
use super::periods::MealType;
use super::schedule::{DailyBonusSchedule, ScheduleError};
use super::store::BonusStore;

const KEY_PREFIX: &str = "bonusWindows_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWindow {
    pub meal_type: MealType,
    pub label: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusStatus {
    pub is_active: bool,
    pub active_window: Option<ActiveWindow>,
    pub minutes_remaining: Option<i64>,
}

impl BonusStatus {
    fn inactive() -> Self {
        Self {
            is_active: false,
            active_window: None,
            minutes_remaining: None,
        }
    }
}

/// Decides whether bonus scoring is active, keeping one randomly generated
/// schedule per local calendar day in a [`BonusStore`].
pub struct BonusScheduler {
    store: Arc<dyn BonusStore>,
    clock: Arc<dyn Clock>,
    offset: UtcOffset,
    rng: Mutex<StdRng>,
}

impl BonusScheduler {
    pub fn new(store: Arc<dyn BonusStore>, clock: Arc<dyn Clock>, offset: UtcOffset) -> Self {
        Self::with_rng(store, clock, offset, StdRng::from_entropy())
    }

    pub fn with_rng(
        store: Arc<dyn BonusStore>,
        clock: Arc<dyn Clock>,
        offset: UtcOffset,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            clock,
            offset,
            rng: Mutex::new(rng),
        }
    }

    /// `bonusWindows_YYYY-MM-DD`
    pub fn storage_key(date: Date) -> String {
        format!("{KEY_PREFIX}{date}")
    }

    /// Calendar day `at` falls on in the scheduler's local offset.
    pub fn local_date(&self, at: OffsetDateTime) -> Date {
        at.to_offset(self.offset).date()
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Return the persisted schedule for `date`, generating and persisting
    /// one first if there is none. A corrupt persisted schedule is replaced.
    #[instrument(skip(self))]
    pub async fn get_or_create_daily_schedule(
        &self,
        date: Date,
    ) -> Result<DailyBonusSchedule, ScheduleError> {
        let key = Self::storage_key(date);

        let corrupt = match self.store.get(&key).await? {
            Some(raw) => match DailyBonusSchedule::from_json(&raw) {
                Ok(schedule) => return Ok(schedule),
                Err(e) => {
                    warn!(%key, error = %e, "discarding unreadable bonus schedule");
                    true
                }
            },
            None => false,
        };

        let fresh = self.generate(date);
        let json = fresh.to_json()?;

        let schedule = if corrupt {
            self.store.set(&key, &json).await?;
            fresh
        } else {
            let stored = self.store.insert_if_absent(&key, &json).await?;
            if stored == json {
                fresh
            } else {
                debug!(%key, "another caller created today's schedule first");
                match DailyBonusSchedule::from_json(&stored) {
                    Ok(winner) => winner,
                    Err(e) => {
                        warn!(%key, error = %e, "replacing unreadable bonus schedule");
                        self.store.set(&key, &json).await?;
                        fresh
                    }
                }
            }
        };

        info!(
            %key,
            breakfast = %schedule.breakfast.start,
            lunch = %schedule.lunch.start,
            dinner = %schedule.dinner.start,
            "bonus schedule ready"
        );

        if let Some(previous) = date.previous_day() {
            if let Err(e) = self.store.remove(&Self::storage_key(previous)).await {
                warn!(error = %e, "failed to drop previous bonus schedule");
            }
        }

        Ok(schedule)
    }

    /// Bonus status at `now`; the first matching window wins
    /// (breakfast, lunch, dinner).
    pub async fn bonus_status(&self, now: OffsetDateTime) -> Result<BonusStatus, ScheduleError> {
        let schedule = self
            .get_or_create_daily_schedule(self.local_date(now))
            .await?;

        let Some((meal_type, window)) = schedule.windows().into_iter().find(|(_, w)| w.contains(now))
        else {
            return Ok(BonusStatus::inactive());
        };

        Ok(BonusStatus {
            is_active: true,
            minutes_remaining: Some(minutes_until(now, window.end)),
            active_window: Some(ActiveWindow {
                meal_type,
                label: window.label.clone(),
                start: window.start,
                end: window.end,
            }),
        })
    }

    pub async fn current_status(&self) -> Result<BonusStatus, ScheduleError> {
        self.bonus_status(self.now()).await
    }

    pub async fn minutes_remaining(
        &self,
        now: OffsetDateTime,
    ) -> Result<Option<i64>, ScheduleError> {
        Ok(self.bonus_status(now).await?.minutes_remaining)
    }

    fn generate(&self, date: Date) -> DailyBonusSchedule {
        match self.rng.lock() {
            Ok(mut rng) => DailyBonusSchedule::generate(date, self.offset, &mut *rng),
            Err(poisoned) => {
                DailyBonusSchedule::generate(date, self.offset, &mut *poisoned.into_inner())
            }
        }
    }
}

/// Whole minutes from `now` until `end`, rounded up.
fn minutes_until(now: OffsetDateTime, end: OffsetDateTime) -> i64 {
    let millis = (end - now).whole_milliseconds() as f64;
    (millis / 60_000.0).ceil() as i64
}
