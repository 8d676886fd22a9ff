use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use super::{BonusStatus, DailyBonusSchedule};
use crate::{error::AppResult, state::AppState};

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub date: String,
    #[serde(flatten)]
    pub windows: DailyBonusSchedule,
}

pub fn bonus_routes() -> Router<AppState> {
    Router::new()
        .route("/bonus/status", get(get_status))
        .route("/bonus/schedule", get(get_schedule))
}

#[instrument(skip(state))]
pub async fn get_status(State(state): State<AppState>) -> AppResult<Json<BonusStatus>> {
    Ok(Json(state.bonus.current_status().await?))
}

#[instrument(skip(state))]
pub async fn get_schedule(State(state): State<AppState>) -> AppResult<Json<ScheduleResponse>> {
    let today = state.bonus.local_date(state.bonus.now());
    let windows = state.bonus.get_or_create_daily_schedule(today).await?;
    Ok(Json(ScheduleResponse {
        date: today.to_string(),
        windows,
    }))
}
