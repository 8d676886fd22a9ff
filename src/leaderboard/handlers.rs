use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::repo;
use super::services::{rank, LeaderboardEntry};
use crate::{error::AppResult, state::AppState};

pub fn leaderboard_routes() -> Router<AppState> {
    Router::new().route("/leaderboard", get(get_leaderboard))
}

#[instrument(skip(state))]
pub async fn get_leaderboard(State(state): State<AppState>) -> AppResult<Json<Vec<LeaderboardEntry>>> {
    let totals = repo::user_totals(&state.db).await?;
    Ok(Json(rank(totals)))
}
