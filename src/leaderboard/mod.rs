//! Total score per submitter across all meals.

pub mod handlers;
pub mod repo;
pub mod services;

use axum::Router;

use crate::state::AppState;

pub use services::{rank, LeaderboardEntry};

pub fn router() -> Router<AppState> {
    handlers::leaderboard_routes()
}
