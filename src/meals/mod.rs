mod dto;
pub mod handlers;
pub mod repo;
pub mod scoring;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use dto::{MealForm, Pagination};
pub use repo::Meal;
pub use scoring::{parse_ai_response, AiMealScore, FoodType};
pub use services::{prepare_meal, submit_meal, MealSubmission, PreparedMeal, SubmittedMeal};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
