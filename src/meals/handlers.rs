use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::dto::{MealForm, Pagination};
use super::repo::{self, Meal};
use super::services::{submit_meal, SubmittedMeal};
use crate::{
    auth::MaybeUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals))
        .route("/meals/:id", get(get_meal))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", axum::routing::post(create_meal))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> AppResult<Json<Vec<Meal>>> {
    let (limit, offset) = p.bounds();
    Ok(Json(repo::list_latest(&state.db, limit, offset).await?))
}

#[instrument(skip(state))]
pub async fn get_meal(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Meal>> {
    repo::get_meal(&state.db, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("meal"))
}

/// POST /meals (multipart)
/// Fields: before, after (images); score + commentary + food_type, or ai_response.
#[instrument(skip(state, user, mp))]
pub async fn create_meal(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    mp: Multipart,
) -> AppResult<(StatusCode, HeaderMap, Json<SubmittedMeal>)> {
    let form = read_form(mp).await?;
    let submitted = submit_meal(&state, form.into_submission(user)?).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/meals/{}", submitted.meal.id)) {
        headers.insert(header::LOCATION, location);
    }

    Ok((StatusCode::CREATED, headers, Json(submitted)))
}

async fn read_form(mut mp: Multipart) -> AppResult<MealForm> {
    let mut form = MealForm::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "before" | "after" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let slot = if name == "before" { &mut form.before } else { &mut form.after };
                *slot = Some(data);
            }
            "score" | "commentary" | "food_type" | "ai_response" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let slot = match name.as_str() {
                    "score" => &mut form.score,
                    "commentary" => &mut form.commentary,
                    "food_type" => &mut form.food_type,
                    _ => &mut form.ai_response,
                };
                *slot = Some(text);
            }
            other => warn!(field = %other, "ignoring unknown multipart field"),
        }
    }
    Ok(form)
}
