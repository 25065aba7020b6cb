use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::AppState;
use crate::db;

const USER_ID_COOKIE: &str = "userId";

const SAVE_FAILED: &str = "Failed to save rating";
const FETCH_FAILED: &str = "Failed to fetch ratings";
const RESET_FAILED: &str = "Failed to reset ratings";

pub async fn save_rating(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let params = match body {
        Ok(Json(v)) => v,
        Err(_) => return (jar, ApiError::Validation).into_response(),
    };

    // Integer extraction only; the range/roster checks run after the
    // identity step.
    let teacher_index = params.get("teacherIndex").and_then(|v| v.as_i64());
    let rating = params.get("rating").and_then(|v| v.as_i64());

    let existing = jar.get(USER_ID_COOKIE).map(|c| c.value().to_string());
    let (jar, user_id) = match existing {
        Some(user_id) => {
            if let Some(teacher_index) = teacher_index {
                let conn = match state.db.lock() {
                    Ok(c) => c,
                    Err(_) => {
                        return (
                            jar,
                            ApiError::storage(SAVE_FAILED, anyhow!("rating store lock poisoned")),
                        )
                            .into_response()
                    }
                };
                match db::has_submission(&conn, &user_id, teacher_index) {
                    Ok(true) => return (jar, ApiError::Duplicate).into_response(),
                    Ok(false) => {}
                    Err(e) => return (jar, ApiError::storage(SAVE_FAILED, e)).into_response(),
                }
            }
            (jar, user_id)
        }
        None => {
            // First contact: the identity token is issued here, before
            // validation, so a rejected first attempt still keeps its
            // cookie.
            let user_id = Uuid::new_v4().to_string();
            let jar = jar.add(
                Cookie::build((USER_ID_COOKIE, user_id.clone()))
                    .http_only(true)
                    .path("/"),
            );
            (jar, user_id)
        }
    };

    let (Some(teacher_index), Some(rating)) = (teacher_index, rating) else {
        return (jar, ApiError::Validation).into_response();
    };
    if state.roster.get(teacher_index).is_none() || !(1..=10).contains(&rating) {
        return (jar, ApiError::Validation).into_response();
    }

    let conn = match state.db.lock() {
        Ok(c) => c,
        Err(_) => {
            return (
                jar,
                ApiError::storage(SAVE_FAILED, anyhow!("rating store lock poisoned")),
            )
                .into_response()
        }
    };
    match db::apply_rating(&conn, teacher_index, rating, &user_id) {
        Ok(db::ApplyOutcome::Applied(_)) => {
            (jar, Json(json!({ "success": true }))).into_response()
        }
        Ok(db::ApplyOutcome::AlreadyRated) => (jar, ApiError::Duplicate).into_response(),
        Err(e) => (jar, ApiError::storage(SAVE_FAILED, e)).into_response(),
    }
}

pub async fn get_ratings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state
        .db
        .lock()
        .map_err(|_| ApiError::storage(FETCH_FAILED, anyhow!("rating store lock poisoned")))?;
    let records = db::fetch_all(&conn).map_err(|e| ApiError::storage(FETCH_FAILED, e))?;

    // Teachers without a record are simply absent from the mapping.
    let mut out = serde_json::Map::new();
    for record in records {
        out.insert(
            record.teacher_index.to_string(),
            json!({
                "ratings": record.ratings,
                "ratingCount": record.rating_count,
                "averageRating": record.average_rating,
            }),
        );
    }
    Ok(Json(serde_json::Value::Object(out)))
}

pub async fn reset_ratings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state
        .db
        .lock()
        .map_err(|_| ApiError::storage(RESET_FAILED, anyhow!("rating store lock poisoned")))?;
    db::reset_all(&conn).map_err(|e| ApiError::storage(RESET_FAILED, e))?;

    Ok(Json(json!({
        "success": true,
        "message": "All ratings have been reset."
    })))
}
