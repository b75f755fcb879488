use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use tracing::{info, warn};

use moments_types::api::{Claims, CreateRecordRequest, SaveAnswerRequest};
use moments_types::events::GatewayEvent;
use moments_types::models::{ANSWER_MAX_LENGTH, DailyRecord, QUESTION_MAX_LENGTH};

use crate::error::ApiError;
use crate::{AppState, run_blocking, validate_text};

/// GET /records/{date}
pub async fn get_record(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<impl IntoResponse, ApiError> {
    let record = load_record(&state, date).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(record))
}

/// PUT /records/{date}: create the day's record. Never overwrites.
pub async fn create_record(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRecordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = validate_text(&req.question, QUESTION_MAX_LENGTH, "question")?;
    if req.image_url.trim().is_empty() {
        return Err(ApiError::BadRequest("image_url must not be empty".into()));
    }
    // Nobody can author a question on the partner's behalf
    if req.question_by.is_some_and(|by| by != claims.user_id) {
        return Err(ApiError::BadRequest("question_by must be the caller".into()));
    }

    let record = DailyRecord::new(date, req.image_url, question, req.question_by);

    let db = state.db.clone();
    let row = record.clone();
    let inserted = run_blocking(move || {
        db.insert_record(
            &row.date.to_string(),
            &row.image_url,
            &row.question,
            row.question_by.map(|u| u.as_str()),
        )
    })
    .await?;

    if !inserted {
        warn!("{} tried to create existing record {}", claims.username, date);
        return Err(ApiError::Conflict);
    }

    info!("{} created the record for {}", claims.username, date);
    state.dispatcher.broadcast(GatewayEvent::RecordUpdated {
        date,
        record: record.clone(),
    });

    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /records/{date}/answers: upsert the caller's answer.
pub async fn save_answer(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let answer = validate_text(&req.answer, ANSWER_MAX_LENGTH, "answer")?;

    let db = state.db.clone();
    let key = date.to_string();
    let user_id = claims.user_id;
    let saved = run_blocking(move || db.upsert_answer(&key, user_id.as_str(), &answer)).await?;
    if !saved {
        return Err(ApiError::NotFound);
    }

    let record = load_record(&state, date).await?.ok_or(ApiError::NotFound)?;
    state.dispatcher.broadcast(GatewayEvent::RecordUpdated {
        date,
        record: record.clone(),
    });

    Ok(Json(record))
}

/// GET /dates: every date that has a record.
pub async fn list_dates(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let keys = run_blocking(move || db.list_dates()).await?;

    let dates: Vec<NaiveDate> = keys
        .iter()
        .filter_map(|key| {
            key.parse()
                .map_err(|e| warn!("Corrupt record date '{}': {}", key, e))
                .ok()
        })
        .collect();

    Ok(Json(dates))
}

async fn load_record(state: &AppState, date: NaiveDate) -> Result<Option<DailyRecord>, ApiError> {
    let db = state.db.clone();
    let key = date.to_string();
    run_blocking(move || db.get_record(&key)?.map(DailyRecord::try_from).transpose()).await
}
