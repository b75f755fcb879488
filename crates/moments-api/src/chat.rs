use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use moments_types::api::{Claims, SendChatRequest};
use moments_types::events::GatewayEvent;
use moments_types::models::{CHAT_MAX_LENGTH, ChatMessage};
use moments_types::roster::participant;

use crate::error::ApiError;
use crate::{AppState, run_blocking, validate_text};

/// POST /records/{date}/chat: append a message; the server assigns id and timestamp.
pub async fn send_message(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = validate_text(&req.message, CHAT_MAX_LENGTH, "message")?;
    let id = Uuid::new_v4();
    let username = participant(claims.user_id).username.to_string();

    let db = state.db.clone();
    let key = date.to_string();
    let user_id = claims.user_id;
    let name = username.clone();
    let text = message.clone();
    let now_ms = Utc::now().timestamp_millis();
    let timestamp_ms = run_blocking(move || {
        db.insert_chat_message(&id.to_string(), &key, user_id.as_str(), &name, &text, now_ms)
    })
    .await?;

    let timestamp = DateTime::from_timestamp_millis(timestamp_ms)
        .ok_or_else(|| anyhow::anyhow!("timestamp {} out of range", timestamp_ms))?;

    let message = ChatMessage {
        id,
        user_id,
        username,
        message,
        timestamp,
    };

    state.dispatcher.broadcast(GatewayEvent::ChatMessageCreated {
        date,
        message: message.clone(),
    });

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /records/{date}/chat: all messages of a date, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let key = date.to_string();
    let messages = run_blocking(move || {
        db.get_chat_messages(&key)?
            .into_iter()
            .map(ChatMessage::try_from)
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await?;

    Ok(Json(messages))
}
