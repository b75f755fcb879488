use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
};
use serde::Deserialize;

use moments_gateway::connection::handle_connection_authenticated;

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::decode_token;

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub token: String,
}

/// GET /gateway?token=…: the token is validated before the upgrade, so the
/// socket loop starts authenticated.
pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let claims = decode_token(&query.token, &state.jwt_secret)?;

    let dispatcher = state.dispatcher.clone();
    let db = state.db.clone();
    Ok(ws.on_upgrade(move |socket| {
        handle_connection_authenticated(socket, dispatcher, db, claims.user_id, claims.username)
    }))
}
