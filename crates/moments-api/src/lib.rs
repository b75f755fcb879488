pub mod auth;
pub mod chat;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod records;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use moments_db::Database;
use moments_gateway::dispatcher::Dispatcher;

use crate::error::ApiError;
use crate::middleware::require_auth;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
}

/// All HTTP and WebSocket routes of the server.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/gateway", get(gateway::upgrade));

    let protected_routes = Router::new()
        .route("/records/{date}", get(records::get_record).put(records::create_record))
        .route("/records/{date}/answers", put(records::save_answer))
        .route("/records/{date}/chat", get(chat::get_messages).post(chat::send_message))
        .route("/dates", get(records::list_dates))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run a blocking DB call off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
        .map_err(ApiError::from)
}

/// Trim user text and enforce it is non-blank and at most `max` characters.
pub(crate) fn validate_text(text: &str, max: usize, field: &str) -> Result<String, ApiError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max {
        return Err(ApiError::BadRequest(format!("{field} exceeds {max} characters")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use moments_types::models::UserId;

    const SECRET: &str = "test-secret";

    fn test_state() -> AppState {
        let db = Database::open_in_memory().unwrap();
        let hash = auth::hash_password("geheim123").unwrap();
        auth::provision_account(&db, UserId::User1, &hash).unwrap();
        auth::provision_account(&db, UserId::User2, &hash).unwrap();
        Arc::new(AppStateInner {
            db: Arc::new(db),
            jwt_secret: SECRET.into(),
            dispatcher: Dispatcher::new(),
        })
    }

    fn token_for(state: &AppState, user_id: UserId) -> String {
        let account = state.db.get_account_by_user_id(user_id.as_str()).unwrap().unwrap();
        let username = moments_types::roster::participant(user_id).username;
        auth::create_token(SECRET, account.parse_uid().unwrap(), user_id, username).unwrap()
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn login_rejects_unlisted_email_before_checking_password() {
        let app = router(test_state());
        let (status, body) = call(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "stranger@example.com", "password": "geheim123" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "email address is not allowed");
    }

    #[tokio::test]
    async fn login_checks_password() {
        let app = router(test_state());
        let (status, _) = call(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "marty.vandenberk@gmail.com", "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "MARTY.vandenberk@gmail.com", "password": "geheim123" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], "user1");
        assert_eq!(body["user"]["partner_id"], "user2");
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = router(test_state());
        let (status, _) = call(&app, "GET", "/dates", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, "GET", "/dates", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn record_lifecycle() {
        let state = test_state();
        let app = router(state.clone());
        let marty = token_for(&state, UserId::User1);
        let mut events = state.dispatcher.subscribe();

        let (status, _) = call(&app, "GET", "/records/2024-06-10", Some(&marty), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let create = json!({ "image_url": "data:image/jpeg;base64,AA==", "question": " Vraag? ", "question_by": null });
        let (status, body) = call(&app, "PUT", "/records/2024-06-10", Some(&marty), Some(create.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["question"], "Vraag?");
        assert_eq!(body["answers"], json!([]));
        assert_eq!(events.recv().await.unwrap().date.unwrap().to_string(), "2024-06-10");

        let (status, _) = call(&app, "PUT", "/records/2024-06-10", Some(&marty), Some(create)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        for text in ["Peaceful.", "Peaceful, truly."] {
            let (status, _) = call(
                &app,
                "PUT",
                "/records/2024-06-10/answers",
                Some(&marty),
                Some(json!({ "answer": text })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = call(&app, "GET", "/records/2024-06-10", Some(&marty), None).await;
        assert_eq!(body["answers"], json!([{ "user_id": "user1", "answer": "Peaceful, truly." }]));

        let (_, body) = call(&app, "GET", "/dates", Some(&marty), None).await;
        assert_eq!(body, json!(["2024-06-10"]));
    }

    #[tokio::test]
    async fn answer_without_record_is_not_found() {
        let state = test_state();
        let app = router(state.clone());
        let marty = token_for(&state, UserId::User1);
        let (status, _) = call(
            &app,
            "PUT",
            "/records/2024-06-10/answers",
            Some(&marty),
            Some(json!({ "answer": "Hallo" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn question_cannot_be_attributed_to_partner() {
        let state = test_state();
        let app = router(state.clone());
        let marty = token_for(&state, UserId::User1);
        let create = json!({ "image_url": "x", "question": "Vraag?", "question_by": "user2" });
        let (status, _) = call(&app, "PUT", "/records/2024-06-10", Some(&marty), Some(create)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_messages_are_ordered_and_validated() {
        let state = test_state();
        let app = router(state.clone());
        let marieke = token_for(&state, UserId::User2);

        let (status, _) = call(
            &app,
            "POST",
            "/records/2024-06-09/chat",
            Some(&marieke),
            Some(json!({ "message": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            "POST",
            "/records/2024-06-09/chat",
            Some(&marieke),
            Some(json!({ "message": "x".repeat(501) })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        for text in ["Hi", "Hoe was je dag?"] {
            let (status, body) = call(
                &app,
                "POST",
                "/records/2024-06-09/chat",
                Some(&marieke),
                Some(json!({ "message": text })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body["user_id"], "user2");
            assert_eq!(body["username"], "Marieke");
        }

        let (_, body) = call(&app, "GET", "/records/2024-06-09/chat", Some(&marieke), None).await;
        let messages = body.as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["message"], "Hi");
        let first: chrono::DateTime<chrono::Utc> = serde_json::from_value(messages[0]["timestamp"].clone()).unwrap();
        let second: chrono::DateTime<chrono::Utc> = serde_json::from_value(messages[1]["timestamp"].clone()).unwrap();
        assert!(second > first);
    }
}
