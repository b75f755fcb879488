use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use moments_types::api::{CreateRecordRequest, ErrorBody, SaveAnswerRequest, SendChatRequest};
use moments_types::events::{GatewayCommand, GatewayEvent};
use moments_types::models::{ChatMessage, DailyRecord, NewChatMessage, UserId};

use crate::error::StoreError;
use crate::session::Session;
use crate::store::{RecordStore, Subscription, merge_chat_message};

/// Store backed by the Moments server: REST for reads and writes, one gateway
/// WebSocket per subscription for live updates.
pub struct RemoteStore {
    http: Client,
    base_url: String,
    token: String,
}

impl RemoteStore {
    pub fn new(http: Client, base_url: &str, session: &Session) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: session.token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn gateway_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/gateway?token={}", self.token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        check_status(response).await
    }

    /// Open a gateway connection subscribed to `date` and feed whatever
    /// `on_event` extracts from its events into a subscription.
    fn spawn_feed<T, F>(&self, date: NaiveDate, on_event: F) -> Subscription<T>
    where
        T: Send + 'static,
        F: FnMut(GatewayEvent) -> Option<T> + Send + 'static,
    {
        let (tx, cancel, subscription) = Subscription::channel();
        let url = self.gateway_url();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => debug!("Feed for {} released", date),
                result = run_feed(url, date, &tx, on_event) => {
                    if let Err(e) = result {
                        warn!("Feed for {} ended: {}", date, e);
                        let _ = tx.send(Err(e));
                    }
                }
            }
        });

        subscription
    }
}

async fn run_feed<T, F>(
    url: String,
    date: NaiveDate,
    tx: &mpsc::UnboundedSender<Result<T, StoreError>>,
    mut on_event: F,
) -> Result<(), StoreError>
where
    F: FnMut(GatewayEvent) -> Option<T>,
{
    let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| StoreError::Transport(format!("gateway connect failed: {e}")))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let subscribe = serde_json::to_string(&GatewayCommand::Subscribe { dates: vec![date] })
        .map_err(|e| StoreError::Protocol(e.to_string()))?;
    ws_tx
        .send(Message::Text(subscribe.into()))
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;

    while let Some(msg) = ws_rx.next().await {
        match msg.map_err(|e| StoreError::Transport(e.to_string()))? {
            Message::Text(text) => {
                let event: GatewayEvent = serde_json::from_str(text.as_str())
                    .map_err(|e| StoreError::Protocol(e.to_string()))?;
                if event.date() != Some(date) {
                    continue;
                }
                if let Some(item) = on_event(event) {
                    if tx.send(Ok(item)).is_err() {
                        // Subscriber is gone
                        return Ok(());
                    }
                }
            }
            Message::Close(_) => break,
            // Pings are answered by tungstenite while reading
            _ => {}
        }
    }

    Err(StoreError::Closed)
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::NOT_FOUND => Err(StoreError::NotFound),
        StatusCode::CONFLICT => Err(StoreError::Conflict),
        StatusCode::UNAUTHORIZED => Err(StoreError::Unauthorized),
        StatusCode::FORBIDDEN => Err(StoreError::Forbidden),
        StatusCode::BAD_REQUEST => {
            let reason = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| "bad request".to_string());
            Err(StoreError::Rejected(reason))
        }
        other => Err(StoreError::Transport(format!("server returned {other}"))),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    response
        .json::<T>()
        .await
        .map_err(|e| StoreError::Protocol(e.to_string()))
}

#[async_trait]
impl RecordStore for RemoteStore {
    async fn read(&self, date: NaiveDate) -> Result<Option<DailyRecord>, StoreError> {
        match self.send(self.http.get(self.url(&format!("/records/{date}")))).await {
            Ok(response) => decode(response).await.map(Some),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, record: DailyRecord) -> Result<DailyRecord, StoreError> {
        let body = CreateRecordRequest {
            image_url: record.image_url,
            question: record.question,
            question_by: record.question_by,
        };
        let request = self
            .http
            .put(self.url(&format!("/records/{}", record.date)))
            .json(&body);
        decode(self.send(request).await?).await
    }

    async fn upsert_answer(
        &self,
        date: NaiveDate,
        _user_id: UserId,
        answer: &str,
    ) -> Result<DailyRecord, StoreError> {
        // The server attributes the answer to the token's user
        let body = SaveAnswerRequest {
            answer: answer.to_string(),
        };
        let request = self
            .http
            .put(self.url(&format!("/records/{date}/answers")))
            .json(&body);
        decode(self.send(request).await?).await
    }

    async fn append_chat_message(
        &self,
        date: NaiveDate,
        message: NewChatMessage,
    ) -> Result<ChatMessage, StoreError> {
        let body = SendChatRequest {
            message: message.message,
        };
        let request = self
            .http
            .post(self.url(&format!("/records/{date}/chat")))
            .json(&body);
        decode(self.send(request).await?).await
    }

    async fn subscribe(
        &self,
        date: NaiveDate,
    ) -> Result<Subscription<Option<DailyRecord>>, StoreError> {
        Ok(self.spawn_feed(date, |event| match event {
            GatewayEvent::RecordSnapshot { record, .. } => Some(record),
            GatewayEvent::RecordUpdated { record, .. } => Some(Some(record)),
            _ => None,
        }))
    }

    async fn subscribe_chat(
        &self,
        date: NaiveDate,
    ) -> Result<Subscription<Vec<ChatMessage>>, StoreError> {
        let mut messages: Vec<ChatMessage> = Vec::new();
        Ok(self.spawn_feed(date, move |event| match event {
            GatewayEvent::ChatSnapshot { messages: snapshot, .. } => {
                // Keep anything that arrived before the snapshot was taken
                let mut merged = snapshot;
                for message in messages.drain(..) {
                    merge_chat_message(&mut merged, message);
                }
                messages = merged;
                Some(messages.clone())
            }
            GatewayEvent::ChatMessageCreated { message, .. } => {
                merge_chat_message(&mut messages, message);
                Some(messages.clone())
            }
            _ => None,
        }))
    }

    async fn list_available_dates(&self) -> Result<BTreeSet<NaiveDate>, StoreError> {
        let dates: Vec<NaiveDate> = decode(self.send(self.http.get(self.url("/dates"))).await?).await?;
        Ok(dates.into_iter().collect())
    }
}
