//! Record store adapters: a trait for the per-date record and chat store, an
//! HTTP/WebSocket implementation against the Moments server, and an
//! in-process implementation.

pub mod memory;
pub mod remote;

use std::collections::BTreeSet;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use moments_types::models::{ChatMessage, DailyRecord, NewChatMessage, UserId};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use remote::RemoteStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read(&self, date: NaiveDate) -> Result<Option<DailyRecord>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when a record for the date exists.
    async fn create(&self, record: DailyRecord) -> Result<DailyRecord, StoreError>;

    /// Fails with [`StoreError::NotFound`] when there is no record for the date.
    async fn upsert_answer(
        &self,
        date: NaiveDate,
        user_id: UserId,
        answer: &str,
    ) -> Result<DailyRecord, StoreError>;

    /// The store assigns id and timestamp.
    async fn append_chat_message(
        &self,
        date: NaiveDate,
        message: NewChatMessage,
    ) -> Result<ChatMessage, StoreError>;

    /// The first item is the current state; later items are changes.
    async fn subscribe(
        &self,
        date: NaiveDate,
    ) -> Result<Subscription<Option<DailyRecord>>, StoreError>;

    /// Every item is the full chat of the date, ordered by timestamp.
    async fn subscribe_chat(
        &self,
        date: NaiveDate,
    ) -> Result<Subscription<Vec<ChatMessage>>, StoreError>;

    async fn list_available_dates(&self) -> Result<BTreeSet<NaiveDate>, StoreError>;
}

/// A live feed of store updates. Dropping it releases the feed.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Result<T, StoreError>>,
    _guard: DropGuard,
}

impl<T> Subscription<T> {
    /// `cancel` fires once the subscription is dropped.
    pub fn new(rx: mpsc::UnboundedReceiver<Result<T, StoreError>>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            _guard: cancel.drop_guard(),
        }
    }

    /// Channel-backed subscription: the returned sender feeds it, and the
    /// token is cancelled when the subscription goes away.
    pub fn channel() -> (mpsc::UnboundedSender<Result<T, StoreError>>, CancellationToken, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let subscription = Self::new(rx, cancel.clone());
        (tx, cancel, subscription)
    }

    /// `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Result<T, StoreError>> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {}
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T, StoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Insert `message` keeping the list ordered by timestamp and unique by id.
pub(crate) fn merge_chat_message(messages: &mut Vec<ChatMessage>, message: ChatMessage) {
    if messages.iter().any(|m| m.id == message.id) {
        return;
    }
    let at = messages.partition_point(|m| m.timestamp <= message.timestamp);
    messages.insert(at, message);
}
