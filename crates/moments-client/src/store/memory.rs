use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use moments_types::models::{ChatMessage, DailyRecord, NewChatMessage, UserId};

use crate::error::StoreError;
use crate::store::{RecordStore, Subscription, merge_chat_message};

#[derive(Debug, Clone)]
enum Change {
    Record(DailyRecord),
    Chat(NaiveDate),
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<NaiveDate, DailyRecord>,
    chats: BTreeMap<NaiveDate, Vec<ChatMessage>>,
}

/// In-process store with the same semantics as the server: first create wins,
/// answers are upserted per user, chat timestamps strictly increase per date.
///
/// Clones share state, so two orchestrators can play both participants.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    changes: broadcast::Sender<Change>,
    faults: Arc<Faults>,
}

#[derive(Default)]
struct Faults {
    create_delay: Mutex<Option<Duration>>,
    subscriptions_broken: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            changes,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Make every `create` stall for `delay` before it writes.
    pub fn set_create_delay(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.faults.create_delay.lock() {
            *guard = delay;
        }
    }

    /// Make new subscriptions fail after their first item.
    pub fn break_subscriptions(&self, broken: bool) {
        self.faults.subscriptions_broken.store(broken, Ordering::Relaxed);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Transport("memory store poisoned".into()))
    }

    fn chat_of(&self, date: NaiveDate) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self.lock()?.chats.get(&date).cloned().unwrap_or_default())
    }

    /// Number of live feeds, for checking that dropped subscriptions stop.
    #[cfg(test)]
    pub(crate) fn live_feeds(&self) -> usize {
        self.changes.receiver_count()
    }

    fn publish(&self, change: Change) {
        // No receivers just means nobody is subscribed
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self, date: NaiveDate) -> Result<Option<DailyRecord>, StoreError> {
        Ok(self.lock()?.records.get(&date).cloned())
    }

    async fn create(&self, record: DailyRecord) -> Result<DailyRecord, StoreError> {
        let delay = self.faults.create_delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut inner = self.lock()?;
            if inner.records.contains_key(&record.date) {
                return Err(StoreError::Conflict);
            }
            inner.records.insert(record.date, record.clone());
        }

        debug!("Created record for {}", record.date);
        self.publish(Change::Record(record.clone()));
        Ok(record)
    }

    async fn upsert_answer(
        &self,
        date: NaiveDate,
        user_id: UserId,
        answer: &str,
    ) -> Result<DailyRecord, StoreError> {
        let record = {
            let mut inner = self.lock()?;
            let record = inner.records.get_mut(&date).ok_or(StoreError::NotFound)?;
            record.upsert_answer(user_id, answer.to_string());
            record.clone()
        };

        self.publish(Change::Record(record.clone()));
        Ok(record)
    }

    async fn append_chat_message(
        &self,
        date: NaiveDate,
        message: NewChatMessage,
    ) -> Result<ChatMessage, StoreError> {
        let stored = {
            let mut inner = self.lock()?;
            let chat = inner.chats.entry(date).or_default();

            // Compare at stored precision, or two sends in one millisecond tie
            let mut timestamp = truncate_to_millis(Utc::now());
            if let Some(last) = chat.last() {
                if timestamp <= last.timestamp {
                    timestamp = last.timestamp + chrono::Duration::milliseconds(1);
                }
            }
            let stored = ChatMessage {
                id: Uuid::new_v4(),
                user_id: message.user_id,
                username: message.username,
                message: message.message,
                timestamp,
            };
            merge_chat_message(chat, stored.clone());
            stored
        };

        self.publish(Change::Chat(date));
        Ok(stored)
    }

    async fn subscribe(
        &self,
        date: NaiveDate,
    ) -> Result<Subscription<Option<DailyRecord>>, StoreError> {
        let (tx, cancel, subscription) = Subscription::channel();
        let mut changes = self.changes.subscribe();
        let broken = self.faults.subscriptions_broken.load(Ordering::Relaxed);

        let _ = tx.send(Ok(self.lock()?.records.get(&date).cloned()));
        if broken {
            let _ = tx.send(Err(StoreError::Transport("connection reset".into())));
            return Ok(subscription);
        }

        let store = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(Change::Record(record)) if record.date == date => {
                            if tx.send(Ok(Some(record))).is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            let current = store.lock().map(|inner| inner.records.get(&date).cloned());
                            if tx.send(current).is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            let _ = tx.send(Err(StoreError::Closed));
                            break;
                        }
                    },
                }
            }
        });

        Ok(subscription)
    }

    async fn subscribe_chat(
        &self,
        date: NaiveDate,
    ) -> Result<Subscription<Vec<ChatMessage>>, StoreError> {
        let (tx, cancel, subscription) = Subscription::channel();
        let mut changes = self.changes.subscribe();
        let broken = self.faults.subscriptions_broken.load(Ordering::Relaxed);

        let _ = tx.send(Ok(self.chat_of(date)?));
        if broken {
            let _ = tx.send(Err(StoreError::Transport("connection reset".into())));
            return Ok(subscription);
        }

        let store = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(Change::Chat(changed)) if changed == date => {
                            let item = store.chat_of(date);
                            if tx.send(item).is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            if tx.send(store.chat_of(date)).is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            let _ = tx.send(Err(StoreError::Closed));
                            break;
                        }
                    },
                }
            }
        });

        Ok(subscription)
    }

    async fn list_available_dates(&self) -> Result<BTreeSet<NaiveDate>, StoreError> {
        Ok(self.lock()?.records.keys().copied().collect())
    }
}

/// Same precision as the server's stored timestamps.
fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}
