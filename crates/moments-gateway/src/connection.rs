use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::NaiveDate;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use moments_db::Database;
use moments_types::events::{GatewayCommand, GatewayEvent};
use moments_types::models::{ChatMessage, DailyRecord, UserId};

use crate::dispatcher::{BroadcastMessage, Dispatcher};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handed from the recv task to the send task, in command order.
enum Outbound {
    /// Replace the date filter.
    Subscribe(Vec<NaiveDate>),
    /// Snapshot frames for one subscribed date.
    Snapshot { date: NaiveDate, frames: Vec<Arc<str>> },
}

/// Per-connection date filter owned by the send task.
///
/// Changes for a freshly subscribed date are held until that date's snapshot
/// has been written, so a snapshot never lands after a newer change.
#[derive(Default)]
struct DateFilter {
    /// `Some(held)` while the snapshot is pending, `None` once live.
    dates: HashMap<NaiveDate, Option<Vec<Arc<str>>>>,
}

impl DateFilter {
    fn replace(&mut self, dates: &[NaiveDate]) {
        self.dates = dates.iter().map(|&date| (date, Some(Vec::new()))).collect();
    }

    /// Frames to write now for a broadcast.
    fn on_broadcast(&mut self, msg: BroadcastMessage) -> Vec<Arc<str>> {
        let Some(date) = msg.date else {
            return vec![msg.json];
        };
        match self.dates.get_mut(&date) {
            Some(Some(held)) => {
                held.push(msg.json);
                Vec::new()
            }
            Some(None) => vec![msg.json],
            None => Vec::new(),
        }
    }

    /// Frames to write now for a snapshot: the snapshot, then anything held.
    fn on_snapshot(&mut self, date: NaiveDate, mut frames: Vec<Arc<str>>) -> Vec<Arc<str>> {
        match self.dates.get_mut(&date) {
            Some(state) => {
                if let Some(held) = state.take() {
                    frames.extend(held);
                }
                frames
            }
            None => Vec::new(),
        }
    }
}

/// Handle a WebSocket whose token was already validated at the HTTP upgrade.
pub async fn handle_connection_authenticated(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    user_id: UserId,
    username: String,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("{} ({}) connected to gateway", username, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    let Ok(ready) = serde_json::to_string(&ready) else {
        return;
    };
    if sender.send(Message::Text(ready.into())).await.is_err() {
        return;
    }

    let mut broadcast_rx = dispatcher.subscribe();

    // Filter changes and snapshots go through this per-connection queue so
    // only the send task ever writes to the socket.
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;
        let mut filter = DateFilter::default();

        'conn: loop {
            // Outbound before broadcasts: a filter change must be seen before
            // any change broadcast after its snapshot read.
            let frames = tokio::select! {
                biased;

                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    continue;
                }
                out = outbound_rx.recv() => match out {
                    Some(Outbound::Subscribe(dates)) => {
                        filter.replace(&dates);
                        continue;
                    }
                    Some(Outbound::Snapshot { date, frames }) => filter.on_snapshot(date, frames),
                    None => break,
                },
                result = broadcast_rx.recv() => match result {
                    Ok(msg) => filter.on_broadcast(msg),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Broadcast receiver lagged by {} messages", n);
                        continue;
                    }
                    Err(_) => break,
                },
            };

            for frame in frames {
                if sender.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break 'conn;
                }
            }
        }
    });

    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(cmd, &db, &outbound_tx, &username_recv).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            username_recv,
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn handle_command(
    cmd: GatewayCommand,
    db: &Arc<Database>,
    outbound: &mpsc::UnboundedSender<Outbound>,
    username: &str,
) {
    match cmd {
        GatewayCommand::Subscribe { dates } => {
            debug!("{} subscribing to {} dates", username, dates.len());

            // Install the filter before reading snapshots so no change between
            // the read and the install can be missed.
            if outbound.send(Outbound::Subscribe(dates.clone())).is_err() {
                return;
            }

            let db = db.clone();
            let read_dates = dates.clone();
            let snapshots = match tokio::task::spawn_blocking(move || load_snapshots(&db, &read_dates)).await {
                Ok(snapshots) => snapshots,
                Err(e) => {
                    warn!("spawn_blocking join error: {}", e);
                    dates.iter().map(|&date| (date, Vec::new())).collect()
                }
            };

            for (date, events) in snapshots {
                let frames = events
                    .iter()
                    .filter_map(|event| match serde_json::to_string(event) {
                        Ok(json) => Some(Arc::from(json)),
                        Err(e) => {
                            warn!("Failed to serialize snapshot: {}", e);
                            None
                        }
                    })
                    .collect();
                if outbound.send(Outbound::Snapshot { date, frames }).is_err() {
                    return;
                }
            }
        }
    }
}

/// Current record and chat for each date. Rows that fail to load are skipped
/// with a warning, but every date gets an entry.
fn load_snapshots(db: &Database, dates: &[NaiveDate]) -> Vec<(NaiveDate, Vec<GatewayEvent>)> {
    let mut snapshots = Vec::with_capacity(dates.len());

    for &date in dates {
        let key = date.to_string();
        let mut events = Vec::with_capacity(2);

        match db.get_record(&key).and_then(|row| row.map(DailyRecord::try_from).transpose()) {
            Ok(record) => events.push(GatewayEvent::RecordSnapshot { date, record }),
            Err(e) => warn!("Failed to load record snapshot for {}: {}", key, e),
        }

        match db.get_chat_messages(&key).and_then(|rows| {
            rows.into_iter()
                .map(ChatMessage::try_from)
                .collect::<anyhow::Result<Vec<_>>>()
        }) {
            Ok(messages) => events.push(GatewayEvent::ChatSnapshot { date, messages }),
            Err(e) => warn!("Failed to load chat snapshot for {}: {}", key, e),
        }

        snapshots.push((date, events));
    }

    snapshots
}
