use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, DailyRecord, UserId};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is authenticated
    Ready { user_id: UserId, username: String },

    /// Current state of a record, sent once right after subscribing
    RecordSnapshot {
        date: NaiveDate,
        record: Option<DailyRecord>,
    },

    /// Current chat of a date, sent once right after subscribing
    ChatSnapshot {
        date: NaiveDate,
        messages: Vec<ChatMessage>,
    },

    /// A record was created or one of its answers changed
    RecordUpdated { date: NaiveDate, record: DailyRecord },

    /// A chat message was appended
    ChatMessageCreated { date: NaiveDate, message: ChatMessage },
}

impl GatewayEvent {
    /// Returns the date if this event is scoped to one record.
    /// Events that return `None` are delivered to every connection.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::RecordSnapshot { date, .. }
            | Self::ChatSnapshot { date, .. }
            | Self::RecordUpdated { date, .. }
            | Self::ChatMessageCreated { date, .. } => Some(*date),
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Replace the set of dates this connection receives events for.
    /// The server answers with a snapshot per date.
    Subscribe { dates: Vec<NaiveDate> },
}
