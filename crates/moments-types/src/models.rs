use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length (in characters) of a daily answer.
pub const ANSWER_MAX_LENGTH: usize = 1000;

/// Maximum length (in characters) of a chat message.
pub const CHAT_MAX_LENGTH: usize = 500;

/// Maximum length (in characters) of a hand-written question.
pub const QUESTION_MAX_LENGTH: usize = 500;

/// One of the two fixed participants. Serialized as `user1` / `user2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserId {
    User1,
    User2,
}

impl UserId {
    pub fn partner(self) -> Self {
        match self {
            Self::User1 => Self::User2,
            Self::User2 => Self::User1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User1 => "user1",
            Self::User2 => "user2",
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown user id: {0}")]
pub struct UnknownUserId(pub String);

impl FromStr for UserId {
    type Err = UnknownUserId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user1" => Ok(Self::User1),
            "user2" => Ok(Self::User2),
            other => Err(UnknownUserId(other.to_string())),
        }
    }
}

/// A signed-in participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque account id assigned when the account was provisioned.
    pub uid: Uuid,
    pub id: UserId,
    pub username: String,
    pub partner_id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub user_id: UserId,
    pub answer: String,
}

/// The per-date record: image, question and both participants' answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub image_url: String,
    pub question: String,
    /// `None` when the question was picked automatically.
    pub question_by: Option<UserId>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

impl DailyRecord {
    pub fn new(
        date: NaiveDate,
        image_url: String,
        question: String,
        question_by: Option<UserId>,
    ) -> Self {
        Self {
            date,
            image_url,
            question,
            question_by,
            answers: Vec::new(),
        }
    }

    pub fn answer_of(&self, user_id: UserId) -> Option<&Answer> {
        self.answers.iter().find(|a| a.user_id == user_id)
    }

    /// Insert or replace the answer for `user_id`. Keeps at most one entry per user.
    pub fn upsert_answer(&mut self, user_id: UserId, answer: String) {
        match self.answers.iter_mut().find(|a| a.user_id == user_id) {
            Some(existing) => existing.answer = answer,
            None => self.answers.push(Answer { user_id, answer }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: UserId,
    pub username: String,
    pub message: String,
    /// Assigned by the server, strictly increasing within one date.
    pub timestamp: DateTime<Utc>,
}

/// A chat message as submitted, before the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChatMessage {
    pub user_id: UserId,
    pub username: String,
    pub message: String,
}
