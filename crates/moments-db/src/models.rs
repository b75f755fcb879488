//! Database row types. These map directly to SQLite rows; conversion into the
//! shared models happens here so callers never see raw strings.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate};
use uuid::Uuid;

use moments_types::models::{Answer, ChatMessage, DailyRecord, UserId};

pub struct AccountRow {
    pub uid: String,
    pub user_id: String,
    pub email: String,
    pub password_hash: String,
}

pub struct AnswerRow {
    pub user_id: String,
    pub answer: String,
}

pub struct RecordRow {
    pub date: String,
    pub image_url: String,
    pub question: String,
    pub question_by: Option<String>,
    pub answers: Vec<AnswerRow>,
}

pub struct ChatMessageRow {
    pub id: String,
    pub date: String,
    pub user_id: String,
    pub username: String,
    pub message: String,
    pub timestamp_ms: i64,
}

impl AccountRow {
    pub fn parse_uid(&self) -> Result<Uuid> {
        self.uid
            .parse()
            .with_context(|| format!("corrupt account uid '{}'", self.uid))
    }
}

impl TryFrom<RecordRow> for DailyRecord {
    type Error = anyhow::Error;

    fn try_from(row: RecordRow) -> Result<Self> {
        let date: NaiveDate = row
            .date
            .parse()
            .with_context(|| format!("corrupt record date '{}'", row.date))?;
        let question_by = row
            .question_by
            .as_deref()
            .map(str::parse::<UserId>)
            .transpose()?;
        let answers = row
            .answers
            .into_iter()
            .map(|a| -> Result<Answer> {
                Ok(Answer {
                    user_id: a.user_id.parse()?,
                    answer: a.answer,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DailyRecord {
            date,
            image_url: row.image_url,
            question: row.question,
            question_by,
            answers,
        })
    }
}

impl TryFrom<ChatMessageRow> for ChatMessage {
    type Error = anyhow::Error;

    fn try_from(row: ChatMessageRow) -> Result<Self> {
        Ok(ChatMessage {
            id: row
                .id
                .parse()
                .with_context(|| format!("corrupt chat message id '{}'", row.id))?,
            user_id: row.user_id.parse()?,
            username: row.username,
            message: row.message,
            timestamp: DateTime::from_timestamp_millis(row.timestamp_ms).ok_or_else(|| {
                anyhow!("timestamp {} on message '{}' out of range", row.timestamp_ms, row.id)
            })?,
        })
    }
}
