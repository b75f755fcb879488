use crate::Database;
use crate::models::{AccountRow, AnswerRow, ChatMessageRow, RecordRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Accounts --

    /// Create the account for a participant, or refresh its email and password
    /// hash. The uid of an existing account never changes.
    pub fn upsert_account(
        &self,
        uid: &str,
        user_id: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO accounts (uid, user_id, email, password_hash) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET email = excluded.email, password_hash = excluded.password_hash",
                (uid, user_id, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_account_by_user_id(&self, user_id: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT uid, user_id, email, password_hash FROM accounts WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(AccountRow {
                        uid: row.get(0)?,
                        user_id: row.get(1)?,
                        email: row.get(2)?,
                        password_hash: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Records --

    pub fn get_record(&self, date: &str) -> Result<Option<RecordRow>> {
        self.with_conn(|conn| query_record(conn, date))
    }

    /// Insert a new record. Returns `false` without touching anything if a record
    /// for `date` already exists.
    pub fn insert_record(
        &self,
        date: &str,
        image_url: &str,
        question: &str,
        question_by: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO daily_records (date, image_url, question, question_by) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![date, image_url, question, question_by],
            )?;
            Ok(inserted == 1)
        })
    }

    /// Insert or replace one user's answer. Returns `false` if there is no record
    /// for `date`.
    pub fn upsert_answer(&self, date: &str, user_id: &str, answer: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: Option<String> = conn
                .query_row("SELECT date FROM daily_records WHERE date = ?1", [date], |row| {
                    row.get(0)
                })
                .optional()?;
            if exists.is_none() {
                return Ok(false);
            }

            conn.execute(
                "INSERT INTO answers (date, user_id, answer) VALUES (?1, ?2, ?3)
                 ON CONFLICT(date, user_id) DO UPDATE SET answer = excluded.answer, updated_at = datetime('now')",
                (date, user_id, answer),
            )?;
            Ok(true)
        })
    }

    /// Every date that has a record, oldest first.
    pub fn list_dates(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT date FROM daily_records ORDER BY date")?;
            let dates = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(dates)
        })
    }

    // -- Chat --

    /// Append a chat message. The stored timestamp is `now_ms`, bumped if needed
    /// so it is strictly greater than every earlier message of the same date.
    /// Returns the timestamp actually stored.
    pub fn insert_chat_message(
        &self,
        id: &str,
        date: &str,
        user_id: &str,
        username: &str,
        message: &str,
        now_ms: i64,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            let last: Option<i64> = conn.query_row(
                "SELECT MAX(timestamp_ms) FROM chat_messages WHERE date = ?1",
                [date],
                |row| row.get(0),
            )?;
            let timestamp_ms = match last {
                Some(last) if last >= now_ms => last + 1,
                _ => now_ms,
            };

            conn.execute(
                "INSERT INTO chat_messages (id, date, user_id, username, message, timestamp_ms) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, date, user_id, username, message, timestamp_ms],
            )?;
            Ok(timestamp_ms)
        })
    }

    pub fn get_chat_messages(&self, date: &str) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| query_chat_messages(conn, date))
    }
}

fn query_record(conn: &Connection, date: &str) -> Result<Option<RecordRow>> {
    let record = conn
        .query_row(
            "SELECT date, image_url, question, question_by FROM daily_records WHERE date = ?1",
            [date],
            |row| {
                Ok(RecordRow {
                    date: row.get(0)?,
                    image_url: row.get(1)?,
                    question: row.get(2)?,
                    question_by: row.get(3)?,
                    answers: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut record) = record else {
        return Ok(None);
    };

    // rowid keeps first-answer-first ordering across upserts
    let mut stmt =
        conn.prepare("SELECT user_id, answer FROM answers WHERE date = ?1 ORDER BY rowid")?;
    record.answers = stmt
        .query_map([date], |row| {
            Ok(AnswerRow {
                user_id: row.get(0)?,
                answer: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(record))
}

fn query_chat_messages(conn: &Connection, date: &str) -> Result<Vec<ChatMessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, user_id, username, message, timestamp_ms
         FROM chat_messages
         WHERE date = ?1
         ORDER BY timestamp_ms ASC, rowid ASC",
    )?;

    let rows = stmt
        .query_map([date], |row| {
            Ok(ChatMessageRow {
                id: row.get(0)?,
                date: row.get(1)?,
                user_id: row.get(2)?,
                username: row.get(3)?,
                message: row.get(4)?,
                timestamp_ms: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use moments_types::models::{ChatMessage, DailyRecord, UserId};

    use crate::Database;

    fn db_with_record(date: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_record(date, "data:image/jpeg;base64,AA==", "Vraag?", None).unwrap());
        db
    }

    #[test]
    fn second_insert_for_same_date_is_refused() {
        let db = db_with_record("2024-06-10");
        assert!(!db.insert_record("2024-06-10", "other", "Andere vraag?", Some("user1")).unwrap());

        let record: DailyRecord = db.get_record("2024-06-10").unwrap().unwrap().try_into().unwrap();
        assert_eq!(record.question, "Vraag?");
        assert_eq!(record.question_by, None);
        assert!(record.answers.is_empty());
    }

    #[test]
    fn upsert_answer_keeps_one_row_per_user() {
        let db = db_with_record("2024-06-10");
        assert!(db.upsert_answer("2024-06-10", "user1", "Peaceful.").unwrap());
        assert!(db.upsert_answer("2024-06-10", "user2", "Busy.").unwrap());
        assert!(db.upsert_answer("2024-06-10", "user1", "Peaceful, truly.").unwrap());

        let record: DailyRecord = db.get_record("2024-06-10").unwrap().unwrap().try_into().unwrap();
        assert_eq!(record.answers.len(), 2);
        assert_eq!(record.answers[0].user_id, UserId::User1);
        assert_eq!(record.answers[0].answer, "Peaceful, truly.");
    }

    #[test]
    fn upsert_answer_without_record_is_refused() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.upsert_answer("2024-06-10", "user1", "Hallo").unwrap());
    }

    #[test]
    fn chat_timestamps_strictly_increase() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_chat_message("00000000-0000-0000-0000-00000000000a", "2024-06-09", "user1", "Marty", "Hoi", 1_000).unwrap();
        // Same wall clock, and a clock that went backwards
        let b = db.insert_chat_message("00000000-0000-0000-0000-00000000000b", "2024-06-09", "user2", "Marieke", "Hi", 1_000).unwrap();
        let c = db.insert_chat_message("00000000-0000-0000-0000-00000000000c", "2024-06-09", "user1", "Marty", "!", 900).unwrap();
        assert!(a < b && b < c);

        let messages: Vec<ChatMessage> = db
            .get_chat_messages("2024-06-09")
            .unwrap()
            .into_iter()
            .map(|row| row.try_into().unwrap())
            .collect();
        let texts: Vec<_> = messages.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, ["Hoi", "Hi", "!"]);
    }

    #[test]
    fn dates_are_listed_in_order() {
        let db = db_with_record("2024-06-10");
        db.insert_record("2024-06-08", "x", "q", None).unwrap();
        assert_eq!(db.list_dates().unwrap(), ["2024-06-08", "2024-06-10"]);
    }

    #[test]
    fn account_uid_survives_reprovisioning() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_account("11111111-1111-1111-1111-111111111111", "user1", "a@b.c", "h1").unwrap();
        db.upsert_account("22222222-2222-2222-2222-222222222222", "user1", "a@b.c", "h2").unwrap();

        let account = db.get_account_by_user_id("user1").unwrap().unwrap();
        assert_eq!(account.uid, "11111111-1111-1111-1111-111111111111");
        assert_eq!(account.password_hash, "h2");
    }
}
