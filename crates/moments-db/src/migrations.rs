use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS accounts (
            uid             TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL UNIQUE,
            email           TEXT NOT NULL,
            password_hash   TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS daily_records (
            date            TEXT PRIMARY KEY,
            image_url       TEXT NOT NULL,
            question        TEXT NOT NULL,
            question_by     TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS answers (
            date            TEXT NOT NULL REFERENCES daily_records(date),
            user_id         TEXT NOT NULL,
            answer          TEXT NOT NULL,
            updated_at      TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (date, user_id)
        );

        CREATE TABLE IF NOT EXISTS chat_messages (
            id              TEXT PRIMARY KEY,
            date            TEXT NOT NULL,
            user_id         TEXT NOT NULL,
            username        TEXT NOT NULL,
            message         TEXT NOT NULL,
            timestamp_ms    INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_date
            ON chat_messages(date, timestamp_ms);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
