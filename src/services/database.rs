use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;

use crate::config::APP_DIR_NAME;
use crate::models::{Message, Role};

#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn new() -> Result<Self> {
        let path = Self::db_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        tracing::debug!("Opened database at {}", path.display());

        Ok(db)
    }

    /// Create an in-memory database (used for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn db_path() -> Result<PathBuf> {
        let data_dir = match std::env::var("XDG_DATA_HOME") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let home = std::env::var("HOME").context("HOME not set")?;
                PathBuf::from(home).join(".local/share")
            }
        };
        Ok(data_dir
            .join(APP_DIR_NAME)
            .join(format!("{}.db", APP_DIR_NAME)))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE chat_messages (
                    id TEXT PRIMARY KEY,
                    position INTEGER NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX idx_chat_messages_position ON chat_messages(position);

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        Ok(())
    }

    // --- Chat history ---

    /// Replace the stored history with `messages`, keeping their order.
    pub async fn replace_chat_history(&self, messages: &[Message]) -> Result<()> {
        let conn = self.conn.clone();
        let messages = messages.to_vec();
        task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();
            let tx = conn.transaction()?;
            Self::write_history(&tx, &messages)?;
            tx.commit()?;
            Ok(())
        })
        .await?
    }

    /// Replace the history and one setting together; neither changes if either write fails.
    pub async fn replace_chat_history_with_setting(
        &self,
        messages: &[Message],
        key: &str,
        value: &str,
    ) -> Result<()> {
        let conn = self.conn.clone();
        let messages = messages.to_vec();
        let key = key.to_string();
        let value = value.to_string();
        task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();
            let tx = conn.transaction()?;
            Self::write_history(&tx, &messages)?;
            tx.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await?
    }

    fn write_history(tx: &rusqlite::Transaction, messages: &[Message]) -> Result<()> {
        tx.execute("DELETE FROM chat_messages", [])?;
        for (position, msg) in messages.iter().enumerate() {
            tx.execute(
                "INSERT INTO chat_messages (id, position, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    msg.id,
                    position as i64,
                    msg.role.as_str(),
                    msg.content,
                    msg.created_at.to_rfc3339(),
                ],
            )?;
        }
        Ok(())
    }

    pub async fn load_chat_history(&self) -> Result<Vec<Message>> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, role, content, created_at FROM chat_messages ORDER BY position ASC",
            )?;
            let messages = stmt
                .query_map([], |row| Ok(Self::row_to_message(row)))?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .collect::<Result<Vec<_>>>()?;
            Ok(messages)
        })
        .await?
    }

    pub async fn clear_chat_history(&self) -> Result<()> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute("DELETE FROM chat_messages", [])?;
            Ok(())
        })
        .await?
    }

    // --- Settings ---

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let result: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(result)
        })
        .await?
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.clone();
        let key = key.to_string();
        let value = value.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            Ok(())
        })
        .await?
    }

    // --- Row helpers ---

    fn row_to_message(row: &rusqlite::Row) -> Result<Message> {
        let role_str: String = row.get(1)?;
        let created_str: String = row.get(3)?;

        Ok(Message {
            id: row.get(0)?,
            role: Role::from_str(&role_str)
                .ok_or_else(|| anyhow::anyhow!("Unknown role: {}", role_str))?,
            content: row.get(2)?,
            created_at: DateTime::parse_from_rfc3339(&created_str)?.with_timezone(&Utc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_initialization() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.load_chat_history().await.unwrap().is_empty());
        assert!(db.get_setting("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::new_in_memory().unwrap();
        db.set_setting("k", "v").await.unwrap();
        db.run_migrations().unwrap();
        assert_eq!(db.get_setting("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let db = Database::new_in_memory().unwrap();
        db.set_setting("selected-language", "fr-FR").await.unwrap();
        db.set_setting("selected-language", "de-DE").await.unwrap();
        assert_eq!(
            db.get_setting("selected-language").await.unwrap().as_deref(),
            Some("de-DE")
        );
    }

    #[tokio::test]
    async fn test_chat_history_keeps_order_and_replaces() {
        let db = Database::new_in_memory().unwrap();
        let first = vec![
            Message::assistant("greeting"),
            Message::user("question"),
            Message::assistant("answer"),
        ];
        db.replace_chat_history(&first).await.unwrap();

        let loaded = db.load_chat_history().await.unwrap();
        let contents: Vec<&str> = loaded.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["greeting", "question", "answer"]);
        assert_eq!(loaded[1].role, Role::User);
        assert_eq!(loaded[0].id, first[0].id);

        db.replace_chat_history(&first[..1]).await.unwrap();
        assert_eq!(db.load_chat_history().await.unwrap().len(), 1);

        db.clear_chat_history().await.unwrap();
        assert!(db.load_chat_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_and_setting_roll_back_together() {
        let db = Database::new_in_memory().unwrap();
        db.set_setting("app_settings", "old").await.unwrap();
        db.replace_chat_history(&[Message::user("kept")]).await.unwrap();

        let dup = Message::user("one");
        let history = vec![dup.clone(), dup];
        assert!(db
            .replace_chat_history_with_setting(&history, "app_settings", "new")
            .await
            .is_err());

        assert_eq!(db.get_setting("app_settings").await.unwrap().as_deref(), Some("old"));
        let loaded = db.load_chat_history().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "kept");

        db.replace_chat_history_with_setting(&[Message::user("fresh")], "app_settings", "new")
            .await
            .unwrap();
        assert_eq!(db.get_setting("app_settings").await.unwrap().as_deref(), Some("new"));
        assert_eq!(db.load_chat_history().await.unwrap()[0].content, "fresh");
    }
}
