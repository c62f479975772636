use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::PersistenceError;

pub mod records;

pub use records::{
    parse_sqlite_utc, Conversation, ConversationOverview, KnowledgeDocument, Message, SenderRole,
};

/// Knowledge document installed on first start when none exists.
pub const DEFAULT_KNOWLEDGE_BASE: &str = "Harga kentang Rp5ribu perbungkus.
Pesan diatas 10 harga 4rb.
Jika pesan 10 Rp40ribu.
Jika pesan 20 Rp80ribu.
Jika pesan di atas 100 bungkus harga Rp3ribu.";

const NOW: &str = "strftime('%Y-%m-%d %H:%M:%f', 'now')";

const CONVERSATION_COLUMNS: &str = "id, telegram_chat_id, telegram_username, telegram_first_name, \
     is_bot_active, created_at, updated_at";

type DbResult<T> = Result<T, PersistenceError>;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> rusqlite::Result<Self> {
        Self::open(&config.database_url)
    }

    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| PersistenceError::Poisoned)
    }

    /// Runs synchronous store work on the blocking pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Database) -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    pub fn execute_init(&self) -> DbResult<()> {
        info!("Database: Initializing schema...");
        let sql = "
            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_chat_id INTEGER UNIQUE NOT NULL,
                telegram_username TEXT,
                telegram_first_name TEXT,
                is_bot_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id),
                sender_type TEXT NOT NULL CHECK (sender_type IN ('user', 'bot', 'admin')),
                message_text TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
                ON messages (conversation_id, created_at);

            CREATE TABLE IF NOT EXISTS knowledge_base (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );
        ";
        let conn = self.conn()?;
        conn.execute_batch(sql)?;

        let versions: i64 = conn.query_row("SELECT COUNT(*) FROM knowledge_base", [], |row| {
            row.get(0)
        })?;
        if versions == 0 {
            conn.execute(
                "INSERT INTO knowledge_base (content) VALUES (?1)",
                (DEFAULT_KNOWLEDGE_BASE,),
            )?;
            info!("Database: Seeded default knowledge base");
        }

        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    // --- Conversations ---

    /// Returns the conversation for `chat_id`, creating it on first contact.
    /// Names are only recorded at creation.
    pub fn upsert_conversation(
        &self,
        chat_id: i64,
        username: &str,
        first_name: &str,
    ) -> DbResult<Conversation> {
        let conn = self.conn()?;
        let created = conn.execute(
            "INSERT INTO conversations (telegram_chat_id, telegram_username, telegram_first_name)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(telegram_chat_id) DO NOTHING",
            (chat_id, username, first_name),
        )?;
        if created > 0 {
            info!("Database: Created conversation for chat {}", chat_id);
        }

        let conversation = conn.query_row(
            &format!(
                "SELECT {} FROM conversations WHERE telegram_chat_id = ?1",
                CONVERSATION_COLUMNS
            ),
            (chat_id,),
            conversation_from_row,
        )?;
        Ok(conversation)
    }

    pub fn get_conversation(&self, conversation_id: i64) -> DbResult<Option<Conversation>> {
        let conn = self.conn()?;
        let conversation = conn
            .query_row(
                &format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS),
                (conversation_id,),
                conversation_from_row,
            )
            .optional()?;
        Ok(conversation)
    }

    /// Sets the auto-reply flag. `updated_at` only moves when the value changes.
    pub fn set_bot_active(&self, conversation_id: i64, active: bool) -> DbResult<()> {
        let conn = self.conn()?;
        let matched = conn.execute(
            &format!(
                "UPDATE conversations
                 SET updated_at = CASE WHEN is_bot_active = ?1 THEN updated_at ELSE {} END,
                     is_bot_active = ?1
                 WHERE id = ?2",
                NOW
            ),
            (active, conversation_id),
        )?;
        if matched == 0 {
            return Err(PersistenceError::UnknownConversation(conversation_id));
        }
        Ok(())
    }

    /// Every conversation with its latest message, most recent activity first.
    pub fn list_conversations(&self) -> DbResult<Vec<ConversationOverview>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.telegram_chat_id, c.telegram_username, c.telegram_first_name,
                    c.is_bot_active, c.created_at, c.updated_at,
                    COALESCE((SELECT m.message_text FROM messages m
                              WHERE m.conversation_id = c.id
                              ORDER BY m.created_at DESC, m.id DESC LIMIT 1), '') AS last_message,
                    COALESCE((SELECT MAX(m.created_at) FROM messages m
                              WHERE m.conversation_id = c.id), c.created_at) AS last_message_at
             FROM conversations c
             ORDER BY last_message_at DESC, c.id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ConversationOverview {
                conversation: conversation_from_row(row)?,
                last_message: row.get(7)?,
                last_message_at: timestamp_column(row, 8)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    // --- Messages ---

    /// Appends a transcript row and refreshes the owner's `updated_at` in one
    /// transaction. `created_at` never goes backwards within a conversation.
    pub fn append_message(
        &self,
        conversation_id: i64,
        role: SenderRole,
        text: &str,
    ) -> DbResult<Message> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let touched = tx.execute(
            &format!("UPDATE conversations SET updated_at = {} WHERE id = ?1", NOW),
            (conversation_id,),
        )?;
        if touched == 0 {
            return Err(PersistenceError::UnknownConversation(conversation_id));
        }

        tx.execute(
            &format!(
                "INSERT INTO messages (conversation_id, sender_type, message_text, created_at)
                 VALUES (?1, ?2, ?3, MAX({}, COALESCE(
                     (SELECT MAX(created_at) FROM messages WHERE conversation_id = ?1), '')))",
                NOW
            ),
            (conversation_id, role.as_str(), text),
        )?;
        let id = tx.last_insert_rowid();
        let message = tx.query_row(
            "SELECT id, conversation_id, sender_type, message_text, created_at
             FROM messages WHERE id = ?1",
            (id,),
            message_from_row,
        )?;
        tx.commit()?;

        debug!(
            "Database: Appended {} message {} to conversation {}",
            role, message.id, conversation_id
        );
        Ok(message)
    }

    /// At most `limit` most recent messages, oldest first.
    pub fn recent_messages(&self, conversation_id: i64, limit: usize) -> DbResult<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, sender_type, message_text, created_at
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map((conversation_id, limit), message_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        results.reverse();
        Ok(results)
    }

    /// The whole transcript, oldest first.
    pub fn messages(&self, conversation_id: i64) -> DbResult<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, sender_type, message_text, created_at
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map((conversation_id,), message_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    // --- Knowledge base ---

    pub fn get_knowledge_base(&self) -> DbResult<Option<KnowledgeDocument>> {
        let conn = self.conn()?;
        let document = conn
            .query_row(
                "SELECT id, content, updated_at FROM knowledge_base ORDER BY id DESC LIMIT 1",
                [],
                knowledge_from_row,
            )
            .optional()?;
        Ok(document)
    }

    /// Stores `content` as the new current version. Earlier versions are kept.
    pub fn insert_knowledge_version(&self, content: &str) -> DbResult<KnowledgeDocument> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO knowledge_base (content) VALUES (?1)", (content,))?;
        let id = conn.last_insert_rowid();
        let document = conn.query_row(
            "SELECT id, content, updated_at FROM knowledge_base WHERE id = ?1",
            (id,),
            knowledge_from_row,
        )?;
        info!("Database: Knowledge base updated to version {}", id);
        Ok(document)
    }

    pub fn knowledge_history(&self, limit: usize) -> DbResult<Vec<KnowledgeDocument>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, updated_at FROM knowledge_base ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map((limit,), knowledge_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    let raw: String = row.get(idx)?;
    parse_sqlite_utc(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp '{}'", raw).into(),
        )
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        username: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        first_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        is_auto_active: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
        updated_at: timestamp_column(row, 6)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let raw_role: String = row.get(2)?;
    let role = SenderRole::parse(&raw_role).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.to_string().into())
    })?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role,
        text: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

fn knowledge_from_row(row: &Row<'_>) -> rusqlite::Result<KnowledgeDocument> {
    Ok(KnowledgeDocument {
        version: row.get(0)?,
        content: row.get(1)?,
        updated_at: timestamp_column(row, 2)?,
    })
}
