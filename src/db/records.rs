use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::Error;

/// Timestamp layout written by the schema (`strftime('%Y-%m-%d %H:%M:%f')`).
pub const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Who authored a transcript row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    User,
    Bot,
    Admin,
}

impl SenderRole {
    pub fn as_str(self) -> &'static str {
        match self {
            SenderRole::User => "user",
            SenderRole::Bot => "bot",
            SenderRole::Admin => "admin",
        }
    }

    /// Parses a stored role.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        match raw {
            "user" => Ok(SenderRole::User),
            "bot" => Ok(SenderRole::Bot),
            "admin" => Ok(SenderRole::Admin),
            other => Err(Error::Validation(format!("unknown sender role '{}'", other))),
        }
    }
}

impl std::fmt::Display for SenderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    pub id: i64,
    pub chat_id: i64,
    pub username: String,
    pub first_name: String,
    pub is_auto_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub role: SenderRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A conversation row as the operator list shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationOverview {
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Empty when the conversation has no messages yet.
    pub last_message: String,
    /// Falls back to the conversation's creation time.
    pub last_message_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeDocument {
    pub version: i64,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

pub fn parse_sqlite_utc(ts: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(ts, SQLITE_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S"))
        .ok()?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}
