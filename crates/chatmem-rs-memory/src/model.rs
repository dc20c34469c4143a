//! Message, conversation and partition-key models.

use crate::error::ArchiveError;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker tag attached to every message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        };
        f.write_str(name)
    }
}

/// One persisted line in a date file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// `{chat_id}-{order}`; stable for a given conversation position.
    pub id: String,
    /// Owning conversation.
    pub chat_id: String,
    /// Conversation title at the time of writing, display only.
    pub chat_title: String,
    /// Position within the conversation.
    pub order: usize,
    /// Speaker.
    pub role: Role,
    /// Message body, possibly empty.
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl MessageRecord {
    /// Deterministic identity for a conversation position.
    pub fn identity(chat_id: &str, order: usize) -> String {
        format!("{chat_id}-{order}")
    }

    /// Partition this record belongs to.
    pub fn date_key(&self) -> Result<DateKey, ArchiveError> {
        DateKey::from_millis(self.timestamp)
    }
}

/// UTC calendar date used to pick the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    /// Truncate an epoch-millisecond timestamp to its UTC date.
    pub fn from_millis(millis: i64) -> Result<Self, ArchiveError> {
        DateTime::from_timestamp_millis(millis)
            .map(|instant| Self(instant.date_naive()))
            .ok_or(ArchiveError::InvalidTimestamp(millis))
    }

    /// Underlying calendar date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Message as held by the chat client, before denormalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    /// Epoch milliseconds, when the client recorded one.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Conversation with its ordered messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Empty when the id only appears as the key of a keyed export.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Denormalize every message into a persistable record.
    ///
    /// Missing timestamps fall back to the conversation creation time, then
    /// to `now_millis`.
    pub fn to_records(&self, default_title: &str, now_millis: i64) -> Vec<MessageRecord> {
        let title = self.title.as_deref().unwrap_or(default_title);
        self.messages
            .iter()
            .enumerate()
            .map(|(order, message)| MessageRecord {
                id: MessageRecord::identity(&self.id, order),
                chat_id: self.id.clone(),
                chat_title: title.to_string(),
                order,
                role: message.role,
                content: message.content.clone().unwrap_or_default(),
                timestamp: message
                    .timestamp
                    .or(self.created_at)
                    .unwrap_or(now_millis),
            })
            .collect()
    }
}
