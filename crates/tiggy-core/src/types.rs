//! # Core Types
//!
//! Threads, messages and the identity/profile records the client works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::title::{derive_title, SENTINEL_TITLE};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Assistant,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::User => write!(f, "user"),
            Origin::Assistant => write!(f, "assistant"),
        }
    }
}

const PLACEHOLDER_PREFIX: &str = "local-";

/// Thread identifier
///
/// Server-assigned once the thread is persisted. Threads synthesized locally
/// carry a placeholder id until the backend creates them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A transient id for a thread the backend does not know about yet
    pub fn placeholder() -> Self {
        Self(format!("{}{}", PLACEHOLDER_PREFIX, uuid::Uuid::new_v4()))
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ThreadId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single chat message. Never mutated once it is part of a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub origin: Origin,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a user message stamped with the local clock
    pub fn user(text: impl Into<String>) -> Self {
        Self::at(Origin::User, text, Utc::now())
    }

    /// Create an assistant message stamped at receipt time
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::at(Origin::Assistant, text, Utc::now())
    }

    /// Create a message with an explicit timestamp
    pub fn at(origin: Origin, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            origin,
            timestamp,
        }
    }

    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }
}

/// A chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub title: String,
    messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    /// Create an empty thread with the sentinel title
    pub fn new(id: impl Into<ThreadId>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: SENTINEL_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create the default thread used when the backend reports none
    pub fn placeholder() -> Self {
        Self::new(ThreadId::placeholder())
    }

    /// Build a thread from the separately stored user and assistant
    /// collections the backend returns.
    ///
    /// The merged sequence is ordered by timestamp; ties keep user messages
    /// ahead of assistant messages. A blank or missing server title falls back
    /// to the title derived from the first user message.
    pub fn merged(
        id: impl Into<ThreadId>,
        title: Option<String>,
        user_messages: Vec<Message>,
        assistant_messages: Vec<Message>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut messages = user_messages;
        messages.extend(assistant_messages);
        messages.sort_by_key(|m| m.timestamp);

        let title = title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                messages
                    .iter()
                    .find(|m| m.is_user())
                    .map(|m| derive_title(&m.text))
            })
            .unwrap_or_else(|| SENTINEL_TITLE.to_string());

        Self {
            id: id.into(),
            title,
            messages,
            created_at,
            updated_at,
        }
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_sentinel_title(&self) -> bool {
        self.title == SENTINEL_TITLE
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_placeholder()
    }

    /// Append a message, keeping the sequence sorted by timestamp.
    ///
    /// The title is derived from the text only when this is the first message
    /// and the title is still the sentinel.
    pub fn append(&mut self, message: Message) {
        if self.messages.is_empty() && self.has_sentinel_title() {
            self.title = derive_title(&message.text);
        }

        let idx = self
            .messages
            .partition_point(|m| m.timestamp <= message.timestamp);
        self.messages.insert(idx, message);
        self.updated_at = Utc::now().max(self.updated_at);
    }

    /// Remove a message by id. Only used to roll back an optimistic send.
    pub(crate) fn remove_message(&mut self, message_id: &str) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == message_id)?;
        Some(self.messages.remove(idx))
    }

    /// Explicit rename; the only way to change a derived title
    pub fn rename(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.updated_at = Utc::now();
    }
}

/// The stable key that scopes every backend call to one account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account profile as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub grad_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentration: Option<String>,
    #[serde(default)]
    pub certificates: Vec<String>,
}
