//! Conversation-related types and their durable record format.
//!
//! A record is the JSON shape written to disk:
//!
//! ```json
//! {
//!   "id": "8b0c...",
//!   "messages": [{ "role": "user", "content": "Hi", "timestamp": "..." }],
//!   "metadata": {},
//!   "created_at": "2025-01-01T10:00:00.123456789Z",
//!   "updated_at": "2025-01-01T10:00:02.5Z"
//! }
//! ```

use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shopkeeper_model::ModelMessage;
use uuid::Uuid;

use crate::error::MalformedRecordError;

/// Free-form conversation metadata.
///
/// The store never interprets it, so consumers must not assume any keys.
pub type Metadata = Map<String, Value>;

/// Who produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human talking to the agent.
    User,
    /// The agent's reply.
    Assistant,
    /// Notes recorded by the system itself, e.g. failed agent runs.
    System,
}

impl Role {
    /// Returns the record spelling of the role.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a conversation.
///
/// Ids double as file names, so only ASCII alphanumerics, `-` and `_` are
/// accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId(String);

impl ConversationId {
    /// Generates a fresh random id.
    #[inline]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(id: &str) -> bool {
        !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}

impl TryFrom<String> for ConversationId {
    type Error = MalformedRecordError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&id) {
            Ok(Self(id))
        } else {
            Err(MalformedRecordError::new(format!(
                "invalid conversation id {id:?}"
            )))
        }
    }
}

impl FromStr for ConversationId {
    type Err = MalformedRecordError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl From<ConversationId> for String {
    #[inline]
    fn from(id: ConversationId) -> Self {
        id.0
    }
}

impl Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One role-tagged unit of conversation content.
///
/// Messages are immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    #[serde(with = "timestamp", default = "Utc::now")]
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a message stamped with the current instant.
    #[inline]
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Returns who produced the message.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the message text.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns when the message was captured.
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Converts the message to its record form.
    pub fn to_record(&self) -> Value {
        serde_json::json!({
            "role": self.role.as_str(),
            "content": self.content,
            "timestamp": timestamp::format(&self.timestamp),
        })
    }

    /// Parses a message record.
    ///
    /// `role` and `content` are mandatory. A missing `timestamp` falls back
    /// to the current instant.
    pub fn from_record(record: Value) -> Result<Self, MalformedRecordError> {
        Ok(serde_json::from_value(record)?)
    }

    /// Returns the role and content, as presented to the agent.
    #[inline]
    pub fn to_context(&self) -> ContextEntry {
        ContextEntry {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A message as it appears in a context window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Who produced the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl From<&ContextEntry> for ModelMessage {
    fn from(entry: &ContextEntry) -> Self {
        let content = entry.content.clone();
        match entry.role {
            Role::User => ModelMessage::User(content),
            Role::Assistant => ModelMessage::Assistant(content),
            Role::System => ModelMessage::System(content),
        }
    }
}

/// An append-only, ordered history of messages plus metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(with = "timestamp", default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(with = "timestamp", default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Creates an empty conversation.
    pub fn new(id: ConversationId, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: vec![],
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the conversation id.
    #[inline]
    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Messages in chronological order.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the metadata bag.
    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns when the conversation was created.
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when a message was last appended.
    #[inline]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if no message was appended yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends a message stamped with the current instant and returns it.
    ///
    /// `updated_at` never moves backwards, even if the wall clock does.
    pub fn append<S: Into<String>>(&mut self, role: Role, content: S) -> Message {
        let message = Message::new(role, content);
        self.updated_at = self.updated_at.max(message.timestamp);
        self.messages.push(message.clone());
        message
    }

    /// Returns the trailing `max_messages` entries (all when `None`),
    /// oldest first.
    pub fn context_window(&self, max_messages: Option<usize>) -> Vec<ContextEntry> {
        let skip = match max_messages {
            Some(max) => self.messages.len().saturating_sub(max),
            None => 0,
        };
        self.messages[skip..].iter().map(Message::to_context).collect()
    }

    /// Converts the conversation to its record form.
    pub fn to_record(&self) -> Value {
        serde_json::json!({
            "id": self.id.as_str(),
            "messages": self.messages.iter().map(Message::to_record).collect::<Vec<_>>(),
            "metadata": self.metadata,
            "created_at": timestamp::format(&self.created_at),
            "updated_at": timestamp::format(&self.updated_at),
        })
    }

    /// Parses a conversation record. Only `id` is mandatory at this level,
    /// every message must still be well formed.
    pub fn from_record(record: Value) -> Result<Self, MalformedRecordError> {
        Ok(serde_json::from_value(record)?)
    }

    /// Parses a conversation from record text.
    pub fn from_json(text: &str) -> Result<Self, MalformedRecordError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Renders the record as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Textual instants: RFC 3339 with full sub-second precision on write.
///
/// Zone-less ISO-8601 values are read as UTC.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, ParseError, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn parse(s: &str) -> Result<DateTime<Utc>, ParseError> {
        DateTime::parse_from_rfc3339(s)
            .map(|ts| ts.with_timezone(&Utc))
            .or_else(|err| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|naive| naive.and_utc())
                    .map_err(|_| err)
            })
    }

    pub fn serialize<S: Serializer>(
        ts: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(de::Error::custom)
    }
}
