//! Conversation message entities
//!
//! A conversation thread is a sequence of [`ThreadMessage`]s: participant
//! chat content, stop requests, and side-channel agent events such as the
//! per-round speaker selection log.

use serde::{Deserialize, Serialize};

/// A participant-authored chat message (Entity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Name of the participant (or host) that authored the message.
    pub source: String,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
        }
    }

    /// Message authored by the hosting caller (the conversation task).
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// A request to stop the conversation, carrying a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopMessage {
    /// Component that decided to stop (condition, coordinator, participant).
    pub source: String,
    /// Human-readable stop reason.
    pub content: String,
}

impl StopMessage {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
        }
    }
}

/// Side information emitted during orchestration, not authored by any
/// participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentEvent {
    /// The coordinator selected the next speaker(s) for a round.
    SpeakerSelected {
        /// Coordinator name.
        source: String,
        /// Selected participant names, in request order.
        speakers: Vec<String>,
    },
}

impl AgentEvent {
    pub fn source(&self) -> &str {
        match self {
            AgentEvent::SpeakerSelected { source, .. } => source,
        }
    }
}

/// Any entry of a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThreadMessage {
    Chat(ChatMessage),
    Stop(StopMessage),
    Event(AgentEvent),
}

impl ThreadMessage {
    /// The author of this entry.
    pub fn source(&self) -> &str {
        match self {
            ThreadMessage::Chat(m) => &m.source,
            ThreadMessage::Stop(m) => &m.source,
            ThreadMessage::Event(e) => e.source(),
        }
    }

    /// Textual content for chat and stop entries; `None` for agent events.
    pub fn content(&self) -> Option<&str> {
        match self {
            ThreadMessage::Chat(m) => Some(&m.content),
            ThreadMessage::Stop(m) => Some(&m.content),
            ThreadMessage::Event(_) => None,
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(self, ThreadMessage::Chat(_))
    }
}

impl From<ChatMessage> for ThreadMessage {
    fn from(message: ChatMessage) -> Self {
        ThreadMessage::Chat(message)
    }
}

impl From<StopMessage> for ThreadMessage {
    fn from(message: StopMessage) -> Self {
        ThreadMessage::Stop(message)
    }
}

impl From<AgentEvent> for ThreadMessage {
    fn from(event: AgentEvent) -> Self {
        ThreadMessage::Event(event)
    }
}
