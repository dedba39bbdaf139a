//! Participant response payloads

use serde::{Deserialize, Serialize};

use super::message::{ChatMessage, ThreadMessage};

/// A single participant's reply to a "respond now" request.
///
/// A responding agent may produce intermediate events (tool activity,
/// inner deliberation) before its final message; both belong to the
/// conversation delta that the coordinator folds into the thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Intermediate messages produced while computing the reply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inner_messages: Vec<ThreadMessage>,
    /// The final chat message of the reply.
    pub message: ChatMessage,
}

impl ChatResponse {
    pub fn new(message: ChatMessage) -> Self {
        Self {
            inner_messages: Vec::new(),
            message,
        }
    }

    pub fn with_inner_messages(mut self, inner: Vec<ThreadMessage>) -> Self {
        self.inner_messages = inner;
        self
    }

    /// The thread delta for this response: inner messages in production
    /// order, followed by the final message.
    pub fn into_delta(self) -> Vec<ThreadMessage> {
        let mut delta = self.inner_messages;
        delta.push(ThreadMessage::Chat(self.message));
        delta
    }
}
