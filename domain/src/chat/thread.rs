//! Conversation thread entity

use super::message::ThreadMessage;

/// Ordered, append-only conversation history (Entity)
///
/// Owned exclusively by the coordinator; entries are only removed by a
/// full [`clear`](Self::clear) on reset.
#[derive(Debug, Clone, Default)]
pub struct MessageThread {
    messages: Vec<ThreadMessage>,
}

impl MessageThread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta of messages in the order given.
    pub fn append(&mut self, delta: impl IntoIterator<Item = ThreadMessage>) {
        self.messages.extend(delta);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn as_slice(&self) -> &[ThreadMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ThreadMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
