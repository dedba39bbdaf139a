//! Built-in termination conditions

use async_trait::async_trait;

use crate::chat::message::{StopMessage, ThreadMessage};

use super::{TerminationCondition, TerminationError};

/// Stops once the conversation has produced a total number of messages.
#[derive(Debug, Clone)]
pub struct MaxMessageTermination {
    max_messages: usize,
    seen: usize,
    terminated: bool,
}

impl MaxMessageTermination {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            seen: 0,
            terminated: false,
        }
    }
}

#[async_trait]
impl TerminationCondition for MaxMessageTermination {
    fn terminated(&self) -> bool {
        self.terminated
    }

    async fn evaluate(
        &mut self,
        delta: &[ThreadMessage],
    ) -> Result<Option<StopMessage>, TerminationError> {
        if self.terminated {
            return Err(TerminationError::AlreadyTerminated);
        }
        self.seen += delta.len();
        if self.seen >= self.max_messages {
            self.terminated = true;
            return Ok(Some(StopMessage::new(
                "max_message_termination",
                format!(
                    "Maximum number of messages {} reached, current message count: {}.",
                    self.max_messages, self.seen
                ),
            )));
        }
        Ok(None)
    }

    async fn reset(&mut self) {
        self.seen = 0;
        self.terminated = false;
    }
}

/// Stops when any chat or stop message in a delta mentions a given text.
#[derive(Debug, Clone)]
pub struct TextMentionTermination {
    text: String,
    terminated: bool,
}

impl TextMentionTermination {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            terminated: false,
        }
    }
}

#[async_trait]
impl TerminationCondition for TextMentionTermination {
    fn terminated(&self) -> bool {
        self.terminated
    }

    async fn evaluate(
        &mut self,
        delta: &[ThreadMessage],
    ) -> Result<Option<StopMessage>, TerminationError> {
        if self.terminated {
            return Err(TerminationError::AlreadyTerminated);
        }
        for message in delta {
            if let Some(content) = message.content()
                && content.contains(&self.text)
            {
                self.terminated = true;
                return Ok(Some(StopMessage::new(
                    "text_mention_termination",
                    format!("Text '{}' mentioned", self.text),
                )));
            }
        }
        Ok(None)
    }

    async fn reset(&mut self) {
        self.terminated = false;
    }
}

/// Stops when any of the inner conditions stops (OR combination).
pub struct AnyTermination {
    conditions: Vec<Box<dyn TerminationCondition>>,
    terminated: bool,
}

impl AnyTermination {
    pub fn new(conditions: Vec<Box<dyn TerminationCondition>>) -> Self {
        Self {
            conditions,
            terminated: false,
        }
    }
}

#[async_trait]
impl TerminationCondition for AnyTermination {
    fn terminated(&self) -> bool {
        self.terminated
    }

    async fn evaluate(
        &mut self,
        delta: &[ThreadMessage],
    ) -> Result<Option<StopMessage>, TerminationError> {
        if self.terminated {
            return Err(TerminationError::AlreadyTerminated);
        }
        for condition in &mut self.conditions {
            if let Some(stop) = condition.evaluate(delta).await? {
                self.terminated = true;
                return Ok(Some(stop));
            }
        }
        Ok(None)
    }

    async fn reset(&mut self) {
        for condition in &mut self.conditions {
            condition.reset().await;
        }
        self.terminated = false;
    }
}
