//! Scripted demo participants
//!
//! A scripted participant answers each respond-now request with the next
//! line of its script. It subscribes to its private topic (for directed
//! requests) and to the group topic (to observe the conversation), and
//! publishes each reply twice: as a relay message so the hosting caller
//! sees the conversation on the output channel, and as the agent response
//! that drives the coordinator's round bookkeeping.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use colloquy_application::coordinator::events::ChatEvent;
use colloquy_application::ports::message_bus::ChatBus;
use colloquy_domain::{ChatMessage, ChatResponse, ThreadMessage, TopicId};

use crate::bus::LocalChatBus;

/// A participant that replays a fixed script, one line per request.
pub struct ScriptedParticipant {
    name: String,
    responses: VecDeque<String>,
}

impl ScriptedParticipant {
    pub fn new(name: impl Into<String>, responses: Vec<String>) -> Self {
        Self {
            name: name.into(),
            responses: VecDeque::from(responses),
        }
    }

    /// Subscribe to the given topics and run until the bus goes away.
    pub fn spawn(
        self,
        bus: &Arc<LocalChatBus>,
        own_topic: impl Into<TopicId>,
        group_topic: impl Into<TopicId>,
        coordinator_topic: impl Into<TopicId>,
    ) -> JoinHandle<()> {
        let group_topic: TopicId = group_topic.into();
        let coordinator_topic: TopicId = coordinator_topic.into();
        let mut own = bus.subscribe(own_topic);
        let mut group = bus.subscribe(group_topic);
        let bus = Arc::clone(bus);
        let Self {
            name,
            mut responses,
        } = self;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    delivery = own.recv() => {
                        let Some(delivery) = delivery else { break };
                        match delivery.event {
                            ChatEvent::RequestSpeak => {
                                let content = responses.pop_front().unwrap_or_else(|| {
                                    "I have nothing further to add.".to_string()
                                });
                                debug!(participant = %name, "responding to speak request");
                                let message = ChatMessage::new(&name, content);

                                // Relay first so the host sees the reply
                                // before the round bookkeeping advances.
                                let relay = ChatEvent::Message {
                                    message: ThreadMessage::Chat(message.clone()),
                                };
                                if bus
                                    .publish(&coordinator_topic, relay, &delivery.cancellation)
                                    .await
                                    .is_err()
                                {
                                    break;
                                }

                                let response = ChatEvent::AgentResponse {
                                    source: name.clone(),
                                    response: ChatResponse::new(message),
                                };
                                if bus
                                    .publish(&coordinator_topic, response, &delivery.cancellation)
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            other => {
                                debug!(
                                    participant = %name,
                                    kind = other.kind(),
                                    "ignoring directed event"
                                );
                            }
                        }
                    }
                    delivery = group.recv() => {
                        let Some(delivery) = delivery else { break };
                        trace!(
                            participant = %name,
                            kind = delivery.event.kind(),
                            "observed group event"
                        );
                    }
                }
            }
        })
    }
}
