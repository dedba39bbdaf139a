//! Coordinator state machine
//!
//! All mutable conversation state lives here, owned by the gate worker:
//! the thread, the active speaker set, the turn counter, and the injected
//! strategies. Handlers are only ever run one at a time and in delivery
//! order, which is the sole mutual-exclusion mechanism — no locks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use colloquy_domain::{
    AgentEvent, ChatMessage, GroupStateValidator, MessageThread, ParticipantRegistry,
    SpeakerSelector, StopMessage, TerminationCondition, ThreadMessage,
};

use crate::gate::SequentialHandler;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use crate::ports::message_bus::ChatBus;

use super::error::ChatError;
use super::events::{ChatEvent, SerializableChatError, TerminationEvent};
use super::output::OutputSink;

/// Coordinator lifecycle. `Terminated` is absorbing until a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Idle,
    Running,
    Terminated,
}

/// One gate-serialized delivery: the event plus the cancellation context
/// the bus attached to the operation.
pub(crate) struct GateEntry {
    pub(crate) event: ChatEvent,
    pub(crate) cancellation: CancellationToken,
}

pub(crate) struct CoordinatorState {
    pub(crate) name: String,
    pub(crate) registry: ParticipantRegistry,
    pub(crate) bus: Arc<dyn ChatBus>,
    pub(crate) selector: Box<dyn SpeakerSelector>,
    pub(crate) termination: Option<Box<dyn TerminationCondition>>,
    pub(crate) validator: Box<dyn GroupStateValidator>,
    pub(crate) logger: Arc<dyn ConversationLogger>,
    pub(crate) output: OutputSink,
    /// Set by the Pause bypass path while a handler may be in flight.
    pub(crate) paused: Arc<AtomicBool>,
    /// Set by the Error bypass path; treated like `Terminated`.
    pub(crate) halted: Arc<AtomicBool>,
    pub(crate) thread: MessageThread,
    pub(crate) active_speakers: Vec<String>,
    /// Messages accumulated since the round started, fed to the
    /// termination condition when the round completes.
    pub(crate) round_delta: Vec<ThreadMessage>,
    pub(crate) current_turn: u32,
    pub(crate) max_turns: Option<u32>,
    pub(crate) emit_speaker_events: bool,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) pending_transition: bool,
    pub(crate) run_cancellation: CancellationToken,
}

#[async_trait]
impl SequentialHandler for CoordinatorState {
    type Event = GateEntry;
    type Error = ChatError;

    async fn handle(&mut self, entry: GateEntry) -> Result<(), ChatError> {
        match entry.event {
            ChatEvent::Start {
                messages,
                output_task_messages,
            } => {
                self.handle_start(messages, output_task_messages, entry.cancellation)
                    .await
            }
            ChatEvent::AgentResponse { source, response } => {
                self.handle_response(source, response.into_delta()).await
            }
            ChatEvent::TeamResponse { source, messages } => {
                self.handle_response(source, messages).await
            }
            ChatEvent::Message { message } => {
                self.output.send_message(message);
                Ok(())
            }
            ChatEvent::Reset => self.handle_reset().await,
            ChatEvent::Resume => self.handle_resume().await,
            other => Err(ChatError::UnhandledMessage(other.kind())),
        }
    }
}

impl CoordinatorState {
    async fn handle_start(
        &mut self,
        messages: Vec<ChatMessage>,
        output_task_messages: bool,
        cancellation: CancellationToken,
    ) -> Result<(), ChatError> {
        // Each start opens a new conversation scope with its own
        // one-termination guarantee.
        self.output.begin_conversation();

        let already_terminated = self.lifecycle == Lifecycle::Terminated
            || self.halted.load(Ordering::SeqCst)
            || self.termination.as_ref().is_some_and(|c| c.terminated());
        if already_terminated {
            info!("start requested on a terminated group chat");
            self.output
                .signal_termination(TerminationEvent::new(StopMessage::new(
                    &self.name,
                    "The group chat has already terminated.",
                )));
            return Ok(());
        }

        if let Err(error) = self
            .try_start(messages, output_task_messages, cancellation)
            .await
        {
            self.fail_conversation(&error);
            return Err(error);
        }
        Ok(())
    }

    async fn try_start(
        &mut self,
        messages: Vec<ChatMessage>,
        output_task_messages: bool,
        cancellation: CancellationToken,
    ) -> Result<(), ChatError> {
        self.lifecycle = Lifecycle::Running;
        self.run_cancellation = cancellation;

        self.validator.validate(&messages).await?;

        if !messages.is_empty() {
            info!(count = messages.len(), "starting group chat");

            if output_task_messages {
                for message in &messages {
                    self.output
                        .send_message(ThreadMessage::Chat(message.clone()));
                }
            }

            // Relay the task to every participant via the group topic.
            self.bus
                .publish(
                    self.registry.group_topic(),
                    ChatEvent::Start {
                        messages: messages.clone(),
                        output_task_messages,
                    },
                    &self.run_cancellation,
                )
                .await?;

            let delta: Vec<ThreadMessage> =
                messages.into_iter().map(ThreadMessage::Chat).collect();
            self.append_to_thread(&delta);

            // The start delta counts toward termination but not turns.
            if self.apply_termination(&delta, false).await? {
                return Ok(());
            }
        }

        self.transition_to_next_speakers().await
    }

    async fn handle_response(
        &mut self,
        source: String,
        delta: Vec<ThreadMessage>,
    ) -> Result<(), ChatError> {
        if let Err(error) = self.try_response(source, delta).await {
            self.fail_conversation(&error);
            return Err(error);
        }
        Ok(())
    }

    async fn try_response(
        &mut self,
        source: String,
        delta: Vec<ThreadMessage>,
    ) -> Result<(), ChatError> {
        if self.lifecycle != Lifecycle::Running || self.halted.load(Ordering::SeqCst) {
            debug!(%source, "dropping response outside a running conversation");
            return Ok(());
        }

        // Responses fold into the thread in arrival order.
        self.append_to_thread(&delta);
        self.round_delta.extend(delta);

        let position = self
            .active_speakers
            .iter()
            .position(|name| name == &source)
            .ok_or_else(|| ChatError::UnexpectedResponse(source.clone()))?;
        self.active_speakers.remove(position);
        debug!(
            %source,
            remaining = self.active_speakers.len(),
            "response accepted"
        );

        if !self.active_speakers.is_empty() {
            // The round is still open; wait for the remaining speakers.
            return Ok(());
        }

        let round_delta = std::mem::take(&mut self.round_delta);
        if self.apply_termination(&round_delta, true).await? {
            return Ok(());
        }

        self.transition_to_next_speakers().await
    }

    /// Select the next speaker(s) and send them directed requests.
    async fn transition_to_next_speakers(&mut self) -> Result<(), ChatError> {
        if self.paused.load(Ordering::SeqCst) {
            debug!("group chat paused, deferring speaker transition");
            self.pending_transition = true;
            return Ok(());
        }
        self.pending_transition = false;

        let selection = tokio::select! {
            biased;
            _ = self.run_cancellation.cancelled() => return Err(ChatError::Cancelled),
            selection = self.selector.select(self.thread.as_slice()) => selection?,
        };

        let speakers = selection.into_names();
        for name in &speakers {
            if !self.registry.contains(name) {
                return Err(ChatError::UnknownSpeaker(name.clone()));
            }
        }

        debug!(?speakers, turn = self.current_turn, "next speakers selected");
        self.logger.log(ConversationEvent::new(
            "speaker_selected",
            serde_json::json!({ "speakers": &speakers }),
        ));
        if self.emit_speaker_events {
            self.output
                .send_message(ThreadMessage::Event(AgentEvent::SpeakerSelected {
                    source: self.name.clone(),
                    speakers: speakers.clone(),
                }));
        }

        self.round_delta.clear();
        for name in speakers {
            let Some(topic) = self.registry.topic_of(&name) else {
                return Err(ChatError::UnknownSpeaker(name));
            };
            self.bus
                .publish(topic, ChatEvent::RequestSpeak, &self.run_cancellation)
                .await?;
            self.active_speakers.push(name);
        }
        Ok(())
    }

    /// Evaluate the termination condition over `delta` and enforce the
    /// turn limit. Returns true when the conversation terminated.
    async fn apply_termination(
        &mut self,
        delta: &[ThreadMessage],
        increment_turn: bool,
    ) -> Result<bool, ChatError> {
        if let Some(condition) = self.termination.as_mut()
            && let Some(stop) = condition.evaluate(delta).await?
        {
            condition.reset().await;
            self.current_turn = 0;
            self.finish_conversation(TerminationEvent::new(stop));
            return Ok(true);
        }

        if increment_turn {
            self.current_turn += 1;
        }

        if let Some(max_turns) = self.max_turns
            && self.current_turn >= max_turns
        {
            let stop = StopMessage::new(
                &self.name,
                format!("Maximum number of turns {} reached.", max_turns),
            );
            if let Some(condition) = self.termination.as_mut() {
                condition.reset().await;
            }
            self.current_turn = 0;
            self.finish_conversation(TerminationEvent::new(stop));
            return Ok(true);
        }

        Ok(false)
    }

    async fn handle_resume(&mut self) -> Result<(), ChatError> {
        if self.pending_transition && self.lifecycle == Lifecycle::Running {
            debug!("running speaker transition deferred by pause");
            if let Err(error) = self.transition_to_next_speakers().await {
                self.fail_conversation(&error);
                return Err(error);
            }
        }
        Ok(())
    }

    async fn handle_reset(&mut self) -> Result<(), ChatError> {
        info!("resetting group chat");
        self.selector.reset().await;
        self.thread.clear();
        self.current_turn = 0;
        self.active_speakers.clear();
        self.round_delta.clear();
        self.pending_transition = false;
        self.halted.store(false, Ordering::SeqCst);
        self.lifecycle = Lifecycle::Idle;
        self.logger
            .log(ConversationEvent::new("reset", serde_json::json!({})));
        Ok(())
    }

    fn append_to_thread(&mut self, delta: &[ThreadMessage]) {
        for message in delta {
            self.logger.log(ConversationEvent::new(
                "message",
                serde_json::json!({
                    "source": message.source(),
                    "content": message.content(),
                }),
            ));
        }
        self.thread.append(delta.iter().cloned());
    }

    /// Emit the terminal event and make the terminated state absorbing.
    fn finish_conversation(&mut self, event: TerminationEvent) {
        info!(reason = %event.message.content, "group chat terminated");
        self.logger.log(ConversationEvent::new(
            "termination",
            serde_json::json!({
                "reason": &event.message.content,
                "error": event.error.as_ref().map(|e| e.to_string()),
            }),
        ));
        self.pending_transition = false;
        self.lifecycle = Lifecycle::Terminated;
        self.output.signal_termination(event);
    }

    /// Strategy or transport failure: emit exactly one
    /// termination-with-error, leave the speaker set consistent, and let
    /// the caller re-raise.
    fn fail_conversation(&mut self, error: &ChatError) {
        self.active_speakers.clear();
        self.round_delta.clear();
        self.finish_conversation(TerminationEvent::with_error(
            StopMessage::new(&self.name, "An error occurred in the group chat."),
            SerializableChatError::from(error),
        ));
    }
}
