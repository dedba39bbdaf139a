//! Group chat coordinator
//!
//! The coordinator is a reactive state machine driven entirely by
//! externally delivered [`ChatEvent`]s. Round by round it selects who
//! speaks next, folds concurrently arriving responses into the thread,
//! enforces the termination policy, and delivers the conversation — ended
//! by exactly one termination event — on the output channel.
//!
//! # Wiring
//!
//! ```text
//! Bus -> handle_event -> Sequential Gate -> state machine
//!                                             |-> Bus (group relay, respond-now requests)
//!                                             '-> Output channel -> hosting caller
//! ```
//!
//! Construction goes through [`GroupChatBuilder`]; all roster and turn
//! limit validation happens there, before any message is processed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use colloquy_domain::{
    AcceptingValidator, ConfigurationError, GroupStateValidator, MessageThread,
    ParticipantRegistry, SpeakerSelector, StopMessage, TerminationCondition, TopicId,
};

use crate::gate::SequentialGate;
use crate::ports::conversation_logger::{ConversationLogger, NoConversationLogger};
use crate::ports::message_bus::ChatBus;

pub mod error;
pub mod events;
mod output;
mod state;

pub use error::ChatError;
pub use events::{ChatEvent, ChatOutput, SerializableChatError, TerminationEvent};
pub use output::OutputStream;

use state::{CoordinatorState, GateEntry, Lifecycle};

/// Handle to a running coordinator instance.
///
/// The conversation state itself is owned by the gate worker; this handle
/// routes inbound events (serializing the designated kinds through the
/// gate), flips the pause flag, and exposes the fault channel on which
/// handler errors are re-raised to the hosting runtime.
pub struct GroupChatCoordinator {
    name: String,
    gate: SequentialGate<GateEntry>,
    paused: Arc<AtomicBool>,
    halted: Arc<AtomicBool>,
    output: output::OutputSink,
    faults: Option<mpsc::UnboundedReceiver<ChatError>>,
}

impl GroupChatCoordinator {
    pub fn builder(name: impl Into<String>) -> GroupChatBuilder {
        GroupChatBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver one bus event to this coordinator.
    ///
    /// Start, responses, message relays, reset, and the resume
    /// continuation are queued through the sequential gate and handled in
    /// delivery order without overlap. Pause and participant errors take
    /// effect as they arrive, even while a gated handler is in flight.
    /// Returns an error only for kinds the coordinator has no handler for
    /// or when the coordinator has stopped.
    pub fn handle_event(
        &self,
        event: ChatEvent,
        cancellation: CancellationToken,
    ) -> Result<(), ChatError> {
        match event {
            ChatEvent::Start { .. }
            | ChatEvent::AgentResponse { .. }
            | ChatEvent::TeamResponse { .. }
            | ChatEvent::Message { .. }
            | ChatEvent::Reset => {
                self.gate.dispatch(GateEntry {
                    event,
                    cancellation,
                })?;
                Ok(())
            }
            ChatEvent::Pause => {
                debug!("pausing group chat");
                self.paused.store(true, Ordering::SeqCst);
                Ok(())
            }
            ChatEvent::Resume => {
                debug!("resuming group chat");
                self.paused.store(false, Ordering::SeqCst);
                // Run any transition deferred while paused, in order with
                // the queued handlers.
                self.gate.dispatch(GateEntry {
                    event: ChatEvent::Resume,
                    cancellation,
                })?;
                Ok(())
            }
            ChatEvent::Error { error } => {
                warn!(%error, "participant reported an error");
                self.halted.store(true, Ordering::SeqCst);
                self.output
                    .signal_termination(TerminationEvent::with_error(
                        StopMessage::new(&self.name, "An error occurred in the group chat."),
                        error,
                    ));
                Ok(())
            }
            ChatEvent::RequestSpeak => Err(ChatError::UnhandledMessage("request_speak")),
        }
    }

    /// Take the fault channel. Handler errors (selection and validation
    /// failures, unknown speakers, transport errors) are re-raised here
    /// after their termination event was emitted.
    pub fn take_faults(&mut self) -> Option<mpsc::UnboundedReceiver<ChatError>> {
        self.faults.take()
    }
}

/// Builder assembling a coordinator and its output stream.
pub struct GroupChatBuilder {
    name: String,
    participant_names: Vec<String>,
    participant_topics: Vec<TopicId>,
    participant_descriptions: Vec<String>,
    group_topic: TopicId,
    max_turns: Option<u32>,
    emit_speaker_events: bool,
    termination: Option<Box<dyn TerminationCondition>>,
    validator: Box<dyn GroupStateValidator>,
    logger: Arc<dyn ConversationLogger>,
}

impl GroupChatBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            participant_names: Vec::new(),
            participant_topics: Vec::new(),
            participant_descriptions: Vec::new(),
            group_topic: TopicId::new("group"),
            max_turns: None,
            emit_speaker_events: false,
            termination: None,
            validator: Box::new(AcceptingValidator),
            logger: Arc::new(NoConversationLogger),
        }
    }

    /// Register one participant: display name, private topic, description.
    pub fn participant(
        mut self,
        name: impl Into<String>,
        topic: impl Into<TopicId>,
        description: impl Into<String>,
    ) -> Self {
        self.participant_names.push(name.into());
        self.participant_topics.push(topic.into());
        self.participant_descriptions.push(description.into());
        self
    }

    /// Register all participants at once from parallel arrays. The arrays
    /// must have equal lengths; this is validated in [`build`](Self::build).
    pub fn participants(
        mut self,
        names: Vec<String>,
        topics: Vec<TopicId>,
        descriptions: Vec<String>,
    ) -> Self {
        self.participant_names = names;
        self.participant_topics = topics;
        self.participant_descriptions = descriptions;
        self
    }

    pub fn group_topic(mut self, topic: impl Into<TopicId>) -> Self {
        self.group_topic = topic.into();
        self
    }

    /// Stop after this many completed turns. Zero is rejected at build.
    pub fn max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    pub fn termination_condition(mut self, condition: Box<dyn TerminationCondition>) -> Self {
        self.termination = Some(condition);
        self
    }

    pub fn validator(mut self, validator: Box<dyn GroupStateValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Also emit per-round speaker selection events on the output channel.
    pub fn emit_speaker_events(mut self, emit: bool) -> Self {
        self.emit_speaker_events = emit;
        self
    }

    pub fn conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Validate the configuration, spawn the gate worker, and return the
    /// coordinator handle plus the output stream.
    ///
    /// Must be called within a tokio runtime.
    pub fn build(
        self,
        bus: Arc<dyn ChatBus>,
        selector: Box<dyn SpeakerSelector>,
    ) -> Result<(GroupChatCoordinator, OutputStream), ConfigurationError> {
        if self.max_turns == Some(0) {
            return Err(ConfigurationError::NonPositiveMaxTurns);
        }
        let registry = ParticipantRegistry::new(
            self.participant_names,
            self.participant_topics,
            self.participant_descriptions,
            self.group_topic,
        )?;

        let (output_sink, output_stream) = output::OutputSink::channel();
        let paused = Arc::new(AtomicBool::new(false));
        let halted = Arc::new(AtomicBool::new(false));
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();

        let state = CoordinatorState {
            name: self.name.clone(),
            registry,
            bus,
            selector,
            termination: self.termination,
            validator: self.validator,
            logger: self.logger,
            output: output_sink.clone(),
            paused: Arc::clone(&paused),
            halted: Arc::clone(&halted),
            thread: MessageThread::new(),
            active_speakers: Vec::new(),
            round_delta: Vec::new(),
            current_turn: 0,
            max_turns: self.max_turns,
            emit_speaker_events: self.emit_speaker_events,
            lifecycle: Lifecycle::Idle,
            pending_transition: false,
            run_cancellation: CancellationToken::new(),
        };

        let coordinator = GroupChatCoordinator {
            name: self.name,
            gate: SequentialGate::spawn(state, fault_tx),
            paused,
            halted,
            output: output_sink,
            faults: Some(fault_rx),
        };
        Ok((coordinator, output_stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use colloquy_domain::{
        ChatMessage, ChatResponse, RoundRobinSelector, SelectionError, SpeakerSelection,
        TextMentionTermination, ThreadMessage, ValidationError,
    };

    use crate::ports::message_bus::BusError;

    // === Mock implementations ===

    struct RecordingBus {
        published: Mutex<Vec<(TopicId, ChatEvent)>>,
    }

    impl RecordingBus {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                published: Mutex::new(Vec::new()),
            })
        }

        /// Number of respond-now requests published to a topic so far.
        fn requests_to(&self, topic: &str) -> usize {
            self.published
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, e)| t.as_str() == topic && matches!(e, ChatEvent::RequestSpeak))
                .count()
        }

        fn group_relays(&self, topic: &str) -> usize {
            self.published
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, e)| t.as_str() == topic && matches!(e, ChatEvent::Start { .. }))
                .count()
        }
    }

    #[async_trait]
    impl ChatBus for RecordingBus {
        async fn publish(
            &self,
            topic: &TopicId,
            event: ChatEvent,
            _cancellation: &CancellationToken,
        ) -> Result<(), BusError> {
            self.published.lock().unwrap().push((topic.clone(), event));
            Ok(())
        }
    }

    /// Selector returning the same selection on every round, recording
    /// each call and the thread it was shown.
    struct ScriptedSelector {
        selection: SpeakerSelection,
        calls: Arc<AtomicUsize>,
        threads_seen: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl ScriptedSelector {
        fn new(selection: SpeakerSelection) -> (Self, Arc<AtomicUsize>, Arc<Mutex<Vec<Vec<String>>>>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let threads_seen = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    selection,
                    calls: Arc::clone(&calls),
                    threads_seen: Arc::clone(&threads_seen),
                },
                calls,
                threads_seen,
            )
        }
    }

    #[async_trait]
    impl colloquy_domain::SpeakerSelector for ScriptedSelector {
        async fn select(
            &mut self,
            thread: &[ThreadMessage],
        ) -> Result<SpeakerSelection, SelectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.threads_seen
                .lock()
                .unwrap()
                .push(thread.iter().map(|m| m.source().to_string()).collect());
            Ok(self.selection.clone())
        }
    }

    /// Selector that never completes; used to exercise cancellation.
    struct StallingSelector;

    #[async_trait]
    impl colloquy_domain::SpeakerSelector for StallingSelector {
        async fn select(
            &mut self,
            _thread: &[ThreadMessage],
        ) -> Result<SpeakerSelection, SelectionError> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    struct RejectingValidator;

    #[async_trait]
    impl GroupStateValidator for RejectingValidator {
        async fn validate(
            &self,
            _messages: &[ChatMessage],
        ) -> Result<(), ValidationError> {
            Err(ValidationError::new("start messages rejected"))
        }
    }

    // === Helpers ===

    fn two_party() -> GroupChatBuilder {
        GroupChatCoordinator::builder("chat")
            .participant("X", "tx", "participant X")
            .participant("Y", "ty", "participant Y")
    }

    fn start_with(content: &str) -> ChatEvent {
        ChatEvent::Start {
            messages: vec![ChatMessage::user(content)],
            output_task_messages: false,
        }
    }

    fn response_from(name: &str, content: &str) -> ChatEvent {
        ChatEvent::AgentResponse {
            source: name.to_string(),
            response: ChatResponse::new(ChatMessage::new(name, content)),
        }
    }

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..250 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached in time");
    }

    // === Scenario tests ===

    #[tokio::test]
    async fn max_turns_reached_emits_one_termination() {
        let bus = RecordingBus::new();
        let (selector, calls, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (coordinator, mut output) = two_party()
            .max_turns(1)
            .build(bus.clone(), Box::new(selector))
            .unwrap();

        coordinator.handle_event(start_with("go"), token()).unwrap();
        wait_until(|| bus.requests_to("tx") == 1).await;

        coordinator
            .handle_event(response_from("X", "my answer"), token())
            .unwrap();

        let (messages, termination) = output.drain_until_termination().await;
        assert!(messages.is_empty());
        let termination = termination.unwrap();
        assert_eq!(
            termination.message.content,
            "Maximum number of turns 1 reached."
        );
        assert!(!termination.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_condition_on_start_messages_skips_selection() {
        let bus = RecordingBus::new();
        let (selector, calls, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (coordinator, mut output) = two_party()
            .termination_condition(Box::new(TextMentionTermination::new("DONE")))
            .build(bus.clone(), Box::new(selector))
            .unwrap();

        coordinator
            .handle_event(start_with("this task is already DONE"), token())
            .unwrap();

        let (_, termination) = output.drain_until_termination().await;
        assert_eq!(
            termination.unwrap().message.content,
            "Text 'DONE' mentioned"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.requests_to("tx"), 0);
        assert_eq!(bus.requests_to("ty"), 0);
        assert_eq!(bus.group_relays("group"), 1);
    }

    #[tokio::test]
    async fn unknown_speaker_terminates_with_error_and_reraises() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::One("Z".to_string()));
        let (mut coordinator, mut output) =
            two_party().build(bus.clone(), Box::new(selector)).unwrap();
        let mut faults = coordinator.take_faults().unwrap();

        coordinator.handle_event(start_with("go"), token()).unwrap();

        let (_, termination) = output.drain_until_termination().await;
        let termination = termination.unwrap();
        assert!(termination.is_error());
        let error = termination.error.unwrap();
        assert_eq!(error.error_type, "unknown_speaker");
        assert!(error.error_message.contains("'Z'"));

        let fault = faults.recv().await.unwrap();
        assert!(matches!(fault, ChatError::UnknownSpeaker(name) if name == "Z"));
        assert_eq!(bus.requests_to("tx"), 0);
    }

    #[tokio::test]
    async fn round_completes_only_after_all_responses_in_arrival_order() {
        let bus = RecordingBus::new();
        let (selector, calls, threads_seen) = ScriptedSelector::new(SpeakerSelection::Many(vec![
            "X".to_string(),
            "Y".to_string(),
        ]));
        let (coordinator, _output) = two_party().build(bus.clone(), Box::new(selector)).unwrap();

        coordinator.handle_event(start_with("go"), token()).unwrap();
        wait_until(|| bus.requests_to("tx") == 1 && bus.requests_to("ty") == 1).await;

        // Y answers first; the round stays open until X answers too.
        coordinator
            .handle_event(response_from("Y", "from Y"), token())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        coordinator
            .handle_event(response_from("X", "from X"), token())
            .unwrap();
        wait_until(|| calls.load(Ordering::SeqCst) == 2).await;

        let threads = threads_seen.lock().unwrap();
        assert_eq!(threads[1], vec!["user", "Y", "X"]);
    }

    #[tokio::test]
    async fn team_response_folds_the_sub_team_messages() {
        let bus = RecordingBus::new();
        let (selector, _, threads_seen) =
            ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (coordinator, _output) = two_party().build(bus.clone(), Box::new(selector)).unwrap();

        coordinator.handle_event(start_with("go"), token()).unwrap();
        wait_until(|| bus.requests_to("tx") == 1).await;

        coordinator
            .handle_event(
                ChatEvent::TeamResponse {
                    source: "X".to_string(),
                    messages: vec![
                        ChatMessage::new("X.inner", "inner finding").into(),
                        ChatMessage::new("X", "team summary").into(),
                    ],
                },
                token(),
            )
            .unwrap();

        // The sub-team's full message list lands in the thread in order.
        wait_until(|| threads_seen.lock().unwrap().len() == 2).await;
        assert_eq!(
            threads_seen.lock().unwrap()[1],
            vec!["user", "X.inner", "X"]
        );
    }

    #[tokio::test]
    async fn condition_sees_the_accumulated_round_delta() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::Many(vec![
            "X".to_string(),
            "Y".to_string(),
        ]));
        let (coordinator, mut output) = two_party()
            .termination_condition(Box::new(TextMentionTermination::new("DONE")))
            .build(bus.clone(), Box::new(selector))
            .unwrap();

        coordinator.handle_event(start_with("go"), token()).unwrap();
        wait_until(|| bus.requests_to("tx") == 1 && bus.requests_to("ty") == 1).await;

        // The stop phrase arrives mid-round; termination only fires once
        // the round completes.
        coordinator
            .handle_event(response_from("X", "DONE"), token())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(output.try_recv().is_none());

        coordinator
            .handle_event(response_from("Y", "ok"), token())
            .unwrap();
        let (_, termination) = output.drain_until_termination().await;
        assert_eq!(
            termination.unwrap().message.content,
            "Text 'DONE' mentioned"
        );
    }

    #[tokio::test]
    async fn start_after_termination_is_an_idempotent_short_circuit() {
        let bus = RecordingBus::new();
        let (selector, calls, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (coordinator, mut output) = two_party()
            .max_turns(1)
            .build(bus.clone(), Box::new(selector))
            .unwrap();

        coordinator.handle_event(start_with("go"), token()).unwrap();
        wait_until(|| bus.requests_to("tx") == 1).await;
        coordinator
            .handle_event(response_from("X", "answer"), token())
            .unwrap();
        let (_, first) = output.drain_until_termination().await;
        assert!(!first.unwrap().is_error());

        coordinator
            .handle_event(start_with("again"), token())
            .unwrap();
        let (messages, second) = output.drain_until_termination().await;
        assert!(messages.is_empty());
        assert_eq!(
            second.unwrap().message.content,
            "The group chat has already terminated."
        );
        // No new selection, no new requests, no new group relay.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.requests_to("tx"), 1);
        assert_eq!(bus.group_relays("group"), 1);
    }

    #[tokio::test]
    async fn reset_returns_to_idle_and_allows_a_fresh_conversation() {
        let bus = RecordingBus::new();
        let selector = RoundRobinSelector::new(["X", "Y"]);
        let (coordinator, mut output) = two_party()
            .max_turns(1)
            .build(bus.clone(), Box::new(selector))
            .unwrap();

        coordinator.handle_event(start_with("one"), token()).unwrap();
        wait_until(|| bus.requests_to("tx") == 1).await;
        coordinator
            .handle_event(response_from("X", "a"), token())
            .unwrap();
        output.drain_until_termination().await;

        coordinator.handle_event(ChatEvent::Reset, token()).unwrap();
        coordinator.handle_event(start_with("two"), token()).unwrap();

        // The selector was reset, so the fresh conversation starts from X
        // again instead of continuing the rotation.
        wait_until(|| bus.requests_to("tx") == 2).await;
        assert_eq!(bus.requests_to("ty"), 0);

        coordinator
            .handle_event(response_from("X", "b"), token())
            .unwrap();
        let (_, termination) = output.drain_until_termination().await;
        assert_eq!(
            termination.unwrap().message.content,
            "Maximum number of turns 1 reached."
        );
    }

    #[tokio::test]
    async fn turn_counter_drives_termination_after_each_completed_round() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (coordinator, mut output) = two_party()
            .max_turns(2)
            .build(bus.clone(), Box::new(selector))
            .unwrap();

        coordinator.handle_event(start_with("go"), token()).unwrap();
        wait_until(|| bus.requests_to("tx") == 1).await;
        coordinator
            .handle_event(response_from("X", "round one"), token())
            .unwrap();
        wait_until(|| bus.requests_to("tx") == 2).await;
        coordinator
            .handle_event(response_from("X", "round two"), token())
            .unwrap();

        let (_, termination) = output.drain_until_termination().await;
        assert_eq!(
            termination.unwrap().message.content,
            "Maximum number of turns 2 reached."
        );
        assert_eq!(bus.requests_to("tx"), 2);
    }

    #[tokio::test]
    async fn relayed_messages_reach_the_output_without_selection() {
        let bus = RecordingBus::new();
        let (selector, calls, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (coordinator, mut output) = two_party().build(bus, Box::new(selector)).unwrap();

        coordinator
            .handle_event(
                ChatEvent::Message {
                    message: ChatMessage::new("observer", "fyi").into(),
                },
                token(),
            )
            .unwrap();

        let relayed = output.recv().await.unwrap();
        match relayed {
            ChatOutput::Message(message) => assert_eq!(message.content(), Some("fyi")),
            other => panic!("expected a relayed message, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pause_defers_the_transition_until_resume() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (coordinator, _output) = two_party().build(bus.clone(), Box::new(selector)).unwrap();

        coordinator.handle_event(ChatEvent::Pause, token()).unwrap();
        coordinator.handle_event(start_with("go"), token()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(bus.requests_to("tx"), 0);

        coordinator.handle_event(ChatEvent::Resume, token()).unwrap();
        wait_until(|| bus.requests_to("tx") == 1).await;
    }

    #[tokio::test]
    async fn participant_error_terminates_gracefully() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (coordinator, mut output) = two_party().build(bus, Box::new(selector)).unwrap();

        coordinator
            .handle_event(
                ChatEvent::Error {
                    error: SerializableChatError::new("model_error", "X lost its session"),
                },
                token(),
            )
            .unwrap();

        let (_, termination) = output.drain_until_termination().await;
        let termination = termination.unwrap();
        assert_eq!(
            termination.message.content,
            "An error occurred in the group chat."
        );
        assert_eq!(termination.error.unwrap().error_type, "model_error");
    }

    #[tokio::test]
    async fn response_from_an_inactive_speaker_is_fatal() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (mut coordinator, mut output) =
            two_party().build(bus.clone(), Box::new(selector)).unwrap();
        let mut faults = coordinator.take_faults().unwrap();

        coordinator.handle_event(start_with("go"), token()).unwrap();
        wait_until(|| bus.requests_to("tx") == 1).await;

        coordinator
            .handle_event(response_from("Y", "not my turn"), token())
            .unwrap();

        let (_, termination) = output.drain_until_termination().await;
        assert_eq!(
            termination.unwrap().error.unwrap().error_type,
            "unexpected_response"
        );
        let fault = faults.recv().await.unwrap();
        assert!(matches!(fault, ChatError::UnexpectedResponse(name) if name == "Y"));
    }

    #[tokio::test]
    async fn rejected_start_terminates_with_a_validation_error() {
        let bus = RecordingBus::new();
        let (selector, calls, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (mut coordinator, mut output) = two_party()
            .validator(Box::new(RejectingValidator))
            .build(bus, Box::new(selector))
            .unwrap();
        let mut faults = coordinator.take_faults().unwrap();

        coordinator.handle_event(start_with("go"), token()).unwrap();

        let (_, termination) = output.drain_until_termination().await;
        assert_eq!(
            termination.unwrap().error.unwrap().error_type,
            "validation_failure"
        );
        assert!(matches!(
            faults.recv().await.unwrap(),
            ChatError::Validation(_)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelling_the_run_aborts_an_in_flight_selection() {
        let bus = RecordingBus::new();
        let (mut coordinator, mut output) = two_party()
            .build(bus, Box::new(StallingSelector))
            .unwrap();
        let mut faults = coordinator.take_faults().unwrap();

        let run_token = CancellationToken::new();
        coordinator
            .handle_event(start_with("go"), run_token.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        run_token.cancel();

        let (_, termination) = output.drain_until_termination().await;
        assert_eq!(termination.unwrap().error.unwrap().error_type, "cancelled");
        assert!(matches!(faults.recv().await.unwrap(), ChatError::Cancelled));
    }

    #[tokio::test]
    async fn inbound_request_speak_is_unhandled() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (coordinator, _output) = two_party().build(bus, Box::new(selector)).unwrap();

        let result = coordinator.handle_event(ChatEvent::RequestSpeak, token());
        assert!(matches!(
            result.unwrap_err(),
            ChatError::UnhandledMessage("request_speak")
        ));
    }

    #[tokio::test]
    async fn task_and_selection_events_stream_to_the_output() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let (coordinator, mut output) = two_party()
            .max_turns(1)
            .emit_speaker_events(true)
            .build(bus.clone(), Box::new(selector))
            .unwrap();

        coordinator
            .handle_event(
                ChatEvent::Start {
                    messages: vec![ChatMessage::user("the task")],
                    output_task_messages: true,
                },
                token(),
            )
            .unwrap();
        wait_until(|| bus.requests_to("tx") == 1).await;
        coordinator
            .handle_event(response_from("X", "answer"), token())
            .unwrap();

        let (messages, termination) = output.drain_until_termination().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content(), Some("the task"));
        match &messages[1] {
            ThreadMessage::Event(colloquy_domain::AgentEvent::SpeakerSelected {
                speakers, ..
            }) => assert_eq!(speakers, &vec!["X".to_string()]),
            other => panic!("expected a speaker selection event, got {:?}", other),
        }
        assert!(termination.is_some());
    }

    // === Construction validation ===

    #[tokio::test]
    async fn duplicate_topics_fail_the_build() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let result = GroupChatCoordinator::builder("chat")
            .participant("X", "t", "one")
            .participant("Y", "t", "two")
            .build(bus, Box::new(selector));
        assert!(matches!(
            result.err().unwrap(),
            ConfigurationError::DuplicateTopic(_)
        ));
    }

    #[tokio::test]
    async fn mismatched_parallel_arrays_fail_the_build() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let result = GroupChatCoordinator::builder("chat")
            .participants(
                vec!["X".to_string(), "Y".to_string()],
                vec![TopicId::new("tx"), TopicId::new("ty")],
                vec!["only one".to_string()],
            )
            .build(bus, Box::new(selector));
        assert!(matches!(
            result.err().unwrap(),
            ConfigurationError::LengthMismatch
        ));
    }

    #[tokio::test]
    async fn zero_max_turns_fails_the_build() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let result = two_party().max_turns(0).build(bus, Box::new(selector));
        assert!(matches!(
            result.err().unwrap(),
            ConfigurationError::NonPositiveMaxTurns
        ));
    }

    #[tokio::test]
    async fn group_topic_colliding_with_a_participant_fails_the_build() {
        let bus = RecordingBus::new();
        let (selector, _, _) = ScriptedSelector::new(SpeakerSelection::One("X".to_string()));
        let result = two_party()
            .group_topic("tx")
            .build(bus, Box::new(selector));
        assert!(matches!(
            result.err().unwrap(),
            ConfigurationError::GroupTopicCollision(_)
        ));
    }
}
