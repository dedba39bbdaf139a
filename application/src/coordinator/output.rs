//! Output channel plumbing
//!
//! Multiple internal emission points (the gate worker and the Error
//! bypass path) enqueue into one FIFO drained by the hosting caller. The
//! sink guarantees at most one termination event per conversation scope:
//! the guard is re-armed at the start of each `Start` handling and closed
//! by compare-and-swap on the first termination.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use colloquy_domain::ThreadMessage;

use super::events::{ChatOutput, TerminationEvent};

/// Multi-producer side of the output channel.
#[derive(Clone)]
pub(crate) struct OutputSink {
    tx: mpsc::UnboundedSender<ChatOutput>,
    termination_signalled: Arc<AtomicBool>,
}

impl OutputSink {
    pub(crate) fn channel() -> (Self, OutputStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx,
            termination_signalled: Arc::new(AtomicBool::new(false)),
        };
        (sink, OutputStream { rx })
    }

    /// Re-arm the termination guard for a new conversation scope.
    pub(crate) fn begin_conversation(&self) {
        self.termination_signalled.store(false, Ordering::SeqCst);
    }

    pub(crate) fn send_message(&self, message: ThreadMessage) {
        let _ = self.tx.send(ChatOutput::Message(message));
    }

    /// Emit the terminal event for the current conversation scope.
    /// Returns false when a termination was already signalled and this
    /// one was suppressed.
    pub(crate) fn signal_termination(&self, event: TerminationEvent) -> bool {
        if self
            .termination_signalled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(
                reason = %event.message.content,
                "suppressing duplicate termination signal"
            );
            return false;
        }
        let _ = self.tx.send(ChatOutput::Termination(event));
        true
    }
}

/// Single-consumer side of the output channel.
///
/// Also usable as a [`futures::Stream`]; consumers drain until they see a
/// [`ChatOutput::Termination`] or the channel closes.
pub struct OutputStream {
    rx: mpsc::UnboundedReceiver<ChatOutput>,
}

impl OutputStream {
    pub async fn recv(&mut self) -> Option<ChatOutput> {
        self.rx.recv().await
    }

    /// Non-blocking receive, mainly useful in tests.
    pub fn try_recv(&mut self) -> Option<ChatOutput> {
        self.rx.try_recv().ok()
    }

    /// Collect messages until the terminal event (or channel close, in
    /// which case the termination slot is `None`).
    pub async fn drain_until_termination(
        &mut self,
    ) -> (Vec<ThreadMessage>, Option<TerminationEvent>) {
        let mut messages = Vec::new();
        while let Some(output) = self.rx.recv().await {
            match output {
                ChatOutput::Message(message) => messages.push(message),
                ChatOutput::Termination(event) => return (messages, Some(event)),
            }
        }
        (messages, None)
    }
}

impl Stream for OutputStream {
    type Item = ChatOutput;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
