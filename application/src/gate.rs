//! Sequential dispatch gate
//!
//! The bus may deliver messages from any number of concurrent operations,
//! but a coordinator must handle its designated message kinds one at a
//! time, in delivery order. The gate provides exactly that: an ordered
//! queue drained by a single worker task that awaits each handler to
//! completion (including everything the handler itself awaits) before
//! accepting the next entry.
//!
//! A handler failure is surfaced on the fault channel and logged, but the
//! gate keeps draining: each queued entry is handled independently, and
//! the handler decides whether a failure is fatal for its own state.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

/// The gate worker has stopped and no further entries can be queued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("the sequential dispatch gate has stopped")]
pub struct GateClosed;

/// Handler driven by the gate worker. `&mut self` access is safe by
/// construction: the worker is the sole owner and never overlaps calls.
#[async_trait]
pub trait SequentialHandler: Send + 'static {
    type Event: Send + 'static;
    type Error: std::fmt::Display + Send + 'static;

    async fn handle(&mut self, event: Self::Event) -> Result<(), Self::Error>;
}

/// Serialized dispatch queue for one coordinator instance.
pub struct SequentialGate<E> {
    tx: mpsc::UnboundedSender<E>,
    _worker: JoinHandle<()>,
}

impl<E: Send + 'static> SequentialGate<E> {
    /// Spawn the worker owning `handler`. Handler errors are forwarded on
    /// `fault_tx` for the hosting runtime to observe.
    pub fn spawn<H>(mut handler: H, fault_tx: mpsc::UnboundedSender<H::Error>) -> Self
    where
        H: SequentialHandler<Event = E>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<E>();
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(fault) = handler.handle(event).await {
                    error!("sequential handler failed: {}", fault);
                    let _ = fault_tx.send(fault);
                }
            }
        });
        Self {
            tx,
            _worker: worker,
        }
    }

    /// Queue an entry for serialized handling. Returns immediately; the
    /// entry is handled once all previously queued entries completed.
    pub fn dispatch(&self, event: E) -> Result<(), GateClosed> {
        self.tx.send(event).map_err(|_| GateClosed)
    }
}
