//! Port for structured conversation transcript logging.
//!
//! Separate from `tracing`-based diagnostics: tracing carries
//! human-readable operational messages, while this port records the
//! conversation itself (appended messages, speaker selections,
//! terminations) in a machine-readable form such as JSONL.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// One structured transcript record.
pub struct ConversationEvent {
    /// Record type identifier (e.g., "message", "speaker_selected",
    /// "termination").
    pub event_type: &'static str,
    /// UTC time the record was created.
    pub timestamp: DateTime<Utc>,
    /// JSON payload with record-specific fields.
    pub payload: Value,
}

impl ConversationEvent {
    /// Create a record stamped with the current UTC time.
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Sink for conversation transcript records.
///
/// `log` is intentionally synchronous and non-fallible so that transcript
/// recording can never disrupt conversation handling; implementations
/// swallow their own I/O errors.
pub trait ConversationLogger: Send + Sync {
    fn log(&self, event: ConversationEvent);
}

/// No-op implementation for tests and when transcript logging is disabled.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}
