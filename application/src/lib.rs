//! Application layer for colloquy
//!
//! This crate contains the group chat coordinator state machine, the
//! sequential dispatch gate it is driven through, and the port
//! definitions implemented by the infrastructure layer. It depends only
//! on the domain layer.

pub mod coordinator;
pub mod gate;
pub mod ports;

// Re-export commonly used types
pub use coordinator::{
    ChatError, ChatEvent, ChatOutput, GroupChatBuilder, GroupChatCoordinator, OutputStream,
    SerializableChatError, TerminationEvent,
};
pub use gate::{GateClosed, SequentialGate, SequentialHandler};
pub use ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    message_bus::{BusError, ChatBus},
};
