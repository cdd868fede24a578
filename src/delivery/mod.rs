//! Live delivery of chat events to connected sessions.
//!
//! The fan-out owns the only in-memory shared state of the chat core: which
//! sessions are connected, which user each belongs to, and which conversation
//! channels each one listens on.

mod events;
mod fanout;
mod gate;

pub use events::{
    DeliveryEvent, MessageDeletedPayload, MessageEditedPayload, MessageNotificationPayload,
    ReactionChangedPayload, TypingPayload,
};
pub use fanout::{DeliveryFanout, FanoutStats, SessionHandle};
pub use gate::{ConversationGate, ConversationPermit};
