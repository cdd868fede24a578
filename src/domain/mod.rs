pub mod conversation;
pub mod errors;
pub mod message;
pub mod notification;
pub mod user;

pub use conversation::{
    Conversation, ConversationKind, ConversationSettings, DirectKey, LastMessageSnapshot,
    Participant, ParticipantRole,
};
pub use errors::DomainError;
pub use message::{Attachment, Message, MessageCursor, MessageKind, Reaction};
pub use notification::NotificationRecord;
pub use user::{Caller, Role, User};
