pub mod access_policy;
mod conversation_service;
mod message_service;
pub mod projection;
mod read_state;
mod store;

use std::sync::Arc;

use crate::infrastructure::repositories::{
    ConversationRepository, MessageRepository, NotificationRepository, UserRepository,
};

pub use access_policy::{authorize, ChatAction};
pub use conversation_service::ConversationService;
pub use message_service::MessageService;
pub use projection::MessageProjector;
pub use read_state::{ReadStateSynchronizer, ReadSync};
pub use store::StoreDeadline;

/// Store handles shared by the chat services.
#[derive(Clone)]
pub struct ChatRepositories {
    pub users: Arc<dyn UserRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}
