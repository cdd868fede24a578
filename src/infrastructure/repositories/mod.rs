mod conversation_repository;
mod message_repository;
mod notification_repository;
mod traits;
mod user_repository;

pub use conversation_repository::ConversationRepositoryImpl;
pub use message_repository::MessageRepositoryImpl;
pub use notification_repository::NotificationRepositoryImpl;
pub use traits::{
    ConversationRepository, MessageRepository, NotificationRepository, UserRepository,
};
pub use user_repository::UserRepositoryImpl;
