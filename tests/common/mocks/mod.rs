#[allow(dead_code, unused_imports)]
pub mod attachments;
#[allow(dead_code, unused_imports)]
pub mod notification_repo;
#[allow(dead_code, unused_imports)]
pub mod user_repo;

#[allow(dead_code, unused_imports)]
pub use attachments::MemoryAttachmentStorage;
#[allow(dead_code, unused_imports)]
pub use conversation_repo::MockConversationRepo;
#[allow(dead_code, unused_imports)]
pub use message_repo::MockMessageRepo;
#[allow(dead_code, unused_imports)]
pub use notification_repo::MockNotificationRepo;
#[allow(dead_code, unused_imports)]
pub use user_repo::MockUserRepo;
