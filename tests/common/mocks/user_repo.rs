use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use marketplace_chat::domain::User;
use marketplace_chat::error::AppResult;
use marketplace_chat::infrastructure::repositories::UserRepository;
use uuid::Uuid;

#[derive(Default)]
pub struct MockUserRepo {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MockUserRepo {
    pub fn push(&self, user: User) {
        self.users
            .lock()
            .expect("users mutex poisoned")
            .insert(user.id, user);
    }
}

#[async_trait]
impl UserRepository for MockUserRepo {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .expect("users mutex poisoned")
            .get(&id)
            .cloned())
    }
}
