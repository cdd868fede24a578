use std::sync::Mutex;

use async_trait::async_trait;
use marketplace_chat::domain::NotificationRecord;
use marketplace_chat::error::{AppError, AppResult};
use marketplace_chat::infrastructure::repositories::NotificationRepository;
use uuid::Uuid;

#[derive(Default)]
pub struct MockNotificationRepo {
    records: Mutex<Vec<NotificationRecord>>,
    fail: Mutex<bool>,
}

impl MockNotificationRepo {
    pub fn fail_writes(&self) {
        *self.fail.lock().expect("fail mutex poisoned") = true;
    }

    pub fn records_for(&self, recipient_id: Uuid) -> Vec<NotificationRecord> {
        self.records
            .lock()
            .expect("records mutex poisoned")
            .iter()
            .filter(|record| record.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("records mutex poisoned").len()
    }
}

#[async_trait]
impl NotificationRepository for MockNotificationRepo {
    async fn create(&self, record: &NotificationRecord) -> AppResult<NotificationRecord> {
        if *self.fail.lock().expect("fail mutex poisoned") {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "notification store offline"
            )));
        }
        self.records
            .lock()
            .expect("records mutex poisoned")
            .push(record.clone());
        Ok(record.clone())
    }
}
