use tracing::debug;

use crate::models::{ChatId, ReminderSetting};

use super::EventStore;

impl EventStore {
    pub fn set_reminder(&self, chat_id: ChatId, setting: ReminderSetting) {
        let mut chats = self.lock_chats();
        chats.entry(chat_id).or_default().reminder = setting;
        debug!(chat_id, reminder = ?setting, "reminder updated");
        self.persist(&chats);
    }
}
