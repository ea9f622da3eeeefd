use tracing::debug;

use crate::models::ChatId;

use super::EventStore;

impl EventStore {
    pub fn append_event(&self, chat_id: ChatId, token: String) {
        let mut chats = self.lock_chats();
        let record = chats.entry(chat_id).or_default();
        record.events.push(token);
        debug!(chat_id, events = record.events.len(), "event appended");
        self.persist(&chats);
    }

    /// Removes the most recent event. Returns `false` when there was nothing to remove.
    pub fn delete_last_event(&self, chat_id: ChatId) -> bool {
        let mut chats = self.lock_chats();
        let removed = chats.entry(chat_id).or_default().events.pop();
        let Some(token) = removed else {
            return false;
        };

        debug!(chat_id, token = %token, "last event deleted");
        self.persist(&chats);
        true
    }
}
