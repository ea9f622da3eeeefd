use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::models::ChatId;

pub const DEFAULT_REMINDER_UNIT: Duration = Duration::from_secs(3600);

/// Arms one-shot reminders as independent tasks.
///
/// Armed reminders cannot be cancelled and are lost on restart.
#[derive(Debug, Clone, Copy)]
pub struct ReminderScheduler {
    unit: Duration,
}

impl Default for ReminderScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REMINDER_UNIT)
    }
}

impl ReminderScheduler {
    /// `unit` is the wall-clock length of one reminder hour.
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn delay_for(&self, hours: u32) -> Duration {
        self.unit.saturating_mul(hours)
    }

    /// Runs `on_fire(chat_id, hours)` once after `hours` units have passed.
    pub fn arm<F, Fut>(&self, chat_id: ChatId, hours: u32, on_fire: F) -> JoinHandle<()>
    where
        F: FnOnce(ChatId, u32) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay_for(hours);
        debug!(chat_id, hours, delay_seconds = delay.as_secs(), "reminder armed");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!(chat_id, hours, "reminder fired");
            on_fire(chat_id, hours).await;
        })
    }
}
