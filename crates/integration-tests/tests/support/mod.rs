#![allow(dead_code)]

pub mod telegram_mock;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use shared::models::ChatId;
use shared::outbound::{Messenger, MessengerFuture, Outbound, OutboundGate};
use shared::reminder::ReminderScheduler;
use shared::store::EventStore;
use shared::timestamp::reference_offset;
use shared::tracker::{Inbound, Tracker};
use tempfile::TempDir;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct RecordingMessenger {
    sent: Arc<Mutex<Vec<Outbound>>>,
}

impl RecordingMessenger {
    pub async fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().await.clone()
    }
}

impl Messenger for RecordingMessenger {
    fn deliver<'a>(&'a self, outbound: Outbound) -> MessengerFuture<'a> {
        Box::pin(async move {
            self.sent.lock().await.push(outbound);
            Ok(())
        })
    }
}

pub struct TestTracker {
    pub dir: TempDir,
    pub messenger: RecordingMessenger,
    pub tracker: Tracker<RecordingMessenger>,
}

impl TestTracker {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir should be created");
        Self::in_dir(dir)
    }

    /// Opens a fresh tracker over the snapshot already in `dir`, as a restart would.
    pub fn in_dir(dir: TempDir) -> Self {
        let messenger = RecordingMessenger::default();
        let store = Arc::new(EventStore::open(data_file(&dir)));
        let tracker = Tracker::new(
            store,
            OutboundGate::new(messenger.clone()),
            ReminderScheduler::new(Duration::from_secs(3600)),
            reference_offset(3).expect("valid offset"),
        );

        Self {
            dir,
            messenger,
            tracker,
        }
    }

    pub fn data_file(&self) -> PathBuf {
        data_file(&self.dir)
    }
}

fn data_file(dir: &TempDir) -> PathBuf {
    dir.path().join("vkids.json")
}

pub fn text(chat_id: ChatId, text: &str) -> Inbound {
    Inbound::Text {
        chat_id,
        text: text.to_string(),
    }
}

pub fn action(chat_id: ChatId, callback_id: &str, data: &str) -> Inbound {
    Inbound::Action {
        chat_id,
        callback_id: callback_id.to_string(),
        data: data.to_string(),
    }
}
