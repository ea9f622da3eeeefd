use std::future::Future;
use std::time::Duration;

use shared::outbound::Messenger;
use shared::tracker::Tracker;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;
use crate::telegram::{FailureClass, TelegramClient};

/// Single-consumer update loop. Updates are handled strictly one after
/// another, which is what serializes mutations per chat.
pub async fn run_polling<M, S>(
    client: &TelegramClient,
    tracker: &Tracker<M>,
    retry: RetryPolicy,
    shutdown: S,
) where
    M: Messenger + 'static,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut offset: Option<i64> = None;
    let mut consecutive_failures: u32 = 0;

    loop {
        let polled = tokio::select! {
            _ = &mut shutdown => break,
            polled = client.get_updates(offset) => polled,
        };

        match polled {
            Ok(updates) => {
                consecutive_failures = 0;
                for update in updates {
                    offset = Some(update.update_id + 1);
                    let update_id = update.update_id;
                    match update.into_inbound() {
                        Some(inbound) => {
                            debug!(update_id, chat_id = inbound.chat_id(), "processing update");
                            tracker.process(inbound).await;
                        }
                        None => debug!(update_id, "skipping unsupported update"),
                    }
                }
            }
            Err(err) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                let delay_seconds = match err.class() {
                    FailureClass::Transient => retry.delay_seconds(consecutive_failures),
                    FailureClass::Permanent => retry.max_seconds,
                };
                warn!(
                    attempt = consecutive_failures,
                    delay_seconds, "failed to poll updates: {err}"
                );

                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(Duration::from_secs(delay_seconds)) => {}
                }
            }
        }
    }

    info!("update loop stopped");
}
