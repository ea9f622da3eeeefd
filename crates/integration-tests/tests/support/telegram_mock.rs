use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::{Mutex, Notify};

pub const TEST_TOKEN: &str = "test-token";

#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: StatusCode,
    pub body: Value,
}

impl MockReply {
    pub fn ok(result: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({ "ok": true, "result": result }),
        }
    }

    pub fn error(status: StatusCode, description: &str) -> Self {
        Self {
            status,
            body: json!({
                "ok": false,
                "error_code": status.as_u16(),
                "description": description
            }),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockTelegramState {
    replies: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    message_sent: Arc<Notify>,
}

impl MockTelegramState {
    pub async fn push_reply(&self, method: &str, reply: MockReply) {
        self.replies
            .lock()
            .await
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    pub async fn calls(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|(name, _)| name == method)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Resolves once `sendMessage` has been called `count` times.
    pub async fn wait_for_messages(&self, count: usize) {
        loop {
            let notified = self.message_sent.notified();
            if self.calls("sendMessage").await.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

pub struct MockTelegramServer {
    pub base_url: String,
    pub state: MockTelegramState,
    handle: tokio::task::JoinHandle<()>,
}

impl MockTelegramServer {
    pub async fn start() -> Self {
        let state = MockTelegramState::default();
        let app = Router::new()
            .route(&format!("/bot{TEST_TOKEN}/{{method}}"), post(handle_method))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock telegram listener should bind");
        let bind_addr = listener
            .local_addr()
            .expect("mock telegram listener local address should exist");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("mock telegram server should run");
        });

        Self {
            base_url: format!("http://{bind_addr}"),
            state,
            handle,
        }
    }
}

impl Drop for MockTelegramServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_method(
    State(state): State<MockTelegramState>,
    Path(method): Path<String>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state
        .calls
        .lock()
        .await
        .push((method.clone(), payload));
    if method == "sendMessage" {
        state.message_sent.notify_waiters();
    }

    let queued = state
        .replies
        .lock()
        .await
        .get_mut(&method)
        .and_then(VecDeque::pop_front);

    let reply = match queued {
        Some(reply) => reply,
        None if method == "getUpdates" => {
            // Idle long poll: hold briefly so the loop does not spin.
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            MockReply::ok(json!([]))
        }
        None => MockReply::ok(json!(true)),
    };

    (reply.status, Json(reply.body))
}
