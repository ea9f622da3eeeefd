use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use crate::models::ChatId;

pub type MessengerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub action: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Persistent buttons that send their label as a text message.
    Reply(Vec<Vec<String>>),
    /// Buttons attached to one message that report `action` back as a callback.
    Inline(Vec<Vec<InlineButton>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message {
        chat_id: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Document {
        chat_id: ChatId,
        file_name: String,
        contents: Vec<u8>,
    },
    CallbackAnswer {
        callback_id: String,
        text: Option<String>,
    },
}

impl Outbound {
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self::Message {
            chat_id,
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(chat_id: ChatId, text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::Message {
            chat_id,
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Document { .. } => "document",
            Self::CallbackAnswer { .. } => "callback_answer",
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transient delivery failure: {0}")]
    Transient(String),
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

/// Chat transport seam. Implementations need not be safe for concurrent use;
/// every call is made through an [`OutboundGate`].
pub trait Messenger: Send + Sync {
    fn deliver<'a>(&'a self, outbound: Outbound) -> MessengerFuture<'a>;
}

/// Serializes every send onto one transport.
pub struct OutboundGate<M> {
    messenger: Arc<Mutex<M>>,
}

impl<M> Clone for OutboundGate<M> {
    fn clone(&self) -> Self {
        Self {
            messenger: Arc::clone(&self.messenger),
        }
    }
}

impl<M> OutboundGate<M>
where
    M: Messenger + 'static,
{
    pub fn new(messenger: M) -> Self {
        Self {
            messenger: Arc::new(Mutex::new(messenger)),
        }
    }

    /// Delivers `outbound`, logging and dropping failures.
    pub async fn send(&self, outbound: Outbound) {
        let kind = outbound.kind();
        let messenger = self.messenger.lock().await;
        if let Err(err) = messenger.deliver(outbound).await {
            warn!(kind, "outbound delivery failed: {err}");
        }
    }

    pub async fn send_all(&self, outbound: Vec<Outbound>) {
        for item in outbound {
            self.send(item).await;
        }
    }
}
