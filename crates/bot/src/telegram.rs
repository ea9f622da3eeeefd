use std::time::Duration;

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::ChatId;
use shared::outbound::{
    DeliveryError, InlineButton, Keyboard, Messenger, MessengerFuture, Outbound,
};
use shared::tracker::Inbound;
use thiserror::Error;

const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];
const REQUEST_GRACE_SECONDS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
}

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Network(reqwest::Error),
    #[error("telegram responded with status {status}: {description}")]
    Http {
        status: StatusCode,
        description: String,
    },
    #[error("telegram rejected {method}: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
    #[error("telegram returned an invalid payload: {0}")]
    Decode(String),
}

impl TelegramError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Network(_) => FailureClass::Transient,
            Self::Http { status, .. } => classify_http_failure(*status),
            Self::Api { .. } | Self::Decode(_) => FailureClass::Permanent,
        }
    }

    fn into_delivery_error(self) -> DeliveryError {
        match self.class() {
            FailureClass::Transient => DeliveryError::Transient(self.to_string()),
            FailureClass::Permanent => DeliveryError::Permanent(self.to_string()),
        }
    }
}

// Request URLs embed the bot token, so it is stripped before the error is logged.
fn network_error(err: reqwest::Error) -> TelegramError {
    TelegramError::Network(err.without_url())
}

fn classify_http_failure(status: StatusCode) -> FailureClass {
    match status.as_u16() {
        408 | 425 | 429 | 500 | 502 | 503 | 504 => FailureClass::Transient,
        _ => FailureClass::Permanent,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

impl Update {
    /// Text messages and callback queries tied to a chat; everything else is `None`.
    pub fn into_inbound(self) -> Option<Inbound> {
        if let Some(query) = self.callback_query {
            let chat_id = query.message?.chat.id;
            return Some(Inbound::Action {
                chat_id,
                callback_id: query.id,
                data: query.data.unwrap_or_default(),
            });
        }

        let message = self.message?;
        Some(Inbound::Text {
            chat_id: message.chat.id,
            text: message.text?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ReplyMarkup<'a> {
    Keyboard {
        keyboard: Vec<Vec<KeyboardButton<'a>>>,
        resize_keyboard: bool,
    },
    Inline {
        inline_keyboard: Vec<Vec<InlineKeyboardButton<'a>>>,
    },
}

#[derive(Debug, Serialize)]
struct KeyboardButton<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQueryRequest<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

impl<'a> ReplyMarkup<'a> {
    fn from_keyboard(keyboard: &'a Keyboard) -> Self {
        match keyboard {
            Keyboard::Reply(rows) => Self::Keyboard {
                keyboard: rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|label| KeyboardButton { text: label })
                            .collect()
                    })
                    .collect(),
                resize_keyboard: true,
            },
            Keyboard::Inline(rows) => Self::Inline {
                inline_keyboard: rows
                    .iter()
                    .map(|row| row.iter().map(InlineKeyboardButton::from).collect())
                    .collect(),
            },
        }
    }
}

impl<'a> From<&'a InlineButton> for InlineKeyboardButton<'a> {
    fn from(button: &'a InlineButton) -> Self {
        Self {
            text: &button.label,
            callback_data: &button.action,
        }
    }
}

/// Bot API client over long polling.
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    poll_timeout_seconds: u64,
}

impl TelegramClient {
    pub fn new(
        api_url: &str,
        token: &str,
        poll_timeout_seconds: u64,
    ) -> Result<Self, TelegramError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                poll_timeout_seconds.saturating_add(REQUEST_GRACE_SECONDS),
            ))
            .build()
            .map_err(network_error)?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            poll_timeout_seconds,
        })
    }

    pub async fn get_me(&self) -> Result<BotUser, TelegramError> {
        self.call_json("getMe", &serde_json::json!({})).await
    }

    /// Long polls for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout_seconds,
            allowed_updates: &ALLOWED_UPDATES,
        };
        self.call_json("getUpdates", &request).await
    }

    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TelegramError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            reply_markup: keyboard.map(ReplyMarkup::from_keyboard),
        };
        let _: Value = self.call_json("sendMessage", &request).await?;
        Ok(())
    }

    pub async fn send_document(
        &self,
        chat_id: ChatId,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<(), TelegramError> {
        let form = Form::new().text("chat_id", chat_id.to_string()).part(
            "document",
            Part::bytes(contents).file_name(file_name.to_string()),
        );

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;
        let _: Value = decode_response("sendDocument", response).await?;
        Ok(())
    }

    pub async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        let request = AnswerCallbackQueryRequest {
            callback_query_id: callback_id,
            text,
        };
        let _: bool = self.call_json("answerCallbackQuery", &request).await?;
        Ok(())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call_json<B, T>(&self, method: &'static str, body: &B) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(network_error)?;
        decode_response(method, response).await
    }
}

async fn decode_response<T>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T, TelegramError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let body = response.text().await.map_err(network_error)?;

    let parsed = match serde_json::from_str::<ApiResponse<T>>(&body) {
        Ok(parsed) => parsed,
        Err(_) if !status.is_success() => {
            return Err(TelegramError::Http {
                status,
                description: body,
            });
        }
        Err(err) => return Err(TelegramError::Decode(format!("{method}: {err}"))),
    };

    if !parsed.ok {
        let description = parsed
            .description
            .unwrap_or_else(|| "no description".to_string());
        return if status.is_success() {
            Err(TelegramError::Api {
                method,
                description,
            })
        } else {
            Err(TelegramError::Http {
                status,
                description,
            })
        };
    }

    parsed
        .result
        .ok_or_else(|| TelegramError::Decode(format!("{method}: missing result")))
}

impl Messenger for TelegramClient {
    fn deliver<'a>(&'a self, outbound: Outbound) -> MessengerFuture<'a> {
        Box::pin(async move {
            let result = match outbound {
                Outbound::Message {
                    chat_id,
                    text,
                    keyboard,
                } => self.send_message(chat_id, &text, keyboard.as_ref()).await,
                Outbound::Document {
                    chat_id,
                    file_name,
                    contents,
                } => self.send_document(chat_id, &file_name, contents).await,
                Outbound::CallbackAnswer { callback_id, text } => {
                    self.answer_callback_query(&callback_id, text.as_deref()).await
                }
            };

            result.map_err(TelegramError::into_delivery_error)
        })
    }
}
