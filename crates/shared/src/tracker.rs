use std::fs;
use std::io;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::elapsed::since_last;
use crate::models::{ChatId, ReminderSetting};
use crate::outbound::{InlineButton, Keyboard, Messenger, Outbound, OutboundGate};
use crate::reminder::ReminderScheduler;
use crate::store::EventStore;
use crate::timestamp::format_token;

pub const RECORD_LABEL: &str = "record";
pub const ELAPSED_LABEL: &str = "elapsed";
pub const MENU_LABEL: &str = "Menu";
pub const SET_REMINDER_ACTION: &str = "set_reminder";
pub const DELETE_LAST_ACTION: &str = "delete_last";

const DEFAULT_EXPORT_FILE_NAME: &str = "vkids.json";

/// An update from the chat transport, already reduced to what the tracker reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text {
        chat_id: ChatId,
        text: String,
    },
    Action {
        chat_id: ChatId,
        callback_id: String,
        data: String,
    },
}

impl Inbound {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Text { chat_id, .. } | Self::Action { chat_id, .. } => *chat_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command<'a> {
    Start,
    Record,
    Elapsed,
    Export,
    Menu,
    FreeText(&'a str),
}

impl<'a> Command<'a> {
    fn parse(text: &'a str) -> Self {
        // Group chats address commands as `/start@bot_name`.
        let command = match text.strip_prefix('/') {
            Some(rest) => rest.split_once('@').map_or(rest, |(name, _)| name),
            None => return Self::from_label(text),
        };

        match command {
            "start" => Self::Start,
            "record" => Self::Record,
            "elapsed" => Self::Elapsed,
            "file" => Self::Export,
            "menu" => Self::Menu,
            _ => Self::FreeText(text),
        }
    }

    fn from_label(text: &'a str) -> Self {
        match text {
            RECORD_LABEL => Self::Record,
            ELAPSED_LABEL => Self::Elapsed,
            MENU_LABEL => Self::Menu,
            _ => Self::FreeText(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    SetReminder,
    DeleteLast,
}

impl MenuAction {
    fn from_data(data: &str) -> Option<Self> {
        match data {
            SET_REMINDER_ACTION => Some(Self::SetReminder),
            DELETE_LAST_ACTION => Some(Self::DeleteLast),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalInputError {
    #[error("'{0}' is not a whole number")]
    NotANumber(String),
    #[error("interval must be greater than 0")]
    NotPositive,
    #[error("interval of {0} hours is too large")]
    TooLarge(i64),
}

pub fn parse_interval_hours(text: &str) -> Result<u32, IntervalInputError> {
    let trimmed = text.trim();
    let hours = trimmed
        .parse::<i64>()
        .map_err(|_| IntervalInputError::NotANumber(trimmed.to_string()))?;
    if hours <= 0 {
        return Err(IntervalInputError::NotPositive);
    }

    u32::try_from(hours).map_err(|_| IntervalInputError::TooLarge(hours))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderRequest {
    pub chat_id: ChatId,
    pub hours: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    pub replies: Vec<Outbound>,
    pub reminder: Option<ReminderRequest>,
}

impl Dispatch {
    fn reply(outbound: Outbound) -> Self {
        Self {
            replies: vec![outbound],
            reminder: None,
        }
    }
}

pub fn reminder_text(hours: u32) -> String {
    format!("{hours} hours have passed since your last record!")
}

pub struct Tracker<M> {
    store: Arc<EventStore>,
    gate: OutboundGate<M>,
    scheduler: ReminderScheduler,
    offset: FixedOffset,
}

impl<M> Tracker<M>
where
    M: Messenger + 'static,
{
    pub fn new(
        store: Arc<EventStore>,
        gate: OutboundGate<M>,
        scheduler: ReminderScheduler,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            gate,
            scheduler,
            offset,
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Handles one inbound update at the current time: replies go out through
    /// the gate and a reminder is armed when the chat has an interval set.
    pub async fn process(&self, inbound: Inbound) -> Option<JoinHandle<()>> {
        let dispatch = self.dispatch(inbound, Utc::now());
        self.gate.send_all(dispatch.replies).await;
        dispatch.reminder.map(|request| self.arm(request))
    }

    /// Applies `inbound` to the store as of `now` and returns what should be
    /// sent back, without sending anything.
    pub fn dispatch(&self, inbound: Inbound, now: DateTime<Utc>) -> Dispatch {
        match inbound {
            Inbound::Text { chat_id, text } => self.handle_text(chat_id, text.trim(), now),
            Inbound::Action {
                chat_id,
                callback_id,
                data,
            } => self.handle_action(chat_id, callback_id, &data),
        }
    }

    pub fn arm(&self, request: ReminderRequest) -> JoinHandle<()> {
        let gate = self.gate.clone();
        self.scheduler
            .arm(request.chat_id, request.hours, move |chat_id, hours| async move {
                gate.send(Outbound::text(chat_id, reminder_text(hours))).await;
            })
    }

    fn handle_text(&self, chat_id: ChatId, text: &str, now: DateTime<Utc>) -> Dispatch {
        let record = self.store.get_or_create(chat_id);

        match Command::parse(text) {
            Command::Start => Dispatch::reply(Outbound::with_keyboard(
                chat_id,
                "Ready to track your records!",
                main_keyboard(),
            )),
            Command::Record => {
                let token = format_token(now, self.offset);
                self.store.append_event(chat_id, token.clone());
                info!(chat_id, token = %token, "event recorded");

                Dispatch {
                    replies: vec![Outbound::text(chat_id, format!("Recorded: {token}"))],
                    reminder: record
                        .reminder
                        .interval_hours()
                        .map(|hours| ReminderRequest { chat_id, hours }),
                }
            }
            Command::Elapsed => {
                let report = since_last(&record.events, now, self.offset);
                Dispatch::reply(Outbound::text(chat_id, format!("Elapsed: {report}")))
            }
            Command::Export => Dispatch::reply(self.export(chat_id)),
            Command::Menu => Dispatch::reply(Outbound::with_keyboard(
                chat_id,
                "Settings:",
                menu_keyboard(),
            )),
            Command::FreeText(reply) if record.reminder.is_awaiting_input() => {
                match parse_interval_hours(reply) {
                    Ok(hours) => {
                        self.store.set_reminder(chat_id, ReminderSetting::Every(hours));
                        info!(chat_id, hours, "reminder interval set");
                        Dispatch::reply(Outbound::text(
                            chat_id,
                            format!("Reminders every {hours} h."),
                        ))
                    }
                    Err(err) => {
                        debug!(chat_id, "rejected reminder interval: {err}");
                        Dispatch::reply(Outbound::text(
                            chat_id,
                            "Enter a whole number greater than 0.",
                        ))
                    }
                }
            }
            Command::FreeText(_) => Dispatch::default(),
        }
    }

    fn handle_action(&self, chat_id: ChatId, callback_id: String, data: &str) -> Dispatch {
        self.store.get_or_create(chat_id);

        match MenuAction::from_data(data) {
            Some(MenuAction::SetReminder) => {
                self.store.set_reminder(chat_id, ReminderSetting::AwaitingInput);
                Dispatch {
                    replies: vec![
                        Outbound::CallbackAnswer {
                            callback_id,
                            text: None,
                        },
                        Outbound::text(chat_id, "Enter the reminder interval in hours:"),
                    ],
                    reminder: None,
                }
            }
            Some(MenuAction::DeleteLast) => {
                let text = if self.store.delete_last_event(chat_id) {
                    "Deleted"
                } else {
                    "No records"
                };
                Dispatch::reply(Outbound::CallbackAnswer {
                    callback_id,
                    text: Some(text.to_string()),
                })
            }
            None => {
                debug!(chat_id, data, "ignoring unknown callback action");
                Dispatch::reply(Outbound::CallbackAnswer {
                    callback_id,
                    text: None,
                })
            }
        }
    }

    fn export(&self, chat_id: ChatId) -> Outbound {
        let path = self.store.path();
        match fs::read(path) {
            Ok(contents) => Outbound::Document {
                chat_id,
                file_name: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| DEFAULT_EXPORT_FILE_NAME.to_string()),
                contents,
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Outbound::text(
                chat_id,
                "Data file is empty so far. Record at least one event.",
            ),
            Err(err) => {
                warn!(chat_id, path = %path.display(), "failed to read data file for export: {err}");
                Outbound::text(chat_id, "Could not read the data file.")
            }
        }
    }
}

fn main_keyboard() -> Keyboard {
    Keyboard::Reply(vec![
        vec![RECORD_LABEL.to_string(), ELAPSED_LABEL.to_string()],
        vec![MENU_LABEL.to_string()],
    ])
}

fn menu_keyboard() -> Keyboard {
    Keyboard::Inline(vec![
        vec![InlineButton::new("Reminder interval", SET_REMINDER_ACTION)],
        vec![InlineButton::new("Delete last record", DELETE_LAST_ACTION)],
    ])
}
