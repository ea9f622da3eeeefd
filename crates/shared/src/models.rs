use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type ChatId = i64;

/// Full chat mapping, serialized as one JSON object keyed by the decimal chat id.
pub type Snapshot = BTreeMap<ChatId, ChatRecord>;

const DISABLED_HOURS: i64 = 0;
const AWAITING_INPUT_HOURS: i64 = -1;

/// Reminder configuration of a chat.
///
/// Persisted as the integer `reminder_hours`: `0` disabled, `-1` waiting for the
/// user to type an interval, any positive value the interval in hours. Other
/// negatives read as disabled and oversized intervals saturate at `u32::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ReminderSetting {
    #[default]
    Disabled,
    AwaitingInput,
    Every(u32),
}

impl ReminderSetting {
    pub fn interval_hours(self) -> Option<u32> {
        match self {
            Self::Every(hours) => Some(hours),
            Self::Disabled | Self::AwaitingInput => None,
        }
    }

    pub fn is_awaiting_input(self) -> bool {
        matches!(self, Self::AwaitingInput)
    }
}

impl From<i64> for ReminderSetting {
    fn from(value: i64) -> Self {
        match value {
            AWAITING_INPUT_HOURS => Self::AwaitingInput,
            hours if hours <= DISABLED_HOURS => Self::Disabled,
            hours => Self::Every(u32::try_from(hours).unwrap_or(u32::MAX)),
        }
    }
}

impl From<ReminderSetting> for i64 {
    fn from(value: ReminderSetting) -> Self {
        match value {
            ReminderSetting::Disabled => DISABLED_HOURS,
            ReminderSetting::AwaitingInput => AWAITING_INPUT_HOURS,
            ReminderSetting::Every(hours) => i64::from(hours),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    #[serde(rename = "vkids", default)]
    pub events: Vec<String>,
    #[serde(rename = "reminder_hours", default)]
    pub reminder: ReminderSetting,
}
