//! Transcript message types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::id::MessageId;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

/// One transcript entry.
///
/// `sender`, `id` and `created_at` never change. Text grows only through
/// [`Transcript::append`](super::Transcript::append).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: MessageId,
    text: String,
    sender: Sender,
    created_at: DateTime<Local>,
}

impl Message {
    pub(super) fn new(id: MessageId, sender: Sender, text: String) -> Self {
        Self {
            id,
            text,
            sender,
            created_at: Local::now(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    /// Hour and minute, as shown next to a message
    pub fn display_time(&self) -> String {
        self.created_at.format("%H:%M").to_string()
    }

    pub(super) fn push_text(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }
}
