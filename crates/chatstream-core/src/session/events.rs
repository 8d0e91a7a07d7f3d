//! Session lifecycle signals

use serde::Serialize;

use crate::transcript::MessageId;

/// Events published while exchanges run.
///
/// Per exchange: one `ExchangeStarted`, zero or more `Fragment`s, then exactly
/// one of `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionEvent {
    /// User message and placeholder appended, request about to be issued
    ExchangeStarted {
        user_id: MessageId,
        assistant_id: MessageId,
    },
    /// Fragment appended to the placeholder
    Fragment { message_id: MessageId, text: String },
    /// Stream ended cleanly
    Completed { message_id: MessageId },
    /// Transport failure or non-success response
    Failed { message_id: MessageId, error: String },
    /// Transcript cleared
    Cleared,
}

/// Terminal result of one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed,
    Failed(String),
}
