//! Ordered message log
//!
//! Insertion order is display order. Only assistant messages accept appends,
//! and only through their id.

mod id;
mod message;

pub use id::{IdMinter, MessageId};
pub use message::{Message, Sender};

use tracing::{debug, warn};

/// Ordered sequence of messages for one session
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    /// Survives `clear()` so ids stay unique for the whole session
    minter: IdMinter,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new message and return its id
    pub fn push(&mut self, sender: Sender, text: impl Into<String>) -> MessageId {
        let message = Message::new(self.minter.mint(), sender, text.into());
        let id = message.id();
        debug!("Transcript push: id={}, sender={:?}", id, sender);
        self.messages.push(message);
        id
    }

    /// Append a fragment to the assistant message with `id`.
    ///
    /// Returns false when the id is gone (e.g. after `clear()`) or names a
    /// message that does not accept appends; neither case is an error.
    pub fn append(&mut self, id: MessageId, fragment: &str) -> bool {
        // The open placeholder is almost always at the tail
        match self.messages.iter_mut().rev().find(|m| m.id() == id) {
            Some(message) if message.sender() == Sender::Assistant => {
                message.push_text(fragment);
                true
            }
            Some(message) => {
                warn!(
                    "Refusing append to {:?} message {}",
                    message.sender(),
                    id
                );
                false
            }
            None => {
                debug!("Append target {} no longer in transcript, dropping fragment", id);
                false
            }
        }
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.id() == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message. Id issuance continues where it left off.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
