//! Outbound request shapes

use serde::Deserialize;
use serde_json::Value;

/// How the assistant should answer a message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Message only
    #[default]
    Plain,
    /// Message plus attached context text
    ContextAttached(String),
    /// Retrieval over uploaded documents, optionally filtered to one source file
    RetrievalAugmented(Option<String>),
}

/// A message bound to its request mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub mode: RequestMode,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, mode: RequestMode) -> Self {
        // Blank context is ignored by the service, so send it as plain
        let mode = match mode {
            RequestMode::ContextAttached(context) if context.trim().is_empty() => {
                RequestMode::Plain
            }
            other => other,
        };
        Self {
            message: message.into(),
            mode,
        }
    }

    /// Path relative to the API base URL
    pub fn endpoint(&self, streaming: bool) -> &'static str {
        match (&self.mode, streaming) {
            (RequestMode::RetrievalAugmented(_), true) => "/chat/rag/stream",
            (RequestMode::RetrievalAugmented(_), false) => "/chat/rag",
            (_, true) => "/chat/message/stream",
            (_, false) => "/chat/message",
        }
    }

    /// JSON request body
    pub fn body(&self) -> Value {
        match &self.mode {
            RequestMode::Plain => serde_json::json!({
                "message": self.message,
            }),
            RequestMode::ContextAttached(context) => serde_json::json!({
                "message": self.message,
                "context": context,
            }),
            RequestMode::RetrievalAugmented(source_file) => serde_json::json!({
                "message": self.message,
                "sourceFile": source_file,
            }),
        }
    }
}

/// Non-streaming reply
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub context_used: bool,
}
