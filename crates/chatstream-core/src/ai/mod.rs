//! Assistant service transport
//!
//! Request shapes, the HTTP client, and document uploads.

mod client;
mod document;
mod error;
mod request;

pub use client::{AssistantClient, ByteStream, ChatTransport};
pub use document::{DocumentInfo, DocumentKind};
pub use error::{parse_error_message, ApiError};
pub use request::{ChatReply, ChatRequest, RequestMode};
