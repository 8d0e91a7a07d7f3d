//! Core library for chatstream
//!
//! Streams assistant replies into an ordered transcript:
//! - `stream`: line-framed decoding of incrementally delivered response bodies
//! - `transcript`: message identity and the ordered message log
//! - `session`: request/response orchestration and lifecycle signals
//! - `ai`: HTTP transport to the assistant service and document uploads
//! - `config`: TOML configuration with environment overrides

pub mod ai;
pub mod config;
pub mod session;
pub mod stream;
pub mod transcript;

pub use ai::{
    ApiError, AssistantClient, ChatReply, ChatRequest, ChatTransport, DocumentInfo, DocumentKind,
    RequestMode,
};
pub use config::ChatConfig;
pub use session::{ChatSession, ExchangeHandle, ExchangeOutcome, SessionEvent, SessionStatus};
pub use stream::{frames, FrameDecoder};
pub use transcript::{Message, MessageId, Sender, Transcript};
