//! Transcript session
//!
//! Drives one request/response exchange at a time from the caller's point of
//! view and keeps the transcript and loading state consistent with it.
//!
//! ```text
//! idle --send--> awaiting-response --(complete | fail)--> idle
//! ```
//!
//! The status stays awaiting while any exchange is still in flight.
//! `clear()` is available in both states and leaves the status alone.

mod events;
mod state;

pub use events::{ExchangeOutcome, SessionEvent};
pub use state::{SessionState, SessionStatus};

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ai::{ApiError, AssistantClient, ChatRequest, ChatTransport, RequestMode};
use crate::config::ChatConfig;
use crate::stream::frames;
use crate::transcript::{Message, MessageId, Sender, Transcript};

/// Prefix for the error annotation appended to a failed placeholder
pub const ERROR_PREFIX: &str = "Errore: ";

#[derive(Debug, Default)]
struct SessionInner {
    transcript: Transcript,
    state: SessionState,
}

/// Owns the transcript and issues exchanges against a transport.
///
/// Cloning shares the same transcript.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Mutex<SessionInner>>,
    transport: Arc<dyn ChatTransport>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    streaming: bool,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner::default())),
            transport,
            events: None,
            streaming: true,
        }
    }

    /// Session backed by the HTTP client described by `config`
    pub fn from_config(config: &ChatConfig) -> Result<Self, ApiError> {
        let client = AssistantClient::new(config)?;
        Ok(Self::new(Arc::new(client)).streaming(config.streaming))
    }

    /// Publish lifecycle events on `tx`
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Use streaming endpoints (default) or wait for whole replies
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Send a user message.
    ///
    /// Blank text is a silent no-op and returns `None`. Otherwise the user
    /// message and an empty assistant placeholder are appended before this
    /// returns; the request itself runs on a spawned task, so this must be
    /// called from within a Tokio runtime.
    pub fn send(&self, text: &str, mode: RequestMode) -> Option<ExchangeHandle> {
        if text.trim().is_empty() {
            debug!("Ignoring blank message");
            return None;
        }

        // Events go out under the lock so their order matches the transcript
        let (user_id, assistant_id) = {
            let mut inner = self.inner.lock();
            inner.state.begin();
            let user_id = inner.transcript.push(Sender::User, text);
            let assistant_id = inner.transcript.push(Sender::Assistant, "");
            self.emit(SessionEvent::ExchangeStarted {
                user_id,
                assistant_id,
            });
            (user_id, assistant_id)
        };
        info!(
            user_id = %user_id,
            assistant_id = %assistant_id,
            streaming = self.streaming,
            "Exchange started"
        );

        let exchange = Exchange {
            inner: Arc::clone(&self.inner),
            events: self.events.clone(),
            placeholder: assistant_id,
        };
        let transport = Arc::clone(&self.transport);
        let request = ChatRequest::new(text, mode);
        let streaming = self.streaming;

        let task = tokio::spawn(async move {
            if streaming {
                exchange.run_streaming(transport.as_ref(), &request).await
            } else {
                exchange.run_whole(transport.as_ref(), &request).await
            }
        });

        Some(ExchangeHandle {
            user_id,
            assistant_id,
            task,
        })
    }

    /// Empty the transcript and forget the last error.
    ///
    /// In-flight exchanges keep running; their appends find no target and
    /// are dropped.
    pub fn clear(&self) {
        {
            let mut inner = self.inner.lock();
            inner.transcript.clear();
            inner.state.last_error = None;
            self.emit(SessionEvent::Cleared);
        }
        info!("Transcript cleared");
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock().state.status()
    }

    pub fn is_awaiting(&self) -> bool {
        self.inner.lock().state.is_awaiting()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().state.last_error.clone()
    }

    /// Snapshot of the transcript in display order
    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().transcript.messages().to_vec()
    }

    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.inner.lock().transcript.get(id).cloned()
    }

    /// Read the transcript without cloning it
    pub fn with_transcript<R>(&self, f: impl FnOnce(&Transcript) -> R) -> R {
        f(&self.inner.lock().transcript)
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Handle to one running exchange
#[derive(Debug)]
pub struct ExchangeHandle {
    user_id: MessageId,
    assistant_id: MessageId,
    task: JoinHandle<ExchangeOutcome>,
}

impl ExchangeHandle {
    pub fn user_id(&self) -> MessageId {
        self.user_id
    }

    /// Id of the placeholder the reply streams into
    pub fn assistant_id(&self) -> MessageId {
        self.assistant_id
    }

    /// Wait for the terminal event
    pub async fn finished(self) -> ExchangeOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => ExchangeOutcome::Failed(e.to_string()),
        }
    }
}

/// State one exchange task needs. Never holds the lock across an await.
struct Exchange {
    inner: Arc<Mutex<SessionInner>>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    placeholder: MessageId,
}

impl Exchange {
    async fn run_streaming(
        &self,
        transport: &dyn ChatTransport,
        request: &ChatRequest,
    ) -> ExchangeOutcome {
        let body = match transport.open_stream(request).await {
            Ok(body) => body,
            Err(e) => return self.fail(e),
        };

        let mut fragments = Box::pin(frames(body));
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) => self.apply(text),
                Err(e) => return self.fail(e),
            }
        }
        self.complete()
    }

    async fn run_whole(
        &self,
        transport: &dyn ChatTransport,
        request: &ChatRequest,
    ) -> ExchangeOutcome {
        match transport.send(request).await {
            Ok(reply) => {
                // The whole answer lands in a single mutation
                self.apply(reply.response);
                self.complete()
            }
            Err(e) => self.fail(e),
        }
    }

    fn apply(&self, text: String) {
        let mut inner = self.inner.lock();
        let applied = inner.transcript.append(self.placeholder, &text);
        if applied && !text.is_empty() {
            self.emit(SessionEvent::Fragment {
                message_id: self.placeholder,
                text,
            });
        }
    }

    fn complete(&self) -> ExchangeOutcome {
        let length = {
            let mut inner = self.inner.lock();
            inner.state.finish();
            let length = inner
                .transcript
                .get(self.placeholder)
                .map(|m| m.text().len());
            self.emit(SessionEvent::Completed {
                message_id: self.placeholder,
            });
            length
        };
        match length {
            Some(length) => info!(message_id = %self.placeholder, length, "Exchange completed"),
            None => debug!(message_id = %self.placeholder, "Exchange completed after clear"),
        }
        ExchangeOutcome::Completed
    }

    fn fail(&self, error: ApiError) -> ExchangeOutcome {
        let message = error.to_string();
        warn!(message_id = %self.placeholder, error = %message, "Exchange failed");
        {
            let mut inner = self.inner.lock();
            inner.state.fail(message.clone());
            inner
                .transcript
                .append(self.placeholder, &format!("{ERROR_PREFIX}{message}"));
            self.emit(SessionEvent::Failed {
                message_id: self.placeholder,
                error: message.clone(),
            });
        }
        ExchangeOutcome::Failed(message)
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ByteStream, ChatReply};
    use async_trait::async_trait;
    use bytes::Bytes;

    enum Script {
        /// Body delivered from a fixed list of chunks
        Chunks(Vec<Result<&'static str, &'static str>>),
        /// Body fed by the test through a channel
        Live(mpsc::UnboundedReceiver<Result<Bytes, ApiError>>),
        /// Request rejected before any body
        Reject(ApiError),
        /// Non-streaming reply
        Whole(&'static str),
    }

    struct ScriptedTransport {
        scripts: Mutex<Vec<Script>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn next_script(&self, request: &ChatRequest) -> Script {
            self.requests.lock().push(request.clone());
            let mut scripts = self.scripts.lock();
            assert!(!scripts.is_empty(), "no script left for {:?}", request);
            scripts.remove(0)
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ApiError> {
            match self.next_script(request) {
                Script::Chunks(chunks) => {
                    let items: Vec<Result<Bytes, ApiError>> = chunks
                        .into_iter()
                        .map(|chunk| match chunk {
                            Ok(text) => Ok(Bytes::from_static(text.as_bytes())),
                            Err(e) => Err(ApiError::Connection(e.to_string())),
                        })
                        .collect();
                    Ok(futures::stream::iter(items).boxed())
                }
                Script::Live(rx) => Ok(futures::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed()),
                Script::Reject(e) => Err(e),
                Script::Whole(_) => panic!("streaming request against a whole-reply script"),
            }
        }

        async fn send(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
            match self.next_script(request) {
                Script::Whole(text) => Ok(ChatReply {
                    response: text.to_string(),
                    context_used: false,
                }),
                Script::Reject(e) => Err(e),
                _ => panic!("whole-reply request against a streaming script"),
            }
        }
    }

    fn texts(session: &ChatSession) -> Vec<(Sender, String)> {
        session
            .messages()
            .iter()
            .map(|m| (m.sender(), m.text().to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_streamed_reply_accumulates() {
        let transport = ScriptedTransport::new(vec![Script::Chunks(vec![
            Ok("data:Cia\n"),
            Ok("data:o a te\n"),
        ])]);
        let session = ChatSession::new(transport);

        let handle = session.send("Ciao", RequestMode::Plain).unwrap();
        assert_eq!(handle.finished().await, ExchangeOutcome::Completed);

        assert_eq!(
            texts(&session),
            vec![
                (Sender::User, "Ciao".to_string()),
                (Sender::Assistant, "Ciao a te".to_string()),
            ]
        );
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(session.last_error(), None);
    }

    #[tokio::test]
    async fn test_failure_annotates_placeholder() {
        let transport =
            ScriptedTransport::new(vec![Script::Chunks(vec![Err("connessione rifiutata")])]);
        let session = ChatSession::new(transport);

        let handle = session.send("x", RequestMode::Plain).unwrap();
        assert_eq!(
            handle.finished().await,
            ExchangeOutcome::Failed("connessione rifiutata".to_string())
        );

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender(), Sender::Assistant);
        assert_eq!(messages[1].text(), "Errore: connessione rifiutata");
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(
            session.last_error().as_deref(),
            Some("connessione rifiutata")
        );
    }

    #[tokio::test]
    async fn test_error_status_before_stream() {
        let transport = ScriptedTransport::new(vec![Script::Reject(ApiError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            message: "Runtime error".to_string(),
        })]);
        let session = ChatSession::new(transport);

        session
            .send("x", RequestMode::Plain)
            .unwrap()
            .finished()
            .await;

        assert_eq!(session.messages()[1].text(), "Errore: Runtime error");
        assert_eq!(session.last_error().as_deref(), Some("Runtime error"));
    }

    #[tokio::test]
    async fn test_failure_mid_stream_keeps_received_text() {
        let transport = ScriptedTransport::new(vec![Script::Chunks(vec![
            Ok("data:parz"),
            Ok("iale\n"),
            Err("reset"),
        ])]);
        let session = ChatSession::new(transport);

        session
            .send("x", RequestMode::Plain)
            .unwrap()
            .finished()
            .await;

        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].text(), "parzialeErrore: reset");
    }

    #[tokio::test]
    async fn test_blank_message_is_noop() {
        let transport = ScriptedTransport::new(vec![]);
        let session = ChatSession::new(transport.clone());

        assert!(session.send("", RequestMode::Plain).is_none());
        assert!(session.send("  \t\n", RequestMode::Plain).is_none());

        assert!(session.messages().is_empty());
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(transport.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_send_appends_two_entries_synchronously() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let transport = ScriptedTransport::new(vec![Script::Live(rx)]);
        let session = ChatSession::new(transport);

        let handle = session.send("domanda", RequestMode::Plain).unwrap();

        // Current-thread runtime: the exchange task has not run yet
        assert_eq!(
            texts(&session),
            vec![
                (Sender::User, "domanda".to_string()),
                (Sender::Assistant, String::new()),
            ]
        );
        assert_eq!(session.status(), SessionStatus::AwaitingResponse);
        assert_ne!(handle.user_id(), handle.assistant_id());
    }

    #[tokio::test]
    async fn test_no_fragments_leaves_empty_reply() {
        let transport = ScriptedTransport::new(vec![Script::Chunks(vec![
            Ok(": keep-alive\n"),
            Ok("data:unterminated"),
        ])]);
        let session = ChatSession::new(transport);

        let outcome = session
            .send("x", RequestMode::Plain)
            .unwrap()
            .finished()
            .await;

        assert_eq!(outcome, ExchangeOutcome::Completed);
        assert_eq!(session.messages()[1].text(), "");
        assert_eq!(session.last_error(), None);
    }

    #[tokio::test]
    async fn test_clear_during_stream_drops_late_fragments() {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = ScriptedTransport::new(vec![Script::Live(rx)]);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(transport).with_events(events_tx);

        let handle = session.send("x", RequestMode::Plain).unwrap();
        tx.send(Ok(Bytes::from_static(b"data:early\n"))).unwrap();
        tokio::task::yield_now().await;

        session.clear();
        assert!(session.messages().is_empty());
        assert_eq!(session.status(), SessionStatus::AwaitingResponse);

        tx.send(Ok(Bytes::from_static(b"data:late\n"))).unwrap();
        drop(tx);

        assert_eq!(handle.finished().await, ExchangeOutcome::Completed);
        assert!(session.messages().is_empty());
        assert_eq!(session.last_error(), None);
        assert_eq!(session.status(), SessionStatus::Idle);

        let mut late_fragments = 0;
        while let Ok(event) = events_rx.try_recv() {
            if let SessionEvent::Fragment { text, .. } = event {
                assert_ne!(text, "late");
                late_fragments += 1;
            }
        }
        assert!(late_fragments <= 1);
    }

    #[tokio::test]
    async fn test_event_sequence() {
        let transport = ScriptedTransport::new(vec![Script::Chunks(vec![Ok(
            "data:A\ndata:B\ndata:C\n",
        )])]);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(transport).with_events(events_tx);

        let handle = session.send("q", RequestMode::Plain).unwrap();
        let (user_id, assistant_id) = (handle.user_id(), handle.assistant_id());
        handle.finished().await;

        let mut events = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            events.push(event);
        }
        let fragment = |text: &str| SessionEvent::Fragment {
            message_id: assistant_id,
            text: text.to_string(),
        };
        assert_eq!(
            events,
            vec![
                SessionEvent::ExchangeStarted {
                    user_id,
                    assistant_id
                },
                fragment("A"),
                fragment("B"),
                fragment("C"),
                SessionEvent::Completed {
                    message_id: assistant_id
                },
            ]
        );
        assert_eq!(session.messages()[1].text(), "ABC");
    }

    #[tokio::test]
    async fn test_whole_reply_in_one_mutation() {
        let transport = ScriptedTransport::new(vec![Script::Whole("Risposta completa")]);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(transport.clone())
            .streaming(false)
            .with_events(events_tx);

        let handle = session
            .send("q", RequestMode::ContextAttached("contesto".into()))
            .unwrap();
        assert_eq!(handle.finished().await, ExchangeOutcome::Completed);

        assert_eq!(session.messages()[1].text(), "Risposta completa");
        let fragments = std::iter::from_fn(|| events_rx.try_recv().ok())
            .filter(|e| matches!(e, SessionEvent::Fragment { .. }))
            .count();
        assert_eq!(fragments, 1);
        assert_eq!(
            transport.requests.lock()[0].mode,
            RequestMode::ContextAttached("contesto".into())
        );
    }

    #[tokio::test]
    async fn test_mode_reaches_transport() {
        let transport = ScriptedTransport::new(vec![Script::Chunks(vec![Ok("data:ok\n")])]);
        let session = ChatSession::new(transport.clone());

        session
            .send(
                "riassumi",
                RequestMode::RetrievalAugmented(Some("report.pdf".into())),
            )
            .unwrap()
            .finished()
            .await;

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "riassumi");
        assert_eq!(requests[0].endpoint(true), "/chat/rag/stream");
    }

    #[tokio::test]
    async fn test_concurrent_exchanges_touch_disjoint_placeholders() {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let transport = ScriptedTransport::new(vec![Script::Live(rx_a), Script::Live(rx_b)]);
        let session = ChatSession::new(transport);

        let first = session.send("uno", RequestMode::Plain).unwrap();
        let second = session.send("due", RequestMode::Plain).unwrap();
        assert_ne!(first.assistant_id(), second.assistant_id());
        let (first_id, second_id) = (first.assistant_id(), second.assistant_id());

        tx_b.send(Ok(Bytes::from_static(b"data:B1\n"))).unwrap();
        tx_a.send(Ok(Bytes::from_static(b"data:A1\n"))).unwrap();
        tx_b.send(Ok(Bytes::from_static(b"data:B2\n"))).unwrap();
        drop(tx_a);

        first.finished().await;
        // The second exchange is still streaming
        assert_eq!(session.status(), SessionStatus::AwaitingResponse);

        drop(tx_b);
        second.finished().await;
        assert_eq!(session.status(), SessionStatus::Idle);

        assert_eq!(session.message(first_id).unwrap().text(), "A1");
        assert_eq!(session.message(second_id).unwrap().text(), "B1B2");
        let senders: Vec<Sender> = session.messages().iter().map(|m| m.sender()).collect();
        assert_eq!(
            senders,
            vec![
                Sender::User,
                Sender::Assistant,
                Sender::User,
                Sender::Assistant
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_after_clear_records_error_only() {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = ScriptedTransport::new(vec![Script::Live(rx)]);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(transport).with_events(events_tx);

        let handle = session.send("x", RequestMode::Plain).unwrap();
        session.clear();
        tx.send(Err(ApiError::Connection("timeout".to_string())))
            .unwrap();

        assert_eq!(
            handle.finished().await,
            ExchangeOutcome::Failed("timeout".to_string())
        );
        assert!(session.messages().is_empty());
        assert_eq!(session.last_error().as_deref(), Some("timeout"));
        assert_eq!(session.status(), SessionStatus::Idle);

        let failed = std::iter::from_fn(|| events_rx.try_recv().ok())
            .filter(|e| matches!(e, SessionEvent::Failed { .. }))
            .count();
        assert_eq!(failed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_fragment_event_after_cleared() {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = ScriptedTransport::new(vec![Script::Live(rx)]);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(transport).with_events(events_tx);

        let handle = session.send("x", RequestMode::Plain).unwrap();
        let (close_tx, close_rx) = tokio::sync::oneshot::channel::<()>();
        let feeder = tokio::spawn(async move {
            for i in 0..500 {
                if tx.send(Ok(Bytes::from(format!("data:{i} \n")))).is_err() {
                    break;
                }
                tokio::task::yield_now().await;
            }
            // Body stays open until the clear has happened
            let _ = close_rx.await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        session.clear();
        close_tx.send(()).unwrap();
        feeder.await.unwrap();
        assert_eq!(handle.finished().await, ExchangeOutcome::Completed);

        let events: Vec<SessionEvent> = std::iter::from_fn(|| events_rx.try_recv().ok()).collect();
        let cleared_at = events
            .iter()
            .position(|e| *e == SessionEvent::Cleared)
            .unwrap();
        assert!(events[cleared_at..]
            .iter()
            .all(|e| !matches!(e, SessionEvent::Fragment { .. })));
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Completed { .. })
        ));
        assert!(session.messages().is_empty());
    }
}
