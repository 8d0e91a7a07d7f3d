//! Lazy frame sequence over a chunked response body

use std::collections::VecDeque;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::debug;

use super::decoder::FrameDecoder;

struct FrameState<S> {
    body: S,
    decoder: FrameDecoder,
    ready: VecDeque<String>,
    done: bool,
}

/// Adapt a chunked body into a stream of frame payloads.
///
/// Chunks are pulled strictly in arrival order and only when the previous
/// frames have been consumed. A body error is yielded once and ends the
/// stream; frames already yielded stay valid.
pub fn frames<S, E>(body: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let state = FrameState {
        body,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.ready.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.ready.extend(state.decoder.feed(&chunk)),
                Some(Err(e)) => {
                    debug!("Body read failed after {} frames", state.decoder.frames_emitted());
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.decoder.finish();
                    state.done = true;
                }
            }
        }
    })
}
