//! Line framing for streamed response bodies.
//!
//! Network reads do not line up with protocol lines: one JSON object or
//! SSE event may arrive split over several reads, and a multi-byte
//! character may be cut in half. Bytes are buffered until a full line is
//! available and only complete lines are handed to the parser.

use crate::client::{LlmStream, LlmStreamChunk};
use docrag_core::{AppError, AppResult};
use futures::{Stream, StreamExt};
use std::fmt::Display;

/// Parses a block of complete lines into stream chunks.
pub(crate) type LineParser = fn(&str) -> Vec<AppResult<LlmStreamChunk>>;

/// Accumulates raw bytes and releases whole lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append `bytes` and return every line completed so far, newline included.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        match self.pending.iter().rposition(|b| *b == b'\n') {
            Some(last) => {
                let complete: Vec<u8> = self.pending.drain(..=last).collect();
                String::from_utf8_lossy(&complete).into_owned()
            }
            None => String::new(),
        }
    }

    /// Trailing bytes left when the body ends without a final newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).into_owned();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Turn a streamed body into chunks, parsing one complete line block per read.
pub(crate) fn parse_body<S, B, E>(body: S, parse: LineParser) -> LlmStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = (Box::pin(body), LineBuffer::default(), false);
    let chunks = futures::stream::unfold(state, move |(mut body, mut buffer, ended)| async move {
        if ended {
            return None;
        }
        match body.next().await {
            Some(Ok(bytes)) => {
                let lines = buffer.push(bytes.as_ref());
                Some((parse(&lines), (body, buffer, false)))
            }
            Some(Err(e)) => {
                let error = AppError::GenerationBackend(format!("Stream error: {}", e));
                Some((vec![Err(error)], (body, buffer, true)))
            }
            None => {
                let tail = buffer.finish().map(|rest| parse(&rest)).unwrap_or_default();
                Some((tail, (body, buffer, true)))
            }
        }
    });

    Box::pin(chunks.map(futures::stream::iter).flatten())
}
