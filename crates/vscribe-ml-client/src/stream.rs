//! Newline-delimited JSON response streams.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use tracing::debug;

use crate::error::{MlError, MlResult};
use crate::types::GenerateResponse;

/// Ordered, finite, non-restartable sequence of generated text chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = MlResult<String>> + Send>>;

/// Splits a byte stream into complete lines, buffering partial lines across
/// network reads.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every line completed by them. Blank lines are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            // '\n' never occurs inside a multi-byte UTF-8 sequence
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// Flush a trailing line that had no terminating newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

struct StreamState<S> {
    bytes: Pin<Box<S>>,
    decoder: NdjsonDecoder,
    pending: VecDeque<MlResult<String>>,
    finished: bool,
    base_url: String,
    timeout_secs: u64,
}

impl<S> StreamState<S> {
    /// Turn one record into pending output. Returns false once the stream must end.
    fn handle_line(&mut self, line: &str) -> bool {
        let record: GenerateResponse = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                self.pending.push_back(Err(MlError::InvalidResponse(format!(
                    "malformed stream record: {e}"
                ))));
                return false;
            }
        };

        if let Some(error) = record.error {
            self.pending.push_back(Err(MlError::InferenceFailed(error)));
            return false;
        }

        if let Some(chunk) = record.response.filter(|c| !c.is_empty()) {
            self.pending.push_back(Ok(chunk));
        }

        if record.done {
            debug!("Stream signalled completion");
            return false;
        }
        true
    }
}

/// Decode a newline-delimited generate stream into text chunks.
///
/// The stream ends at the first `done: true` record, when the connection
/// closes, or after the first error (which is yielded).
pub fn ndjson_chunks<S, B>(bytes: S, base_url: impl Into<String>, timeout_secs: u64) -> ChunkStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = StreamState {
        bytes: Box::pin(bytes),
        decoder: NdjsonDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
        base_url: base_url.into(),
        timeout_secs,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }

            match st.bytes.next().await {
                Some(Ok(bytes)) => {
                    for line in st.decoder.push(bytes.as_ref()) {
                        if !st.handle_line(&line) {
                            st.finished = true;
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    let err = MlError::from_transport(e, &st.base_url, st.timeout_secs);
                    st.pending.push_back(Err(err));
                    st.finished = true;
                }
                None => {
                    if let Some(line) = st.decoder.finish() {
                        st.handle_line(&line);
                    }
                    st.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks_of(parts: Vec<&'static str>) -> ChunkStream {
        let items: Vec<Result<Vec<u8>, reqwest::Error>> =
            parts.into_iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        ndjson_chunks(stream::iter(items), "http://localhost:11434", 300)
    }

    #[test]
    fn test_decoder_buffers_partial_lines() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(br#"{"response":"He"#).is_empty());
        let lines = decoder.push(b"llo\"}\n\n{\"resp");
        assert_eq!(lines, vec![r#"{"response":"Hello"}"#.to_string()]);
        assert_eq!(decoder.finish(), Some(r#"{"resp"#.to_string()));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_decoder_handles_crlf() {
        let mut decoder = NdjsonDecoder::new();
        let lines = decoder.push(b"{\"a\":1}\r\n{\"b\":2}\r\n");
        assert_eq!(lines, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
    }

    #[tokio::test]
    async fn test_chunks_in_arrival_order_split_across_reads() {
        let stream = chunks_of(vec![
            "{\"response\":\"The \",\"done\":false}\n{\"respo",
            "nse\":\"form \",\"done\":false}\n",
            "{\"response\":\"is good.\",\"done\":false}\n{\"response\":\"\",\"done\":true}\n",
        ]);
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec!["The ", "form ", "is good."]);
    }

    #[tokio::test]
    async fn test_records_after_done_are_ignored() {
        let stream = chunks_of(vec![
            "{\"response\":\"a\"}\n{\"response\":\"\",\"done\":true}\n{\"response\":\"late\"}\n",
        ]);
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec!["a"]);
    }

    #[tokio::test]
    async fn test_connection_close_without_done_ends_stream() {
        let stream = chunks_of(vec!["{\"response\":\"a\"}\n{\"response\":\"b\"}"]);
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_error_record_terminates_with_error() {
        let stream = chunks_of(vec![
            "{\"response\":\"partial\"}\n{\"error\":\"model not found\"}\n{\"response\":\"x\"}\n",
        ]);
        let items: Vec<MlResult<String>> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(&items[1], Err(MlError::InferenceFailed(m)) if m == "model not found"));
    }

    #[tokio::test]
    async fn test_malformed_record() {
        let stream = chunks_of(vec!["not json\n"]);
        let items: Vec<MlResult<String>> = stream.collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(MlError::InvalidResponse(_))));
    }
}
