use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use super::models::GeminiResponse;
use crate::providers::types::{ProviderError, StreamEvent};

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes may arrive split anywhere, including inside a multi-byte UTF-8
/// sequence; incomplete tails are held until the next chunk.
#[derive(Debug, Default)]
pub struct SseDecoder {
    byte_buf: Vec<u8>,
    buffer: String,
    invalid_at: Option<usize>,
    consumed: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the `data` payload of every event it completed.
    ///
    /// After an invalid byte nothing more is decoded; events completed
    /// before it are still returned and `invalid_byte` reports the offset.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        if self.invalid_at.is_some() {
            return Vec::new();
        }
        self.byte_buf.extend_from_slice(bytes);

        let valid_up_to = match std::str::from_utf8(&self.byte_buf) {
            Ok(_) => self.byte_buf.len(),
            Err(e) => {
                if e.error_len().is_some() {
                    self.invalid_at = Some(self.consumed + e.valid_up_to());
                }
                e.valid_up_to()
            }
        };
        if valid_up_to > 0 {
            let decoded = String::from_utf8_lossy(&self.byte_buf[..valid_up_to]).into_owned();
            self.byte_buf.drain(..valid_up_to);
            self.consumed += valid_up_to;
            // Gemini uses \r\n line endings
            self.buffer.push_str(&decoded.replace("\r\n", "\n"));
        }
        if self.invalid_at.is_some() {
            self.byte_buf.clear();
        }

        let mut payloads = Vec::new();
        while let Some(event_end) = self.buffer.find("\n\n") {
            let event_text: String = self.buffer.drain(..event_end + 2).collect();
            if let Some(data) = Self::event_data(&event_text) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Byte offset of the first invalid UTF-8 sequence seen, if any.
    pub fn invalid_byte(&self) -> Option<usize> {
        self.invalid_at
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        Self::event_data(&rest)
    }

    fn event_data(event_text: &str) -> Option<String> {
        let mut data = String::new();
        for line in event_text.lines() {
            if let Some(payload) = line.strip_prefix("data: ") {
                data.push_str(payload);
            } else if let Some(payload) = line.strip_prefix("data:") {
                data.push_str(payload);
            }
        }
        if data.is_empty() {
            None
        } else {
            Some(data)
        }
    }
}

#[derive(Default)]
struct Usage {
    tokens_in: Option<i64>,
    tokens_out: Option<i64>,
}

/// Outcome of handling one SSE payload.
enum Step {
    Continue,
    Stop,
}

async fn handle_payload(data: &str, usage: &mut Usage, tx: &mpsc::Sender<StreamEvent>) -> Step {
    let response = match serde_json::from_str::<GeminiResponse>(data) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("Failed to parse SSE data: {}", e);
            let _ = tx
                .send(StreamEvent::Error(ProviderError::InvalidResponse(format!(
                    "Malformed stream event: {}",
                    e
                ))))
                .await;
            return Step::Stop;
        }
    };

    if let Some(error) = &response.error {
        let _ = tx
            .send(StreamEvent::Error(ProviderError::RequestFailed(error.describe())))
            .await;
        return Step::Stop;
    }

    if let Some(text) = response.text() {
        if tx.send(StreamEvent::Token(text)).await.is_err() {
            return Step::Stop; // receiver dropped
        }
    }

    // The last chunk usually carries the totals
    if let Some(meta) = &response.usage_metadata {
        if meta.prompt_token_count.is_some() {
            usage.tokens_in = meta.prompt_token_count;
        }
        if meta.candidates_token_count.is_some() {
            usage.tokens_out = meta.candidates_token_count;
        }
    }

    Step::Continue
}

pub async fn parse_sse_stream<S, E>(mut stream: S, tx: mpsc::Sender<StreamEvent>)
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut decoder = SseDecoder::new();
    let mut usage = Usage::default();

    while let Some(chunk_result) = stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error(ProviderError::NetworkError(format!(
                        "Stream error: {}",
                        e
                    ))))
                    .await;
                return;
            }
        };

        for data in decoder.push(&bytes) {
            if let Step::Stop = handle_payload(&data, &mut usage, &tx).await {
                return;
            }
        }

        if let Some(offset) = decoder.invalid_byte() {
            tracing::warn!("Invalid UTF-8 in stream at byte {}", offset);
            let _ = tx
                .send(StreamEvent::Error(ProviderError::InvalidResponse(format!(
                    "Invalid UTF-8 in stream at byte {}",
                    offset
                ))))
                .await;
            return;
        }
    }

    if let Some(data) = decoder.finish() {
        if let Step::Stop = handle_payload(&data, &mut usage, &tx).await {
            return;
        }
    }

    let _ = tx
        .send(StreamEvent::Done {
            tokens_in: usage.tokens_in,
            tokens_out: usage.tokens_out,
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":{}}}]}}}}]}}\r\n\r\n",
            serde_json::to_string(text).unwrap()
        )
    }

    async fn collect(chunks: Vec<Vec<u8>>) -> Vec<StreamEvent> {
        let (tx, mut rx) = mpsc::channel(64);
        let stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<Bytes, std::io::Error>(Bytes::from(c))),
        );
        parse_sse_stream(stream, tx).await;
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    }

    fn tokens(events: &[StreamEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Token(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_decoder_crlf_and_split_events() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        let out = decoder.push(b"1}\r\n\r\ndata: {\"b\":2}\r\n\r\n");
        assert_eq!(out, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
    }

    #[test]
    fn test_decoder_holds_partial_utf8() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: \"é\"\n\n".as_bytes();
        // split inside the two-byte 'é'
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(decoder.push(&bytes[split..]), vec!["\"é\"".to_string()]);
    }

    #[test]
    fn test_decoder_ignores_comment_only_events() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b": keep-alive\n\n").is_empty());
    }

    #[tokio::test]
    async fn test_stream_emits_tokens_then_done() {
        let body = format!("{}{}", chunk("He"), chunk("llo"));
        let events = collect(vec![body.into_bytes()]).await;
        assert_eq!(tokens(&events), vec!["He", "llo"]);
        assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
    }

    #[tokio::test]
    async fn test_stream_in_band_error_stops() {
        let body = format!(
            "{}data: {{\"error\":{{\"code\":429,\"message\":\"quota\",\"status\":\"RESOURCE_EXHAUSTED\"}}}}\n\n{}",
            chunk("partial"),
            chunk("never")
        );
        let events = collect(vec![body.into_bytes()]).await;
        assert_eq!(tokens(&events), vec!["partial"]);
        match events.last() {
            Some(StreamEvent::Error(e)) => assert!(e.is_quota()),
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_decoder_stops_at_invalid_byte() {
        let mut decoder = SseDecoder::new();
        let mut bytes = b"data: 1\n\n".to_vec();
        bytes.push(0xFF);
        bytes.extend_from_slice(b"\n\ndata: 2\n\n");
        assert_eq!(decoder.push(&bytes), vec!["1".to_string()]);
        assert_eq!(decoder.invalid_byte(), Some(9));
        assert!(decoder.push(b"data: 3\n\n").is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_fails_the_stream() {
        let mut body = chunk("He").into_bytes();
        body.push(0xFF);
        body.extend_from_slice(b"\n\n");
        body.extend_from_slice(chunk("llo").as_bytes());

        let events = collect(vec![body]).await;
        assert_eq!(tokens(&events), vec!["He"]);
        match events.last() {
            Some(StreamEvent::Error(ProviderError::InvalidResponse(_))) => {}
            other => panic!("Expected invalid response, got {:?}", other),
        }
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Done { .. })));
    }

    #[tokio::test]
    async fn test_unparseable_event_fails_the_stream() {
        let body = format!("{}data: {{\"candidates\":[{{\n\n{}", chunk("He"), chunk("llo"));
        let events = collect(vec![body.into_bytes()]).await;
        assert_eq!(tokens(&events), vec!["He"]);
        assert!(matches!(
            events.last(),
            Some(StreamEvent::Error(ProviderError::InvalidResponse(_)))
        ));
    }

    #[tokio::test]
    async fn test_stream_usage_metadata() {
        let body = format!(
            "{}data: {{\"usageMetadata\":{{\"promptTokenCount\":3,\"candidatesTokenCount\":7}}}}\n\n",
            chunk("hi")
        );
        let events = collect(vec![body.into_bytes()]).await;
        match events.last() {
            Some(StreamEvent::Done { tokens_in, tokens_out }) => {
                assert_eq!(*tokens_in, Some(3));
                assert_eq!(*tokens_out, Some(7));
            }
            other => panic!("Expected done, got {:?}", other),
        }
    }
}
