//! sse.rs
//!
//! Incremental decoder for `text/event-stream` bodies. Network chunks do not
//! line up with event boundaries (or even UTF-8 boundaries), so bytes are
//! buffered until a blank line closes an event.

use bytes::Bytes;

/// OpenAI-style end-of-stream sentinel.
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the `data` payloads of every event it completes.
    pub fn feed(&mut self, chunk: &Bytes) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some((end, sep_len)) = find_event_end(&self.buf) {
            let raw: Vec<u8> = self.buf.drain(..end + sep_len).take(end).collect();
            if let Some(data) = parse_event(&String::from_utf8_lossy(&raw)) {
                out.push(data);
            }
        }
        out
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buf);
        parse_event(&String::from_utf8_lossy(&raw))
    }
}

/// Position and length of the first blank-line separator (`\n\n` or `\r\n\r\n`).
fn find_event_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_event(raw: &str) -> Option<String> {
    let mut data: Vec<&str> = Vec::new();
    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // `event:`, `id:`, `retry:` and `:` comments carry nothing we need;
        // the event type is repeated inside the JSON payload.
    }
    if data.is_empty() {
        return None;
    }
    let joined = data.join("\n");
    if joined.trim() == DONE_SENTINEL {
        return None;
    }
    Some(joined)
}
