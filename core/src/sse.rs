//! Incremental decoding of `text/event-stream` bodies.
//!
//! Network reads may split or merge events arbitrarily. [`SseBuffer`] keeps the
//! undecoded tail between reads and only yields events once their terminating
//! blank line has arrived. Splitting happens on raw bytes, so a multi-byte
//! UTF-8 sequence cut by a read boundary is never decoded half-way.

const EVENT_DELIMITER: &[u8] = b"\n\n";

/// Carry-over buffer for server-sent events
#[derive(Debug, Default)]
pub struct SseBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already searched for a delimiter
    scanned: usize,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one network read. Carriage returns are framing-only in this
    /// protocol (JSON payloads escape them), so they are dropped here.
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));
    }

    /// Returns the `data` payload of the next complete event, if one is buffered.
    /// Events without any `data:` line (comments, keep-alives) are skipped.
    pub fn next_event(&mut self) -> Option<String> {
        loop {
            // Back up so a delimiter split across reads is still found
            let from = self.scanned.saturating_sub(EVENT_DELIMITER.len() - 1);
            let Some(offset) = find(&self.pending[from..], EVENT_DELIMITER) else {
                self.scanned = self.pending.len();
                return None;
            };

            let end = from + offset;
            let raw: Vec<u8> = self.pending.drain(..end + EVENT_DELIMITER.len()).collect();
            self.scanned = 0;
            if let Some(data) = event_data(&raw[..end]) {
                return Some(data);
            }
        }
    }

    /// Flushes whatever is left once the stream has ended. A final event
    /// whose delimiter never arrived is still returned.
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        self.scanned = 0;
        event_data(&raw)
    }

    /// Bytes received but not yet part of a complete event
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn event_data(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut data: Option<String> = None;

    for line in text.lines() {
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    data
}
