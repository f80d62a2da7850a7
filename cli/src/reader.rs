use grounded_core::SseBuffer;
use grounded_ipc::{decode_frame, Frame};
use tracing::warn;

/// Decodes the relay's event stream into frames, one network read at a time
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: SseBuffer,
    skipped: usize,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one read and returns every frame it completed, in order.
    /// Frames that fail to parse are logged and left out.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.push(chunk);

        let mut frames = Vec::new();
        while let Some(data) = self.buffer.next_event() {
            if let Some(frame) = self.decode(&data) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Decodes a trailing event that arrived without its blank-line delimiter
    pub fn finish(&mut self) -> Option<Frame> {
        let data = self.buffer.finish()?;
        self.decode(&data)
    }

    /// Number of frames dropped because they could not be parsed
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn decode(&mut self, data: &str) -> Option<Frame> {
        match decode_frame(data) {
            Ok(frame) => Some(frame),
            Err(e) => {
                self.skipped += 1;
                warn!(error = %e, frame = %data, "Skipping malformed frame");
                None
            }
        }
    }
}
