//! Framing of the relay's outbound event stream.
//!
//! Each frame travels as one server-sent event, `data: <json>\n\n`, where the
//! JSON is tagged by `type`:
//!
//! ```text
//! data: {"type":"text","content":"Hel"}
//! data: {"type":"sources","content":[{"url":"http://a.com","title":"a.com"}]}
//! data: {"type":"error","content":"upstream stream failed"}
//! ```
//!
//! `sources` always carries the normalized, de-duplicated list. An exchange
//! sends any number of `text` frames followed by at most one `sources` frame,
//! or by a single `error` frame when generation broke off mid-stream.

use grounded_core::Source;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Frame {
    Text(String),
    Sources(Vec<Source>),
    Error(String),
}

/// Encodes the `data` payload of one event. The JSON is compact, so it never
/// spans more than one `data:` line.
pub fn encode_frame(frame: &Frame) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}

/// Decodes the `data` payload of one event
pub fn decode_frame(data: &str) -> Result<Frame, serde_json::Error> {
    serde_json::from_str(data)
}
