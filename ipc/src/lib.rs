// This crate centralizes the definitions shared by the relay daemon and its clients.

pub mod chat_request; // Client -> relay request bodies and JSON responses
pub mod frames; // Relay -> client event stream framing

pub use chat_request::{ChatRequest, DebugResponse, ErrorResponse};
pub use frames::{decode_frame, encode_frame, Frame};
