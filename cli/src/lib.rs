//! Terminal client for the grounded chat relay.
//!
//! [`reader::FrameReader`] turns the relay's event stream back into frames,
//! [`session::ChatSession`] holds the conversation and applies frames to it,
//! and [`relay_client::RelayClient`] drives one exchange over HTTP.

pub mod reader;
pub mod relay_client;
pub mod session;

pub use reader::FrameReader;
pub use relay_client::{drive_exchange, RelayClient};
pub use session::{ChatSession, ExchangeObserver, ExchangeStatus, SessionUpdate, FAILURE_MESSAGE};
