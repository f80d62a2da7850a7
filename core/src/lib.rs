// Core functionality shared by the relay daemon and the terminal client:
// - Streaming API client for Gemini
// - Request/response data structures, including grounding metadata
// - Provider abstraction over token-incremental generation
// - Configuration loading
// - Shared error types

// Export client module - streaming API client for Gemini
pub mod client;
pub use client::GeminiClient;

// Export types module - Gemini request/response data structures
pub mod types;
pub use types::*;

// Export chat module - conversation messages
pub mod chat;
pub use chat::{Message, Role};

// Export provider module - upstream generation abstraction
pub mod provider;
pub use provider::{
    GenerationProvider, GenerationRequest, GenerationSettings, UpstreamEvent, UpstreamStream,
};

// Export sources module - grounding metadata -> citation list
pub mod sources;
pub use sources::{extract_sources, Source};

// Export sse module - incremental event-stream decoding
pub mod sse;
pub use sse::SseBuffer;

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export prompt module - default system instruction
pub mod prompt;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock_provider;
