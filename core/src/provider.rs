use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::chat::Message;
use crate::errors::GeminiResult;
use crate::types::GroundingMetadata;

/// One event from an in-flight generation call.
///
/// Text deltas arrive in order; `Completed` is the last event of a successful
/// call and carries whatever grounding metadata the provider attached.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    TextDelta(String),
    Completed(Option<GroundingMetadata>),
}

/// Ordered event source for a single generation call
pub type UpstreamStream = Pin<Box<dyn Stream<Item = GeminiResult<UpstreamEvent>> + Send>>;

/// Sampling and grounding options for a generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub thinking_budget: Option<u32>,
    pub search_grounding: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            max_output_tokens: Some(10_000),
            thinking_budget: Some(3_000),
            search_grounding: true,
        }
    }
}

/// Everything the provider needs to start generating
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_instruction: Option<String>,
    pub messages: Vec<Message>,
    pub settings: GenerationSettings,
}

/// A hosted model that produces text incrementally
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Opens a generation call. Errors returned here happen before any output.
    async fn stream(&self, request: GenerationRequest) -> GeminiResult<UpstreamStream>;

    /// Get the model name being used
    fn model_name(&self) -> String;
}
