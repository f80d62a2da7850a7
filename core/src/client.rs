use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::{GeminiConfig, DEFAULT_API_BASE_URL, DEFAULT_MODEL};
use crate::errors::{GeminiError, GeminiResult};
use crate::provider::{GenerationProvider, GenerationRequest, UpstreamEvent, UpstreamStream};
use crate::sse::SseBuffer;
use crate::types::*;

/// Streaming client for the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model_name: String,
}

impl GeminiClient {
    /// Create a new Gemini API client
    pub fn new(config: &GeminiConfig) -> GeminiResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            GeminiError::ConfigError(
                "API key is required to initialize the Gemini client".to_string(),
            )
        })?;

        let base_url = config
            .api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let model_name = config
            .model_name
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name,
        })
    }

    /// Get the streaming endpoint URL
    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model_name
        )
    }

    /// Builds the wire request for a generation call
    pub fn build_request(request: &GenerationRequest) -> GenerateContentRequest {
        let system_instruction = request.system_instruction.as_ref().map(|prompt| Content {
            parts: vec![Part::text(prompt.clone())],
            role: None,
        });

        let contents = request
            .messages
            .iter()
            .map(|message| Content {
                parts: vec![Part::text(message.content.clone())],
                role: Some(message.role.gemini_role().to_string()),
            })
            .collect();

        let settings = &request.settings;
        let tools = settings
            .search_grounding
            .then(|| vec![Tool::google_search()]);

        GenerateContentRequest {
            contents,
            system_instruction,
            tools,
            generation_config: Some(GenerationConfig {
                temperature: settings.temperature,
                max_output_tokens: settings.max_output_tokens,
                thinking_config: settings.thinking_budget.map(|thinking_budget| ThinkingConfig {
                    thinking_budget,
                }),
            }),
        }
    }
}

#[async_trait]
impl GenerationProvider for GeminiClient {
    async fn stream(&self, request: GenerationRequest) -> GeminiResult<UpstreamStream> {
        let body = Self::build_request(&request);
        debug!(
            model = %self.model_name,
            turns = body.contents.len(),
            grounding = request.settings.search_grounding,
            "Opening Gemini stream"
        );

        let response = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeminiError::RequestError(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.map_err(|e| {
                GeminiError::ResponseError(format!("Failed to read error response: {}", e))
            })?;

            return Err(GeminiError::HttpError {
                status_code: status.as_u16(),
                message: format!("API request failed: {}", error_body),
            });
        }

        let mut bytes = response.bytes_stream();

        let events = async_stream::stream! {
            let mut buffer = SseBuffer::new();
            let mut metadata: Option<GroundingMetadata> = None;

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(GeminiError::StreamError(format!("Stream error: {}", e)));
                        return;
                    }
                };
                buffer.push(&chunk);

                while let Some(data) = buffer.next_event() {
                    match parse_stream_event(&data) {
                        Ok(parsed) => {
                            for delta in parsed.deltas {
                                yield Ok(UpstreamEvent::TextDelta(delta));
                            }
                            if parsed.metadata.is_some() {
                                metadata = parsed.metadata;
                            }
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            if let Some(data) = buffer.finish() {
                match parse_stream_event(&data) {
                    Ok(parsed) => {
                        for delta in parsed.deltas {
                            yield Ok(UpstreamEvent::TextDelta(delta));
                        }
                        if parsed.metadata.is_some() {
                            metadata = parsed.metadata;
                        }
                    }
                    Err(e) => warn!(error = %e, "Ignoring truncated trailing Gemini event"),
                }
            }

            yield Ok(UpstreamEvent::Completed(metadata));
        };

        Ok(Box::pin(events))
    }

    fn model_name(&self) -> String {
        self.model_name.clone()
    }
}

/// Answer text and grounding data carried by one streamed response chunk
#[derive(Debug, Default, PartialEq)]
pub(crate) struct StreamEvent {
    pub deltas: Vec<String>,
    pub metadata: Option<GroundingMetadata>,
}

/// Helper method to extract answer text and grounding metadata from one SSE payload.
/// Reasoning parts are logged and dropped.
pub(crate) fn parse_stream_event(data: &str) -> GeminiResult<StreamEvent> {
    let response: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| GeminiError::ParsingError(format!("Failed to parse stream chunk: {}", e)))?;

    let mut event = StreamEvent::default();
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(event);
    };

    if let Some(content) = candidate.content {
        for part in content.parts {
            let Some(text) = part.text.as_ref().filter(|t| !t.is_empty()) else {
                continue;
            };
            if part.is_thought() {
                debug!(chars = text.len(), "Skipping reasoning chunk");
                continue;
            }
            event.deltas.push(text.clone());
        }
    }

    event.metadata = candidate
        .grounding_metadata
        .and_then(GroundingMetadata::from_value)
        .filter(|metadata| !metadata.is_empty());

    Ok(event)
}
