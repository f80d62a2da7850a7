use grounded_core::{GroundingMetadata, Message, Source};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat` and `POST /api/debug`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ChatRequest {
    /// Full conversation, prior turns passed verbatim
    Conversation { messages: Vec<Message> },
    /// Single prompt without history
    Prompt { prompt: String },
}

impl ChatRequest {
    /// The turns to send upstream. A blank prompt yields no turns.
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            ChatRequest::Conversation { messages } => messages,
            ChatRequest::Prompt { prompt } if prompt.trim().is_empty() => Vec::new(),
            ChatRequest::Prompt { prompt } => vec![Message::user(prompt)],
        }
    }
}

/// JSON error body for failures that happen before a stream is opened
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body returned by `POST /api/debug`: the whole answer plus raw and
/// normalized grounding data
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DebugResponse {
    pub text: String,
    pub grounding_metadata: Option<GroundingMetadata>,
    pub sources: Vec<Source>,
}
