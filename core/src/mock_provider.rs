//! Scripted [`GenerationProvider`] for tests.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};

use crate::errors::{GeminiError, GeminiResult};
use crate::provider::{GenerationProvider, GenerationRequest, UpstreamEvent, UpstreamStream};
use crate::types::GroundingMetadata;

/// One scripted step of a mock generation call
#[derive(Debug, Clone)]
pub enum MockStep {
    Text(String),
    Complete(Option<GroundingMetadata>),
    Fail(String),
}

impl MockStep {
    pub fn text(delta: &str) -> Self {
        MockStep::Text(delta.to_string())
    }

    fn into_event(self) -> GeminiResult<UpstreamEvent> {
        match self {
            MockStep::Text(delta) => Ok(UpstreamEvent::TextDelta(delta)),
            MockStep::Complete(metadata) => Ok(UpstreamEvent::Completed(metadata)),
            MockStep::Fail(message) => Err(GeminiError::StreamError(message)),
        }
    }
}

/// Replays the same script for every call and records what it was asked
#[derive(Debug, Default)]
pub struct MockProvider {
    steps: Vec<MockStep>,
    open_error: Option<String>,
    hang_after_script: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
    released: Arc<AtomicBool>,
}

impl MockProvider {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    /// Every call fails before producing output
    pub fn failing_open(message: &str) -> Self {
        Self {
            open_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Keep the stream open forever once the script runs out
    pub fn hanging(mut self) -> Self {
        self.hang_after_script = true;
        self
    }

    /// Number of generation calls opened
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// True once the last stream handed out has been dropped
    pub fn was_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn stream(&self, request: GenerationRequest) -> GeminiResult<UpstreamStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        if let Some(message) = &self.open_error {
            return Err(GeminiError::HttpError {
                status_code: 503,
                message: message.clone(),
            });
        }

        self.released.store(false, Ordering::SeqCst);
        let scripted = stream::iter(self.steps.clone().into_iter().map(MockStep::into_event));
        let inner: UpstreamStream = if self.hang_after_script {
            Box::pin(scripted.chain(stream::pending()))
        } else {
            Box::pin(scripted)
        };

        Ok(Box::pin(Tracked {
            inner,
            released: self.released.clone(),
        }))
    }

    fn model_name(&self) -> String {
        "mock-model".to_string()
    }
}

/// Flags `released` when the stream is dropped
struct Tracked {
    inner: UpstreamStream,
    released: Arc<AtomicBool>,
}

impl Stream for Tracked {
    type Item = GeminiResult<UpstreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}
