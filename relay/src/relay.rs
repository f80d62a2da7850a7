//! The stream relay: one upstream generation call in, one ordered frame stream out.
//!
//! A spawned pump task is the only writer of an exchange's frame channel. It
//! forwards every text delta as soon as it arrives, turns the completion
//! metadata into at most one `sources` frame, and then closes the channel.
//! The [`FrameStream`] handed to the HTTP layer cancels the pump when dropped,
//! so a disconnected client releases the upstream call immediately.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{stream, Stream, StreamExt};
use grounded_core::chat::has_user_message;
use grounded_core::{
    extract_sources, GeminiConfig, GeminiError, GenerationProvider, GenerationRequest,
    GenerationSettings, GroundingMetadata, Message, UpstreamEvent, UpstreamStream,
};
use grounded_ipc::Frame;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Failures reported before any frame is sent
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream failure: {0}")]
    UpstreamFailure(#[from] GeminiError),
}

/// Relays generation calls from one provider. Cheap to clone.
#[derive(Clone)]
pub struct StreamRelay {
    provider: Arc<dyn GenerationProvider>,
    config: Arc<GeminiConfig>,
    frame_buffer: usize,
}

/// Result of running a generation call to completion without streaming
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedAnswer {
    pub text: String,
    pub metadata: Option<GroundingMetadata>,
}

impl StreamRelay {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        config: GeminiConfig,
        frame_buffer: usize,
    ) -> Self {
        Self {
            provider,
            config: Arc::new(config),
            frame_buffer: frame_buffer.max(1),
        }
    }

    pub fn model_name(&self) -> String {
        self.provider.model_name()
    }

    fn build_request(&self, messages: Vec<Message>) -> Result<GenerationRequest, RelayError> {
        if !has_user_message(&messages) {
            return Err(RelayError::InvalidRequest("No user message found".to_string()));
        }

        Ok(GenerationRequest {
            system_instruction: Some(self.config.system_instruction()),
            messages,
            settings: self.settings(),
        })
    }

    fn settings(&self) -> GenerationSettings {
        self.config.generation_settings()
    }

    /// Validates the conversation, opens the upstream call and starts relaying.
    ///
    /// Returns an error, and opens no stream, when the conversation has no user
    /// turn or when the upstream call fails before producing its first event.
    pub async fn open(
        &self,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<FrameStream, RelayError> {
        let request = self.build_request(messages)?;
        let span = tracing::info_span!("exchange", id = %Uuid::new_v4());
        self.start_exchange(request, cancel).instrument(span).await
    }

    async fn start_exchange(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<FrameStream, RelayError> {
        info!(
            turns = request.messages.len(),
            model = %self.model_name(),
            "Opening upstream generation"
        );
        let mut upstream = self.provider.stream(request).await.map_err(|e| {
            error!(error = %e, "Upstream generation failed to start");
            RelayError::UpstreamFailure(e)
        })?;

        // The first event decides between an error response and a stream
        let events: UpstreamStream = match upstream.next().await {
            Some(Err(e)) => {
                error!(error = %e, "Upstream generation failed before producing output");
                return Err(RelayError::UpstreamFailure(e));
            }
            Some(Ok(first)) => Box::pin(stream::iter(std::iter::once(Ok(first))).chain(upstream)),
            None => Box::pin(stream::empty()),
        };

        let (tx, rx) = mpsc::channel(self.frame_buffer);
        tokio::spawn(pump(events, tx, cancel.clone()).in_current_span());

        Ok(FrameStream {
            frames: ReceiverStream::new(rx),
            cancel: cancel.clone(),
            _cancel_on_drop: cancel.drop_guard(),
        })
    }

    /// Runs a generation call to completion and returns the whole answer
    pub async fn collect(&self, messages: Vec<Message>) -> Result<CollectedAnswer, RelayError> {
        let request = self.build_request(messages)?;
        let mut upstream = self.provider.stream(request).await?;

        let mut text = String::new();
        let mut metadata = None;
        while let Some(event) = upstream.next().await {
            match event? {
                UpstreamEvent::TextDelta(delta) => text.push_str(&delta),
                UpstreamEvent::Completed(completed) => {
                    metadata = completed;
                    break;
                }
            }
        }

        debug!(chars = text.len(), has_metadata = metadata.is_some(), "Collected full answer");
        Ok(CollectedAnswer { text, metadata })
    }
}

/// Outbound frames of one exchange, in write order.
///
/// Dropping the stream cancels the exchange.
pub struct FrameStream {
    frames: ReceiverStream<Frame>,
    cancel: CancellationToken,
    _cancel_on_drop: DropGuard,
}

impl FrameStream {
    /// Stops the exchange. Safe to call more than once.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for FrameStream {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        Pin::new(&mut self.frames).poll_next(cx)
    }
}

/// Drives the upstream call and writes frames until completion, failure or cancellation
async fn pump(mut upstream: UpstreamStream, tx: mpsc::Sender<Frame>, cancel: CancellationToken) {
    let mut text_frames = 0usize;

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(text_frames, "Exchange cancelled by client");
                return;
            }
            event = upstream.next() => event,
        };

        match event {
            Some(Ok(UpstreamEvent::TextDelta(delta))) => {
                if !send(&tx, &cancel, Frame::Text(delta)).await {
                    debug!(text_frames, "Client went away, stopping upstream consumption");
                    return;
                }
                text_frames += 1;
            }
            Some(Ok(UpstreamEvent::Completed(metadata))) => {
                let sources = extract_sources(metadata.as_ref());
                if sources.is_empty() {
                    debug!("No sources found in completion metadata");
                } else {
                    info!(count = sources.len(), "Sending sources to client");
                    send(&tx, &cancel, Frame::Sources(sources)).await;
                }
                break;
            }
            Some(Err(e)) => {
                error!(error = %e, text_frames, "Upstream generation failed mid-stream");
                send(&tx, &cancel, Frame::Error("Generation was interrupted".to_string())).await;
                break;
            }
            None => {
                warn!(text_frames, "Upstream ended without completion metadata");
                break;
            }
        }
    }

    info!(text_frames, "Exchange complete");
    // Dropping `tx` here closes the outbound stream after every frame above
}

/// Writes one frame unless the exchange was cancelled first.
/// Returns false when the frame could not be delivered.
async fn send(tx: &mpsc::Sender<Frame>, cancel: &CancellationToken, frame: Frame) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(frame) => sent.is_ok(),
    }
}
