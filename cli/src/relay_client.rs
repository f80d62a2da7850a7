use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use futures::{pin_mut, Stream, StreamExt};
use grounded_ipc::{ChatRequest, DebugResponse, ErrorResponse, Frame};
use std::fmt::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::reader::FrameReader;
use crate::session::{ChatSession, ExchangeObserver, ExchangeStatus, SessionUpdate};

/// HTTP client for the relay daemon
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Checks whether the relay answers its health route
    pub async fn test_connection(&self) -> Result<bool> {
        match self.http.get(self.endpoint("")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                debug!(error = %e, "Relay health check failed");
                Ok(false)
            }
        }
    }

    /// Sends `input` as the next user turn of `session` and streams the answer
    /// into it. Returns an error only when the session refuses to start the
    /// exchange; transport and relay failures end the exchange as `Failed`.
    #[instrument(skip_all, fields(relay = %self.base_url))]
    pub async fn send_chat(
        &self,
        session: &mut ChatSession,
        input: &str,
        cancel: &CancellationToken,
        observer: &mut dyn ExchangeObserver,
    ) -> Result<ExchangeStatus> {
        let messages = session
            .begin_exchange(input)
            .ok_or_else(|| anyhow!("Input is blank or another exchange is still running"))?;
        info!(turns = messages.len(), "Sending chat request");

        let request = self
            .http
            .post(self.endpoint("api/chat"))
            .json(&ChatRequest::Conversation { messages })
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Exchange cancelled before the relay answered");
                return Ok(finish_exchange(session, observer, ExchangeStatus::Cancelled));
            }
            response = request => response,
        };

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                let status = response.status();
                let message = error_message(response).await;
                error!(%status, error = %message, "Relay rejected the chat request");
                return Ok(finish_exchange(session, observer, ExchangeStatus::Failed));
            }
            Err(e) => {
                error!(error = %e, "Failed to reach the relay");
                return Ok(finish_exchange(session, observer, ExchangeStatus::Failed));
            }
        };

        Ok(drive_exchange(response.bytes_stream(), session, cancel, observer).await)
    }

    /// Runs one prompt through the relay's non-streaming debug route
    pub async fn debug(&self, prompt: &str) -> Result<DebugResponse> {
        let response = self
            .http
            .post(self.endpoint("api/debug"))
            .json(&ChatRequest::Prompt {
                prompt: prompt.to_string(),
            })
            .send()
            .await
            .context("Failed to reach the relay")?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow!("Relay returned {}: {}", status, error_message(response).await));
        }

        response
            .json::<DebugResponse>()
            .await
            .context("Failed to decode debug response")
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) => parsed.error,
        Err(_) => body,
    }
}

/// Reads a relay response body into `session` until it ends, fails, or
/// `cancel` fires. The in-flight exchange is always finished on return.
pub async fn drive_exchange<S, E>(
    body: S,
    session: &mut ChatSession,
    cancel: &CancellationToken,
    observer: &mut dyn ExchangeObserver,
) -> ExchangeStatus
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    pin_mut!(body);
    let mut reader = FrameReader::new();

    let status = loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => break ExchangeStatus::Cancelled,
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                if let Some(status) = apply_frames(reader.push(&bytes), session, cancel, observer) {
                    break status;
                }
            }
            Some(Err(e)) => {
                error!(error = %e, "Relay stream broke off");
                break ExchangeStatus::Failed;
            }
            None => {
                let trailing = reader.finish().into_iter().collect();
                break apply_frames(trailing, session, cancel, observer)
                    .unwrap_or(ExchangeStatus::Completed);
            }
        }
    };

    if status == ExchangeStatus::Cancelled {
        debug!("Exchange cancelled by the user");
    }
    if reader.skipped() > 0 {
        warn!(skipped = reader.skipped(), "Some frames could not be parsed");
    }

    // Dropping `body` here aborts the underlying request
    finish_exchange(session, observer, status)
}

/// Applies decoded frames in order. Returns the terminal status when one of
/// them ends the exchange.
fn apply_frames(
    frames: Vec<Frame>,
    session: &mut ChatSession,
    cancel: &CancellationToken,
    observer: &mut dyn ExchangeObserver,
) -> Option<ExchangeStatus> {
    for frame in frames {
        if cancel.is_cancelled() {
            return Some(ExchangeStatus::Cancelled);
        }
        let Some(update) = session.apply(frame) else {
            continue;
        };
        observer.on_update(&update);
        if let SessionUpdate::Interrupted(reason) = &update {
            error!(reason = %reason, "Relay reported a generation failure");
            return Some(ExchangeStatus::Failed);
        }
    }
    None
}

fn finish_exchange(
    session: &mut ChatSession,
    observer: &mut dyn ExchangeObserver,
    status: ExchangeStatus,
) -> ExchangeStatus {
    session.finish(status);
    observer.on_finished(status, session);
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FAILURE_MESSAGE;
    use futures::stream;
    use grounded_core::Source;
    use std::io;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<SessionUpdate>,
        finished: Option<ExchangeStatus>,
        cancel_on_first_update: Option<CancellationToken>,
    }

    impl ExchangeObserver for Recorder {
        fn on_update(&mut self, update: &SessionUpdate) {
            self.updates.push(update.clone());
            if let Some(cancel) = &self.cancel_on_first_update {
                cancel.cancel();
            }
        }

        fn on_finished(&mut self, status: ExchangeStatus, _session: &ChatSession) {
            self.finished = Some(status);
        }
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        stream::iter(
            parts
                .iter()
                .map(|part| Ok(Bytes::from_static(part.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    fn started(input: &str) -> ChatSession {
        let mut session = ChatSession::new();
        session.begin_exchange(input).unwrap();
        session
    }

    #[tokio::test]
    async fn test_split_reads_render_in_order() {
        let mut session = started("hi");
        let mut recorder = Recorder::default();

        let status = drive_exchange(
            chunks(&[
                "data: {\"type\":\"text\",\"con",
                "tent\":\"Hel\"}\n\ndata: {\"type\":\"text\",\"content\":\"lo\"}\n",
                "\ndata: {\"type\":\"sources\",\"content\":[{\"url\":\"http://a.com\",\"title\":\"a.com\"}]}\n\n",
            ]),
            &mut session,
            &CancellationToken::new(),
            &mut recorder,
        )
        .await;

        let sources = vec![Source {
            url: "http://a.com".to_string(),
            title: "a.com".to_string(),
        }];
        assert_eq!(status, ExchangeStatus::Completed);
        assert_eq!(
            recorder.updates,
            vec![
                SessionUpdate::Content("Hel".to_string()),
                SessionUpdate::Content("Hello".to_string()),
                SessionUpdate::Sources(sources.clone()),
            ]
        );
        assert_eq!(recorder.finished, Some(ExchangeStatus::Completed));
        assert_eq!(session.last_answer(), Some("Hello"));
        assert_eq!(session.sources(), &sources[..]);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_stop_the_exchange() {
        let mut session = started("hi");

        let status = drive_exchange(
            chunks(&[
                "data: {\"type\":\"text\",\"content\":\"a\"}\n\n",
                "data: garbage\n\n",
                "data: {\"type\":\"text\",\"content\":\"b\"}\n\n",
            ]),
            &mut session,
            &CancellationToken::new(),
            &mut (),
        )
        .await;

        assert_eq!(status, ExchangeStatus::Completed);
        assert_eq!(session.last_answer(), Some("ab"));
    }

    #[tokio::test]
    async fn test_trailing_frame_is_decoded_at_end_of_stream() {
        let mut session = started("hi");

        let status = drive_exchange(
            chunks(&["data: {\"type\":\"text\",\"content\":\"done\"}"]),
            &mut session,
            &CancellationToken::new(),
            &mut (),
        )
        .await;

        assert_eq!(status, ExchangeStatus::Completed);
        assert_eq!(session.last_answer(), Some("done"));
    }

    #[tokio::test]
    async fn test_cancel_keeps_rendered_content() {
        let mut session = started("hi");
        let cancel = CancellationToken::new();
        let mut recorder = Recorder {
            cancel_on_first_update: Some(cancel.clone()),
            ..Default::default()
        };

        let body = chunks(&["data: {\"type\":\"text\",\"content\":\"partial\"}\n\n"])
            .chain(stream::pending());
        let status = drive_exchange(body, &mut session, &cancel, &mut recorder).await;

        assert_eq!(status, ExchangeStatus::Cancelled);
        assert_eq!(recorder.updates.len(), 1);
        assert_eq!(session.last_answer(), Some("partial"));
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_cancel_stops_frames_within_a_read() {
        let mut session = started("hi");
        let cancel = CancellationToken::new();
        let mut recorder = Recorder {
            cancel_on_first_update: Some(cancel.clone()),
            ..Default::default()
        };

        let status = drive_exchange(
            chunks(&[
                "data: {\"type\":\"text\",\"content\":\"a\"}\n\ndata: {\"type\":\"text\",\"content\":\"b\"}\n\n",
            ]),
            &mut session,
            &cancel,
            &mut recorder,
        )
        .await;

        assert_eq!(status, ExchangeStatus::Cancelled);
        assert_eq!(session.last_answer(), Some("a"));
    }

    #[tokio::test]
    async fn test_transport_error_fails_the_exchange() {
        let mut session = started("hi");
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"text\",\"content\":\"part\"}\n\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ]);

        let status = drive_exchange(body, &mut session, &CancellationToken::new(), &mut ()).await;

        assert_eq!(status, ExchangeStatus::Failed);
        assert_eq!(session.last_answer(), Some(FAILURE_MESSAGE));
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_error_frame_fails_the_exchange() {
        let mut session = started("hi");
        let mut recorder = Recorder::default();

        let status = drive_exchange(
            chunks(&[
                "data: {\"type\":\"text\",\"content\":\"part\"}\n\n",
                "data: {\"type\":\"error\",\"content\":\"Generation was interrupted\"}\n\n",
                "data: {\"type\":\"text\",\"content\":\"late\"}\n\n",
            ]),
            &mut session,
            &CancellationToken::new(),
            &mut recorder,
        )
        .await;

        assert_eq!(status, ExchangeStatus::Failed);
        assert_eq!(
            recorder.updates.last(),
            Some(&SessionUpdate::Interrupted("Generation was interrupted".to_string()))
        );
        assert_eq!(session.last_answer(), Some(FAILURE_MESSAGE));
    }
}
