use grounded_core::{Message, Role, Source};
use grounded_ipc::Frame;
use tracing::debug;

/// Shown in place of the answer when an exchange fails
pub const FAILURE_MESSAGE: &str = "Sorry, there was an error processing your request.";

/// How an exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStatus {
    Completed,
    Cancelled,
    Failed,
}

/// One visible change caused by a frame
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Full assistant content after the latest delta
    Content(String),
    /// The source list, replaced wholesale
    Sources(Vec<Source>),
    /// The relay reported that generation broke off
    Interrupted(String),
}

/// Receives session changes while an exchange is in flight
pub trait ExchangeObserver {
    fn on_update(&mut self, update: &SessionUpdate);

    fn on_finished(&mut self, _status: ExchangeStatus, _session: &ChatSession) {}
}

/// Observer that ignores everything
impl ExchangeObserver for () {
    fn on_update(&mut self, _update: &SessionUpdate) {}
}

/// Conversation held by the client across exchanges
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<Message>,
    sources: Vec<Source>,
    loading: bool,
    accumulator: String,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Content of the latest assistant message, if any
    pub fn last_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(|message| message.content.as_str())
    }

    /// Starts an exchange for `input` and returns the conversation to send.
    ///
    /// Blank input, or input arriving while another exchange is still loading,
    /// is refused and leaves the session untouched.
    pub fn begin_exchange(&mut self, input: &str) -> Option<Vec<Message>> {
        let input = input.trim();
        if input.is_empty() || self.loading {
            return None;
        }

        self.messages.push(Message::user(input));
        let request = self.messages.clone();

        self.messages.push(Message::assistant(""));
        self.sources.clear();
        self.accumulator.clear();
        self.loading = true;

        Some(request)
    }

    /// Applies one frame to the in-flight exchange. Frames arriving when no
    /// exchange is loading are ignored.
    pub fn apply(&mut self, frame: Frame) -> Option<SessionUpdate> {
        if !self.loading {
            debug!("Ignoring frame outside of an exchange");
            return None;
        }

        match frame {
            Frame::Text(delta) => {
                self.accumulator.push_str(&delta);
                self.set_placeholder(self.accumulator.clone());
                Some(SessionUpdate::Content(self.accumulator.clone()))
            }
            Frame::Sources(sources) => {
                self.sources = sources;
                Some(SessionUpdate::Sources(self.sources.clone()))
            }
            Frame::Error(reason) => Some(SessionUpdate::Interrupted(reason)),
        }
    }

    /// Ends the in-flight exchange. A failed exchange replaces whatever was
    /// rendered with [`FAILURE_MESSAGE`]; other outcomes keep it.
    pub fn finish(&mut self, status: ExchangeStatus) {
        if !self.loading {
            return;
        }
        if status == ExchangeStatus::Failed {
            self.set_placeholder(FAILURE_MESSAGE.to_string());
        }
        self.loading = false;
        self.accumulator.clear();
    }

    fn set_placeholder(&mut self, content: String) {
        if let Some(last) = self.messages.last_mut() {
            if last.role == Role::Assistant {
                last.content = content;
            }
        }
    }
}
