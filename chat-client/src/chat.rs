// chat-client/src/chat.rs
use common::{
    strip_markers, ChatAnswer, ChatMessage, ChatQuestion, InboundFrame, Interaction,
    InteractionHistory, OutboundFrame,
};
use uuid::Uuid;

pub const CONNECTION_ERROR: &str = "Could not reach the chat service. Please try again later.";
pub const AUTHENTICATION_ERROR: &str = "Your session is not valid. Please sign in again.";
pub const INVALID_FORMAT_ERROR: &str = "Received a response in an invalid format.";
pub const GENERIC_ERROR: &str = "Something went wrong while answering. Please try again.";

/// Conversation state behind the chat view
#[derive(Debug)]
pub struct ChatSession {
    session_id: Uuid,
    lang: String,
    messages: Vec<ChatMessage>,
    history: InteractionHistory,
    loading: bool,
    pending_question: Option<String>,
}

impl ChatSession {
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            lang: lang.into(),
            messages: Vec::new(),
            history: InteractionHistory::default(),
            loading: false,
            pending_question: None,
        }
    }

    pub fn with_greeting(mut self, greeting: Option<&str>) -> Self {
        if let Some(text) = greeting {
            self.messages.push(ChatMessage::received(text));
        }
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Start a new backend conversation: new id, no carried-over context.
    /// The visible bubbles stay.
    pub fn rotate_session_id(&mut self) {
        self.session_id = Uuid::new_v4();
        self.history.clear();
        self.loading = false;
        self.pending_question = None;
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn history(&self) -> &InteractionHistory {
        &self.history
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Record the user's question and build the frame that carries it.
    /// Blank input is ignored.
    pub fn submit(&mut self, text: &str) -> Option<OutboundFrame> {
        let question = text.trim();
        if question.is_empty() {
            return None;
        }

        self.messages.push(ChatMessage::sent(question));
        self.loading = true;
        self.pending_question = Some(question.to_string());

        Some(OutboundFrame::SendMessage(self.question(question)))
    }

    pub fn question(&self, question: &str) -> ChatQuestion {
        ChatQuestion {
            session_id: self.session_id.to_string(),
            lang: self.lang.clone(),
            question: question.to_string(),
            history: self.history.to_vec(),
        }
    }

    /// Apply an inbound frame. Returns the bubble it produced, if any.
    pub fn receive(&mut self, frame: &InboundFrame) -> Option<ChatMessage> {
        match frame {
            InboundFrame::ChatAnswer(answer) => Some(self.apply_answer(answer)),
            InboundFrame::ConnectionInfo(info) => {
                tracing::debug!(
                    connection_id = %info.connection_id,
                    request_id = ?info.request_id,
                    "Connection info received"
                );
                None
            },
            InboundFrame::Unrecognized { reason, raw } => {
                tracing::warn!(%reason, %raw, "Unrecognized frame");
                self.loading = false;
                self.pending_question = None;
                Some(self.append(ChatMessage::error(INVALID_FORMAT_ERROR)))
            },
        }
    }

    /// Show a failure that did not come from the backend (auth, transport)
    pub fn notify_error(&mut self, text: &str) -> ChatMessage {
        self.loading = false;
        self.pending_question = None;
        self.append(ChatMessage::error(text))
    }

    /// The transport dropped. Only a question still waiting for its answer
    /// is worth a bubble.
    pub fn connection_lost(&mut self) -> Option<ChatMessage> {
        if !self.loading {
            return None;
        }
        Some(self.notify_error(CONNECTION_ERROR))
    }

    fn apply_answer(&mut self, answer: &ChatAnswer) -> ChatMessage {
        self.loading = false;
        let question = self.pending_question.take();

        match answer.text() {
            Some(text) => {
                let text = strip_markers(text);
                if let Some(question) = question {
                    self.history.push(Interaction::new(question, text.clone()));
                }
                self.append(ChatMessage::received(text))
            },
            None => {
                let text = answer
                    .error
                    .as_deref()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or(GENERIC_ERROR);
                tracing::warn!(error = %text, "Chat backend reported an error");
                self.append(ChatMessage::error(text))
            },
        }
    }

    fn append(&mut self, message: ChatMessage) -> ChatMessage {
        self.messages.push(message.clone());
        message
    }
}
