// chat-client/src/actors/chat_actor.rs
use actix::prelude::*;
use common::{ChatMessage, ChatTransportKind, IdentitySession, InboundFrame, Interaction, OutboundFrame};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use uuid::Uuid;

use super::socket_session::{ConnectionEvent, SocketSession};
use crate::chat::{ChatSession, AUTHENTICATION_ERROR, CONNECTION_ERROR};
use crate::context::AppContext;
use crate::error::ClientError;
use crate::http::HttpChatClient;
use crate::identity::IdentityProvider;

/// The two mutually exclusive ways of reaching the chat backend
#[derive(Clone)]
pub enum ChatTransport {
    Socket(SocketSession),
    Http(HttpChatClient),
}

impl ChatTransport {
    /// Build the transport selected in the configuration
    pub fn from_context(context: &AppContext) -> Result<Self, ClientError> {
        match context.config.chat.transport {
            ChatTransportKind::Websocket => {
                Ok(ChatTransport::Socket(SocketSession::start(&context.config.websocket)?))
            },
            ChatTransportKind::Http => {
                Ok(ChatTransport::Http(HttpChatClient::new(&context.config.api)?))
            },
        }
    }
}

/// A live identity session, or the auth error that explains why not
async fn live_session(identity: Arc<dyn IdentityProvider>) -> Result<IdentitySession, ClientError> {
    let session = identity
        .current_session()
        .await?
        .ok_or(ClientError::MissingCredential)?;
    if !session.is_valid() {
        return Err(ClientError::ExpiredCredential);
    }
    Ok(session)
}

/// Connect with a freshly fetched credential unless already connected
async fn ensure_connected(
    identity: Arc<dyn IdentityProvider>,
    socket: SocketSession,
) -> Result<(), ClientError> {
    if socket.is_open().await? {
        return Ok(());
    }
    let session = live_session(identity).await?;
    socket.connect(&session.access_token).await
}

/// Fetch the identity session and, for the socket variant, connect
#[derive(Message)]
#[rtype(result = "Result<(), ClientError>")]
pub struct OpenChat;

/// Text typed by the user
#[derive(Message)]
#[rtype(result = "()")]
pub struct Submit(pub String);

#[derive(Message)]
#[rtype(result = "Result<(), ClientError>")]
pub struct CloseChat;

#[derive(Message)]
#[rtype(result = "ChatSnapshot")]
pub struct Snapshot;

#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
    pub history: Vec<Interaction>,
    pub loading: bool,
}

/// Drives a `ChatSession` from user input and backend frames, and publishes
/// every bubble it appends on the view channel
pub struct ChatActor {
    context: AppContext,
    session: ChatSession,
    transport: ChatTransport,
    view: mpsc::UnboundedSender<ChatMessage>,
    /// Set by `CloseChat`; input is dropped until the next `OpenChat`
    closed: bool,
    /// Who the current chat session id belongs to
    signed_in_as: Option<String>,
}

impl ChatActor {
    pub fn new(
        context: AppContext,
        transport: ChatTransport,
        view: mpsc::UnboundedSender<ChatMessage>,
    ) -> Self {
        let chat = &context.config.chat;
        let session = ChatSession::new(chat.lang.clone()).with_greeting(chat.greeting.as_deref());
        Self {
            context,
            session,
            transport,
            view,
            closed: false,
            signed_in_as: None,
        }
    }

    fn publish(&self, message: ChatMessage) {
        // The view may already be gone during shutdown
        let _ = self.view.send(message);
    }

    fn publish_error(&mut self, text: &str) {
        let message = self.session.notify_error(text);
        self.publish(message);
    }

    fn publish_failure(&mut self, error: &ClientError) {
        let text = if error.is_auth() { AUTHENTICATION_ERROR } else { CONNECTION_ERROR };
        self.publish_error(text);
    }

    fn apply(&mut self, frame: &InboundFrame) {
        if let Some(message) = self.session.receive(frame) {
            self.publish(message);
        }
    }

    /// A new login (different user, or opening again after `CloseChat`)
    /// gets a fresh chat session id
    fn note_sign_in(&mut self, session: &IdentitySession, reopening: bool) {
        let user = session.username.clone().unwrap_or_else(|| session.access_token.clone());
        let changed_user = self.signed_in_as.as_ref().map_or(false, |known| *known != user);

        if reopening || changed_user {
            self.session.rotate_session_id();
            tracing::info!(session_id = %self.session.session_id(), "New chat session for this login");
        }
        self.signed_in_as = Some(user);
    }

    fn ask_over_socket(&mut self, socket: SocketSession, frame: OutboundFrame, ctx: &mut Context<Self>) {
        let identity = self.context.identity.clone();

        // Waits so questions go out in submit order, reconnects included
        ctx.wait(
            async move {
                ensure_connected(identity, socket.clone()).await?;
                socket.send_message(frame);
                Ok::<(), ClientError>(())
            }
            .into_actor(self)
            .map(|result, act, _ctx| {
                if let Err(e) = result {
                    tracing::warn!("Could not reach the chat gateway: {}", e);
                    act.publish_failure(&e);
                }
            }),
        );
    }

    fn ask_over_http(&mut self, client: HttpChatClient, frame: OutboundFrame, ctx: &mut Context<Self>) {
        let OutboundFrame::SendMessage(question) = frame else {
            return;
        };
        let identity = self.context.identity.clone();

        ctx.spawn(
            async move {
                let token = identity.current_session().await?.map(|s| s.access_token);
                client.ask(&question, token.as_deref()).await
            }
            .into_actor(self)
            .map(|result, act, _ctx| match result {
                Ok(frame) => act.apply(&frame),
                Err(e) => {
                    tracing::warn!("Chat request failed: {}", e);
                    act.publish_error(CONNECTION_ERROR);
                },
            }),
        );
    }
}

impl Actor for ChatActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(session_id = %self.session.session_id(), "Chat session started");

        if let ChatTransport::Socket(socket) = &self.transport {
            ctx.add_stream(socket.messages());
            ctx.add_stream(socket.connection_events());
        }

        for message in self.session.messages() {
            self.publish(message.clone());
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(session_id = %self.session.session_id(), "Chat session ended");
    }
}

impl StreamHandler<Result<InboundFrame, BroadcastStreamRecvError>> for ChatActor {
    fn handle(&mut self, item: Result<InboundFrame, BroadcastStreamRecvError>, _ctx: &mut Self::Context) {
        match item {
            Ok(frame) => self.apply(&frame),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Chat fell behind the socket relay, frames dropped");
            },
        }
    }

    // The relay outlives single connections; keep the actor alive regardless
    fn finished(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("Socket relay stream ended");
    }
}

impl StreamHandler<Result<ConnectionEvent, BroadcastStreamRecvError>> for ChatActor {
    fn handle(&mut self, item: Result<ConnectionEvent, BroadcastStreamRecvError>, _ctx: &mut Self::Context) {
        match item {
            Ok(ConnectionEvent::Opened { connection }) => {
                tracing::debug!(%connection, "Chat connection open");
            },
            Ok(ConnectionEvent::Dropped { connection, reason }) => {
                tracing::warn!(%connection, %reason, "Chat connection lost, will reconnect on next question");
                if let Some(message) = self.session.connection_lost() {
                    self.publish(message);
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Chat fell behind connection events");
            },
        }
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("Connection event stream ended");
    }
}

impl Handler<OpenChat> for ChatActor {
    type Result = ResponseActFuture<Self, Result<(), ClientError>>;

    fn handle(&mut self, _msg: OpenChat, _ctx: &mut Self::Context) -> Self::Result {
        let reopening = std::mem::replace(&mut self.closed, false);
        let identity = self.context.identity.clone();
        let socket = match &self.transport {
            ChatTransport::Socket(socket) => Some(socket.clone()),
            ChatTransport::Http(_) => None,
        };

        Box::pin(
            async move {
                let session = live_session(identity).await?;
                if let Some(socket) = socket {
                    if !socket.is_open().await? {
                        socket.connect(&session.access_token).await?;
                    }
                }
                Ok::<_, ClientError>(session)
            }
            .into_actor(self)
            .map(move |result, act, _ctx| match result {
                Ok(session) => {
                    act.note_sign_in(&session, reopening);
                    Ok(())
                },
                Err(e) => {
                    tracing::warn!("Could not open the chat: {}", e);
                    act.publish_failure(&e);
                    Err(e)
                },
            }),
        )
    }
}

impl Handler<Submit> for ChatActor {
    type Result = ();

    fn handle(&mut self, msg: Submit, ctx: &mut Self::Context) -> Self::Result {
        if self.closed {
            tracing::warn!("Chat is closed, question dropped");
            return;
        }
        let Some(frame) = self.session.submit(&msg.0) else {
            return;
        };
        if let Some(sent) = self.session.messages().last().cloned() {
            self.publish(sent);
        }

        match self.transport.clone() {
            ChatTransport::Socket(socket) => self.ask_over_socket(socket, frame, ctx),
            ChatTransport::Http(client) => self.ask_over_http(client, frame, ctx),
        }
    }
}

impl Handler<CloseChat> for ChatActor {
    type Result = ResponseFuture<Result<(), ClientError>>;

    fn handle(&mut self, _msg: CloseChat, _ctx: &mut Self::Context) -> Self::Result {
        self.closed = true;
        self.signed_in_as = None;
        let socket = match &self.transport {
            ChatTransport::Socket(socket) => Some(socket.clone()),
            ChatTransport::Http(_) => None,
        };
        Box::pin(async move {
            if let Some(socket) = socket {
                socket.close().await?;
            }
            Ok(())
        })
    }
}

impl Handler<Snapshot> for ChatActor {
    type Result = MessageResult<Snapshot>;

    fn handle(&mut self, _msg: Snapshot, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(ChatSnapshot {
            session_id: self.session.session_id(),
            messages: self.session.messages().to_vec(),
            history: self.session.history().to_vec(),
            loading: self.session.is_loading(),
        })
    }
}
