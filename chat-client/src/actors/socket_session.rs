// chat-client/src/actors/socket_session.rs
use actix::prelude::*;
use common::{InboundFrame, OutboundFrame, WebSocketConfig};
use futures_util::{SinkExt, StreamExt};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;
use uuid::Uuid;

use crate::error::ClientError;

const RELAY_CAPACITY: usize = 256;
const OUTBOUND_BUFFER: usize = 100;
const EVENT_CAPACITY: usize = 16;

/// Query parameter carrying the bearer credential
pub const CREDENTIAL_PARAM: &str = "Authorization";

type Transport = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a connection unless one is already open
#[derive(Message)]
#[rtype(result = "Result<(), ClientError>")]
pub struct Connect {
    pub credential: String,
}

/// Best-effort send; dropped with an error log when nothing is open
#[derive(Message)]
#[rtype(result = "()")]
pub struct SendFrame(pub OutboundFrame);

#[derive(Message)]
#[rtype(result = "()")]
pub struct Close;

#[derive(Message)]
#[rtype(result = "bool")]
pub struct IsOpen;

/// Reported by the reader half, tagged so events from a replaced
/// connection can be ignored
#[derive(Message)]
#[rtype(result = "()")]
pub enum TransportEvent {
    Text { connection: Uuid, text: String },
    Alive { connection: Uuid },
    Closed { connection: Uuid, error: Option<String> },
}

/// Connection lifecycle, published next to the frame relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened { connection: Uuid },
    /// Lost without `close()` being called: peer close, transport error
    /// or a silent connection past the pong timeout
    Dropped { connection: Uuid, reason: String },
}

struct Connection {
    id: Uuid,
    outbound: mpsc::Sender<WsMessage>,
    keep_alive: SpawnHandle,
    reader: SpawnHandle,
    last_inbound: Instant,
}

/// Owns the single transport connection and the relay its frames are
/// published on
pub struct SocketSessionActor {
    endpoint: Url,
    keep_alive: Duration,
    pong_timeout: Option<Duration>,
    relay: broadcast::Sender<InboundFrame>,
    events: broadcast::Sender<ConnectionEvent>,
    connection: Option<Connection>,
}

/// Endpoint with the credential as the `Authorization` query parameter,
/// replacing any credential already present
pub fn endpoint_with_credential(endpoint: &Url, credential: &str) -> Url {
    let kept: Vec<(String, String)> = endpoint
        .query_pairs()
        .filter(|(key, _)| key != CREDENTIAL_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(CREDENTIAL_PARAM, credential);
    url
}

impl SocketSessionActor {
    pub fn new(
        endpoint: Url,
        keep_alive: Duration,
        pong_timeout: Option<Duration>,
        relay: broadcast::Sender<InboundFrame>,
        events: broadcast::Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            endpoint,
            keep_alive,
            pong_timeout,
            relay,
            events,
            connection: None,
        }
    }

    fn attach(&mut self, stream: Transport, ctx: &mut Context<Self>) {
        let id = Uuid::new_v4();
        let (mut sink, mut source) = stream.split();
        let (tx, mut rx) = mpsc::channel::<WsMessage>(OUTBOUND_BUFFER);

        // Writer: drains the queue until the sender is dropped, then sends
        // the close frame
        ctx.spawn(
            async move {
                while let Some(msg) = rx.recv().await {
                    if let Err(e) = sink.send(msg).await {
                        tracing::warn!(connection = %id, "Error sending on WebSocket: {}", e);
                        break;
                    }
                }
                let _ = sink.close().await;
            }
            .into_actor(self),
        );

        let addr = ctx.address();
        let reader = ctx.spawn(
            async move {
                let mut error = None;
                while let Some(msg) = source.next().await {
                    match msg {
                        Ok(WsMessage::Text(text)) => {
                            addr.do_send(TransportEvent::Text { connection: id, text });
                        },
                        Ok(WsMessage::Binary(data)) => match String::from_utf8(data) {
                            Ok(text) => addr.do_send(TransportEvent::Text { connection: id, text }),
                            Err(_) => tracing::warn!(connection = %id, "Dropping non UTF-8 binary frame"),
                        },
                        Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {
                            addr.do_send(TransportEvent::Alive { connection: id });
                        },
                        Ok(WsMessage::Close(frame)) => {
                            tracing::info!(connection = %id, ?frame, "Server closed the connection");
                            break;
                        },
                        Ok(WsMessage::Frame(_)) => {},
                        Err(e) => {
                            error = Some(e.to_string());
                            break;
                        },
                    }
                }
                addr.do_send(TransportEvent::Closed { connection: id, error });
            }
            .into_actor(self),
        );

        let keep_alive = ctx.run_interval(self.keep_alive, |act, ctx| {
            act.keep_alive_tick(ctx);
        });

        self.connection = Some(Connection {
            id,
            outbound: tx,
            keep_alive,
            reader,
            last_inbound: Instant::now(),
        });
        tracing::info!(connection = %id, "WebSocket connection open");
        let _ = self.events.send(ConnectionEvent::Opened { connection: id });
    }

    fn keep_alive_tick(&mut self, ctx: &mut Context<Self>) {
        let Some(conn) = &self.connection else {
            return;
        };

        if let Some(timeout) = self.pong_timeout {
            if conn.last_inbound.elapsed() > timeout {
                tracing::warn!(
                    connection = %conn.id,
                    "Nothing received for {:?}, dropping connection",
                    timeout
                );
                self.drop_connection(format!("nothing received for {:?}", timeout), ctx);
                return;
            }
        }

        tracing::trace!(connection = %conn.id, "Sending keep-alive");
        self.transmit(&OutboundFrame::Ping);
    }

    fn transmit(&self, frame: &OutboundFrame) {
        let Some(conn) = &self.connection else {
            tracing::error!("WebSocket is not connected, cannot send the message");
            return;
        };

        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to serialize outbound frame: {}", e);
                return;
            }
        };

        if let Err(e) = conn.outbound.try_send(WsMessage::Text(text)) {
            tracing::warn!(connection = %conn.id, "Outbound queue rejected frame: {}", e);
        }
    }

    fn is_current(&self, connection: Uuid) -> bool {
        self.connection.as_ref().map_or(false, |conn| conn.id == connection)
    }

    fn touch(&mut self, connection: Uuid) {
        if let Some(conn) = self.connection.as_mut().filter(|conn| conn.id == connection) {
            conn.last_inbound = Instant::now();
        }
    }

    /// Teardown that was not asked for; subscribers are told so the
    /// orchestrator can reconnect
    fn drop_connection(&mut self, reason: String, ctx: &mut Context<Self>) {
        let Some(connection) = self.connection.as_ref().map(|conn| conn.id) else {
            return;
        };
        self.teardown(ctx);
        let _ = self.events.send(ConnectionEvent::Dropped { connection, reason });
    }

    /// Stop the keep-alive and the reader, and let the writer close the socket
    fn teardown(&mut self, ctx: &mut Context<Self>) -> bool {
        let Some(conn) = self.connection.take() else {
            return false;
        };

        ctx.cancel_future(conn.keep_alive);
        ctx.cancel_future(conn.reader);
        drop(conn.outbound);

        tracing::info!(connection = %conn.id, "WebSocket connection closed");
        true
    }
}

impl Actor for SocketSessionActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!(endpoint = %self.endpoint, "Socket session manager started");
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.teardown(ctx);
        tracing::debug!("Socket session manager stopped");
    }
}

impl Handler<Connect> for SocketSessionActor {
    // Atomic so a second connect waits for the first and then sees it open
    type Result = AtomicResponse<Self, Result<(), ClientError>>;

    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) -> Self::Result {
        if let Some(conn) = &self.connection {
            tracing::debug!(connection = %conn.id, "Already connected, reusing the open connection");
            return AtomicResponse::new(Box::pin(actix::fut::ready(Ok(()))));
        }

        if msg.credential.trim().is_empty() {
            return AtomicResponse::new(Box::pin(actix::fut::ready(Err(ClientError::MissingCredential))));
        }

        let url = endpoint_with_credential(&self.endpoint, &msg.credential);
        tracing::info!(endpoint = %self.endpoint, "Opening WebSocket connection");

        AtomicResponse::new(Box::pin(
            async move { connect_async(url.as_str()).await }
                .into_actor(self)
                .map(|result, act, ctx| match result {
                    Ok((stream, _response)) => {
                        act.attach(stream, ctx);
                        Ok(())
                    },
                    Err(e) => {
                        tracing::warn!("WebSocket connection failed: {}", e);
                        Err(ClientError::from(e))
                    },
                }),
        ))
    }
}

impl Handler<SendFrame> for SocketSessionActor {
    type Result = ();

    fn handle(&mut self, msg: SendFrame, _ctx: &mut Self::Context) -> Self::Result {
        self.transmit(&msg.0);
    }
}

impl Handler<Close> for SocketSessionActor {
    type Result = ();

    fn handle(&mut self, _msg: Close, ctx: &mut Self::Context) -> Self::Result {
        if !self.teardown(ctx) {
            tracing::debug!("Close requested with no open connection");
        }
    }
}

impl Handler<IsOpen> for SocketSessionActor {
    type Result = bool;

    fn handle(&mut self, _msg: IsOpen, _ctx: &mut Self::Context) -> Self::Result {
        self.connection.is_some()
    }
}

impl Handler<TransportEvent> for SocketSessionActor {
    type Result = ();

    fn handle(&mut self, event: TransportEvent, ctx: &mut Self::Context) -> Self::Result {
        match event {
            TransportEvent::Text { connection, text } => {
                if !self.is_current(connection) {
                    return;
                }
                self.touch(connection);

                let frame = InboundFrame::parse(&text);
                tracing::debug!(connection = %connection, kind = frame.kind(), "WebSocket frame received");
                // No subscribers is not an error; the relay stays up
                let _ = self.relay.send(frame);
            },
            TransportEvent::Alive { connection } => self.touch(connection),
            TransportEvent::Closed { connection, error } => {
                if !self.is_current(connection) {
                    return;
                }
                let reason = match error {
                    Some(e) => {
                        tracing::warn!(connection = %connection, "WebSocket error, connection dropped: {}", e);
                        e
                    },
                    None => {
                        tracing::info!(connection = %connection, "WebSocket closed by peer");
                        "closed by peer".to_string()
                    },
                };
                self.drop_connection(reason, ctx);
            },
        }
    }
}

/// Cloneable handle to the socket session manager
#[derive(Clone)]
pub struct SocketSession {
    addr: Addr<SocketSessionActor>,
    relay: broadcast::Sender<InboundFrame>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl SocketSession {
    /// Start the manager actor. Must run inside an actix system.
    pub fn start(config: &WebSocketConfig) -> Result<Self, ClientError> {
        let endpoint = Url::parse(&config.url)?;
        let (relay, _) = broadcast::channel(RELAY_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let addr = SocketSessionActor::new(
            endpoint,
            config.keep_alive_interval(),
            config.pong_timeout(),
            relay.clone(),
            events.clone(),
        ).start();

        Ok(Self { addr, relay, events })
    }

    pub async fn connect(&self, credential: &str) -> Result<(), ClientError> {
        if credential.trim().is_empty() {
            return Err(ClientError::MissingCredential);
        }
        self.addr.send(Connect { credential: credential.to_string() }).await?
    }

    pub fn send_message(&self, frame: OutboundFrame) {
        self.addr.do_send(SendFrame(frame));
    }

    /// Frames from every connection this manager opens, in arrival order
    pub fn messages(&self) -> BroadcastStream<InboundFrame> {
        BroadcastStream::new(self.relay.subscribe())
    }

    pub fn connection_events(&self) -> BroadcastStream<ConnectionEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        self.addr.send(Close).await?;
        Ok(())
    }

    pub async fn is_open(&self) -> Result<bool, ClientError> {
        Ok(self.addr.send(IsOpen).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_added_as_query_parameter() {
        let endpoint = Url::parse("wss://gateway.example.com/dev").unwrap();
        let url = endpoint_with_credential(&endpoint, "abc.def");
        assert_eq!(url.as_str(), "wss://gateway.example.com/dev?Authorization=abc.def");
    }

    #[test]
    fn test_existing_credential_is_replaced() {
        let endpoint = Url::parse("ws://localhost:3001/?stage=dev&Authorization=old").unwrap();
        let url = endpoint_with_credential(&endpoint, "new");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("stage".to_string(), "dev".to_string()),
                ("Authorization".to_string(), "new".to_string()),
            ]
        );
    }

    #[test]
    fn test_credential_is_percent_encoded() {
        let endpoint = Url::parse("ws://localhost:3001").unwrap();
        let url = endpoint_with_credential(&endpoint, "a b&c");
        assert_eq!(url.query(), Some("Authorization=a+b%26c"));
    }
}
