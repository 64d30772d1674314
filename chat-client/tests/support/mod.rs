// chat-client/tests/support/mod.rs
#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    /// Greets, answers questions, counts pings
    Echo,
    /// Greets and then closes the connection
    HangUp,
    /// Hangs up on the first connection, echoes on every later one
    HangUpOnce,
    /// Greets, counts pings, closes instead of answering a question
    DropOnQuestion,
}

/// Stand-in for the chat gateway on a random local port
#[derive(Clone)]
pub struct Gateway {
    pub addr: SocketAddr,
    pub accepted: Arc<AtomicUsize>,
    pub pings: Arc<AtomicUsize>,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl Gateway {
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

pub fn hello_frame() -> Value {
    json!({"connectionId": "abc", "requestId": "r-1", "message": "connected"})
}

pub async fn spawn_gateway(mode: GatewayMode) -> Gateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gateway = Gateway {
        addr: listener.local_addr().unwrap(),
        accepted: Arc::new(AtomicUsize::new(0)),
        pings: Arc::new(AtomicUsize::new(0)),
        queries: Arc::new(Mutex::new(Vec::new())),
    };

    let state = gateway.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let index = state.accepted.fetch_add(1, Ordering::SeqCst) + 1;
            let state = state.clone();
            let hang_up = match mode {
                GatewayMode::HangUp => true,
                GatewayMode::HangUpOnce => index == 1,
                _ => false,
            };

            tokio::spawn(async move {
                let queries = state.queries.clone();
                let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let query = req.uri().query().unwrap_or_default().to_string();
                    queries.lock().unwrap().push(query);
                    Ok(resp)
                };
                let Ok(ws) = accept_hdr_async(stream, callback).await else {
                    return;
                };
                let (mut sink, mut source) = ws.split();

                let _ = sink.send(Message::Text(hello_frame().to_string())).await;
                if hang_up {
                    let _ = sink.close().await;
                    return;
                }

                while let Some(Ok(msg)) = source.next().await {
                    let Message::Text(text) = msg else {
                        continue;
                    };
                    let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    match frame["action"].as_str() {
                        Some("ping") => {
                            state.pings.fetch_add(1, Ordering::SeqCst);
                        },
                        Some("sendMessage") if mode == GatewayMode::DropOnQuestion => {
                            let _ = sink.close().await;
                            return;
                        },
                        Some("sendMessage") => {
                            let question = frame["data"]["question"].as_str().unwrap_or_default();
                            let answer = json!({
                                "status_response": true,
                                "response": format!("echo: {} %[ref1]%", question),
                                "error": null,
                            });
                            let _ = sink.send(Message::Text(answer.to_string())).await;
                        },
                        _ => {},
                    }
                }
            });
        }
    });

    gateway
}

/// An address nothing listens on
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}", addr)
}

/// Poll `check` until it holds or `limit` passes
pub async fn eventually<F: Fn() -> bool>(limit: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
