pub mod activity;
pub mod actors;
pub mod chat;
pub mod context;
pub mod error;
pub mod http;
pub mod identity;

pub use activity::{ActivitySource, RawInput, Throttle};
pub use actors::chat_actor::{ChatActor, ChatSnapshot, ChatTransport, CloseChat, OpenChat, Snapshot, Submit};
pub use actors::idle_watchdog::{
    ActivityPulse, IdleWatchdog, StartMonitoring, StopMonitoring, WatchdogSignals, WatchdogState,
    WatchdogStatus, WatchdogTimings,
};
pub use actors::socket_session::{ConnectionEvent, SocketSession, SocketSessionActor};
pub use chat::ChatSession;
pub use context::AppContext;
pub use error::ClientError;
pub use http::HttpChatClient;
pub use identity::{IdentityProvider, TokenIdentity};
