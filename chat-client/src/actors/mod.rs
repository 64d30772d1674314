// chat-client/src/actors/mod.rs
pub mod chat_actor;
pub mod idle_watchdog;
pub mod socket_session;
