//! Real-time side of Bolo: authenticated WebSocket connections, per-user
//! rooms, the send/typing/read-receipt pipeline and the bot responder.

pub mod auth;
pub mod bot;
pub mod connection;
pub mod error;
pub mod generator;
pub mod pipeline;
pub mod rooms;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
