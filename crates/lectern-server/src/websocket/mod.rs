//! WebSocket connections, per-role fan-out, and the per-connection tasks.

pub mod broadcast;
pub mod connection;
pub mod session;
