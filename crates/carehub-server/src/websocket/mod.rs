//! WebSocket connection registry, broadcasting, session protocol, and event ingest.

pub mod adapter;
pub mod broadcast;
pub mod connection;
pub mod protocol;
pub mod registry;
pub mod session;
