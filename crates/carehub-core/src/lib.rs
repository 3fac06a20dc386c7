//! # carehub-core
//!
//! Foundation types, errors, and logging for the CareHub real-time hub.
//!
//! This crate provides the shared vocabulary the other CareHub crates depend on:
//!
//! - **Connection IDs**: [`ConnectionId`] as a newtype for type safety
//! - **Envelopes**: [`Envelope`] wire wrapper with [`EnvelopeType`] tags and
//!   the producer-facing [`EventKind`] subset
//! - **Models**: producer payloads (call events, residents, system status)
//! - **Errors**: [`HubError`] via `thiserror`
//! - **Logging**: subscriber bootstrap and log capture for tests

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod models;

pub use envelope::{Envelope, EnvelopeType, EventKind, now_timestamp};
pub use errors::{HubError, Result};
pub use ids::ConnectionId;
