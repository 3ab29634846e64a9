//! Earcue Server - Axum-based HTTP API server
//!
//! This crate wires the pairing, queue, and audio services into the
//! public HTTP surface consumed by operators and paired devices.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;
