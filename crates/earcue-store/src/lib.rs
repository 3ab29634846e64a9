//! SQLite storage for the Earcue server.
//!
//! Provides persistence for devices, pairing codes, audio blobs, and the
//! per-device message queue. All SQL lives in this crate; the one-connection
//! pool plus explicit transactions serialize every compound operation.

mod db;
mod models;
mod queries;
mod queries_messages;


pub use db::{millis_to_utc, now_millis, Database, DatabaseError};
pub use models::*;
pub use queries::RedeemPairingParams;
pub use queries_messages::EnqueueMessageParams;
