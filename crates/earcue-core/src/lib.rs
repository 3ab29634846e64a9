//! Earcue Core - Shared configuration, errors, and message vocabulary

pub mod config;
pub mod error;
pub mod model;

pub use config::{Config, DEV_ADMIN_TOKEN};
pub use error::{Error, Result};
pub use model::{AckStatus, MessageKind, MessagePriority, MessageState};
