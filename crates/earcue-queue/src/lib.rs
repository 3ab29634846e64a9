//! Earcue Queue - per-device message queue with long-poll delivery
//!
//! Messages are enqueued for a device with a time-to-live, claimed in FIFO
//! order by the device's long-poll, and finished through an acknowledgment
//! that reconciles the reported outcome with expiry. [`NotificationHub`]
//! carries the wake signal that lets an idle poll return within milliseconds
//! of an enqueue instead of waiting out its timeout.

pub mod acks;
pub mod hub;
pub mod queue;

pub use acks::{AckOutcome, AckRequest};
pub use hub::NotificationHub;
pub use queue::{EnqueueRequest, EnqueueResponse, MessageQueue, NextMessage};
