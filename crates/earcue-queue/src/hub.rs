//! Per-device wake signal for long-poll delivery

use std::collections::HashMap;

use tokio::sync::{watch, Mutex};

/// Wakes long-poll waiters when a device's queue changes
///
/// Each device gets a watch channel carrying a monotonic counter; `signal`
/// bumps it and every current subscriber observes the bump. Nothing is
/// persisted: a signal fired before `subscribe` is invisible to that
/// subscriber, which the poll loop covers by checking the queue after
/// subscribing.
pub struct NotificationHub {
    channels: Mutex<HashMap<String, watch::Sender<u64>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to wake-ups for a device
    ///
    /// Channels with no remaining subscribers are evicted first, keeping the
    /// table bounded by the number of devices currently waiting.
    pub async fn subscribe(&self, device_id: &str) -> watch::Receiver<u64> {
        let mut channels = self.channels.lock().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);

        channels
            .entry(device_id.to_string())
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }

    /// Wake all current waiters for a device
    ///
    /// A device with no waiters has no channel; the signal is dropped, as the
    /// queue itself is what carries the message.
    pub async fn signal(&self, device_id: &str) {
        let channels = self.channels.lock().await;
        if let Some(tx) = channels.get(device_id) {
            tx.send_modify(|n| *n += 1);
        }
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}
