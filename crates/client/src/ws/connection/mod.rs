//! Auto-reconnecting message transport.
//!
//! This module provides the transport seam used by the session manager and
//! conditionally includes the tokio-tungstenite implementation.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

/// Event emitted by a transport, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Socket opened (initially or after a reconnect)
    Open,
    /// Text frame received
    Message(String),
    /// Socket closed. The transport retries on its own unless closed by us.
    Close { code: u16, reason: String },
}

/// Callback receiving transport events.
pub type EventHandler = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Configuration for reconnect behavior and send buffering
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOptions {
    /// Messages kept while the socket is down (0 = drop them)
    pub max_enqueued_messages: usize,
    /// Delay before the first retry
    pub min_reconnection_delay: Duration,
    /// Upper bound on the retry delay
    pub max_reconnection_delay: Duration,
    /// Multiplier applied to the delay for each consecutive failure
    pub reconnection_delay_grow_factor: f64,
    /// Give up on opening a socket after this long
    pub connection_timeout: Duration,
    /// Maximum consecutive retries (`None` = infinite)
    pub max_retries: Option<u32>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            max_enqueued_messages: 0,
            min_reconnection_delay: Duration::from_millis(1000),
            max_reconnection_delay: Duration::from_millis(2000),
            reconnection_delay_grow_factor: 1.3,
            connection_timeout: Duration::from_millis(4000),
            max_retries: None,
        }
    }
}

impl TransportOptions {
    /// Calculate delay for a given retry number (0 = first retry)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.reconnection_delay_grow_factor.powi(attempt.min(64) as i32);
        let delay_ms = (self.min_reconnection_delay.as_millis() as f64 * factor).round();
        let max_ms = self.max_reconnection_delay.as_millis() as f64;
        Duration::from_millis(delay_ms.min(max_ms) as u64)
    }

    /// True once `attempt` consecutive failures exhaust the retry budget.
    pub fn retries_exhausted(&self, attempt: u32) -> bool {
        self.max_retries.is_some_and(|max| attempt > max)
    }
}

/// Live transport instance.
///
/// Implementations must not call the event handler from inside `send` or
/// `close`; events are delivered from the transport's own task.
pub trait TransportHandle: Send {
    /// Transmit a text frame. Dropped (or buffered, per options) while the socket is down.
    fn send(&self, text: String);

    /// Close the socket and stop reconnecting.
    fn close(&self);
}

/// Factory for transport instances.
pub trait Transport: Send + Sync {
    /// Start connecting to `url`. The handler must not be called before this returns.
    fn open(
        &self,
        url: &Url,
        options: &TransportOptions,
        on_event: EventHandler,
    ) -> Box<dyn TransportHandle>;
}

mod connection_native;
pub use connection_native::WsTransport;

#[cfg(test)]
pub(crate) mod mock;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delays_are_bounded() {
        let options = TransportOptions::default();
        assert_eq!(options.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(options.delay_for_attempt(1), Duration::from_millis(1300));
        assert_eq!(options.delay_for_attempt(2), Duration::from_millis(1690));
        assert_eq!(options.delay_for_attempt(3), Duration::from_millis(2000));
        assert_eq!(options.delay_for_attempt(u32::MAX), Duration::from_millis(2000));
    }

    #[test]
    fn retries_unlimited_by_default() {
        let options = TransportOptions::default();
        assert!(!options.retries_exhausted(u32::MAX));

        let limited = TransportOptions {
            max_retries: Some(2),
            ..TransportOptions::default()
        };
        assert!(!limited.retries_exhausted(2));
        assert!(limited.retries_exhausted(3));
    }
}
