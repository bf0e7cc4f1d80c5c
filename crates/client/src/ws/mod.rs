//! WebSocket session with a Vintage Pi TV device.
//!
//! This module provides:
//! - A reconnecting transport (tokio-tungstenite) behind the [`Transport`] seam
//! - The [`SessionManager`], which performs the handshake and classifies closes
//! - A single [`Snapshot`](vintagetv_shared::Snapshot) published to every subscriber
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  SessionManager                     │
//! │   connect() / disconnect() / send() / subscribe()   │
//! └─────────────────────────────────────────────────────┘
//!            │ open/send/close          ▲ open/message/close
//!            ▼                          │
//!   ┌─────────────────────────────────────────────────┐
//!   │        Transport (auto-reconnect, backoff)      │
//!   └─────────────────────────────────────────────────┘
//!                         │
//!              ┌─────────────────────┐
//!              │  watch<Snapshot>    │
//!              └─────────────────────┘
//!                         │
//!          ┌──────────────┼──────────────┐
//!          ▼              ▼              ▼
//!   ┌────────────┐ ┌────────────┐ ┌────────────┐
//!   │ Subscriber │ │ Subscriber │ │ Subscriber │
//!   └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! # Usage
//!
//! Subscribers read the snapshot; they never see transport events directly.
//!
//! ```ignore
//! let session = SessionManager::new(settings, Arc::new(WsTransport), SessionConfig::from(&config));
//! let mut updates = session.subscribe();
//! session.connect();
//! while updates.changed().await.is_ok() {
//!     println!("{:?}", updates.borrow_and_update().phase());
//! }
//! ```

pub mod connection;
pub mod manager;

pub use connection::{
    EventHandler, Transport, TransportEvent, TransportHandle, TransportOptions, WsTransport,
};
pub use manager::{ConnectionIntent, SessionConfig, SessionManager, Subscription};
