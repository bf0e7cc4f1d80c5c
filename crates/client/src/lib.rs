//! Vintage Pi TV client
//!
//! Keeps a local view of a Vintage Pi TV device in sync over a persistent
//! websocket and sends remote-control actions to it.

pub mod config;
pub mod logging;
pub mod settings;
pub mod storage;
pub mod ws;

pub use config::ClientConfig;
pub use settings::{MemorySettings, PersistedSettings, SettingsStore};
pub use storage::{FileStore, StorageError};
pub use ws::{SessionConfig, SessionManager, WsTransport};
