//! Session manager: owns the transport, performs the handshake and publishes
//! one consistent [`Snapshot`] of the connection to any number of subscribers.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vintagetv_shared::{
    connect_failure_reason, parse_push, parse_server_url, ActionCommand, CloseKind, Handshake,
    Snapshot, UserAction,
};

use super::connection::{EventHandler, Transport, TransportEvent, TransportHandle, TransportOptions};
use crate::config::ClientConfig;
use crate::settings::SettingsStore;

/// What the session wants from its transport right now. Read by the event
/// handlers to tell our own closes apart from the peer's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionIntent {
    /// No transport, nothing outstanding
    Idle,
    /// A transport is live and its events drive the snapshot
    Connecting,
    /// We asked the transport to close; its remaining events are ignored
    Closing,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Used when the saved server URL is empty
    pub default_server_url: String,
    pub transport: TransportOptions,
}

impl From<&ClientConfig> for SessionConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            default_server_url: config.default_server_url.clone(),
            transport: TransportOptions::default(),
        }
    }
}

struct Link {
    intent: ConnectionIntent,
    /// Bumped for every transport we open; events carry the value they were opened with
    generation: u64,
    handle: Option<Box<dyn TransportHandle>>,
}

struct Shared {
    settings: Arc<dyn SettingsStore>,
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    snapshot: watch::Sender<Snapshot>,
    link: Mutex<Link>,
}

/// Cheaply cloneable handle to the session. Every operation returns
/// immediately; outcomes show up in the snapshot.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        transport: Arc<dyn Transport>,
        config: SessionConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::reset(None));
        Self {
            shared: Arc::new(Shared {
                settings,
                transport,
                config,
                snapshot,
                link: Mutex::new(Link {
                    intent: ConnectionIntent::Idle,
                    generation: 0,
                    handle: None,
                }),
            }),
        }
    }

    /// Drop any current connection and start a new one to the saved server URL.
    pub fn connect(&self) {
        let shared = &self.shared;
        let mut link = shared.link.lock();
        shared.teardown(&mut link, None);

        let configured = shared.settings.server_url();
        let raw_url = if configured.is_empty() {
            shared.config.default_server_url.as_str()
        } else {
            configured.as_str()
        };

        let url = match parse_server_url(raw_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Refusing to connect to '{}': {}", raw_url, e);
                shared.teardown(&mut link, Some(e.to_string()));
                return;
            }
        };

        info!("Connecting to {}", url);
        shared.update(Snapshot::with_connecting);

        link.generation += 1;
        link.intent = ConnectionIntent::Connecting;
        let generation = link.generation;
        let weak: Weak<Shared> = Arc::downgrade(shared);
        let on_event: EventHandler = Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_event(generation, event);
            }
        });
        link.handle = Some(shared.transport.open(&url, &shared.config.transport, on_event));
    }

    /// Close the connection (if any) and reset the snapshot, recording `reason` as the failure.
    pub fn disconnect(&self, reason: Option<String>) {
        let mut link = self.shared.link.lock();
        self.shared.teardown(&mut link, reason);
    }

    /// Serialize and send `payload` if a transport is live; otherwise do nothing.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) {
        let link = self.shared.link.lock();
        self.shared.send_locked(&link, payload);
    }

    /// Send a remote-control action.
    pub fn send_action(&self, action: UserAction) {
        self.send(&ActionCommand::from(action));
    }

    pub fn clear_failure(&self) {
        let _link = self.shared.link.lock();
        self.shared.update(Snapshot::without_failure);
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Receiver holding the current snapshot and notified on every replacement.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Call `callback` with the current snapshot now, then after every change.
    ///
    /// Changes published faster than the callback runs are coalesced: the
    /// callback always gets the latest whole snapshot, but may skip
    /// intermediate ones (e.g. the reset that `connect` publishes right
    /// before the connecting state). Must be called from within a tokio runtime. The callback stops when the
    /// returned [`Subscription`] is dropped.
    pub fn subscribe_fn(&self, mut callback: impl FnMut(&Snapshot) + Send + 'static) -> Subscription {
        let mut receiver = self.subscribe();
        let task = tokio::spawn(async move {
            loop {
                let snapshot = receiver.borrow_and_update().clone();
                callback(&snapshot);
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        });
        Subscription { task }
    }

    pub fn intent(&self) -> ConnectionIntent {
        self.shared.link.lock().intent
    }
}

impl Shared {
    fn update(&self, next: impl FnOnce(&Snapshot) -> Snapshot) {
        let next = next(&self.snapshot.borrow());
        self.snapshot.send_replace(next);
    }

    /// Full disconnect. The intent flips to `Closing` before the transport is
    /// asked to close so its close event is recognised as ours.
    fn teardown(&self, link: &mut Link, reason: Option<String>) {
        if let Some(handle) = link.handle.take() {
            link.intent = ConnectionIntent::Closing;
            handle.close();
            info!(
                "Disconnected{}",
                reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default()
            );
        }
        self.snapshot.send_replace(Snapshot::reset(reason));
    }

    fn send_locked<T: Serialize + ?Sized>(&self, link: &Link, payload: &T) {
        let Some(handle) = link.handle.as_ref() else {
            debug!("No live transport, dropping message");
            return;
        };
        match serde_json::to_string(payload) {
            Ok(json) => handle.send(json),
            Err(e) => error!("Serialize failed: {}", e),
        }
    }

    fn handle_event(&self, generation: u64, event: TransportEvent) {
        let mut link = self.link.lock();
        if generation != link.generation {
            debug!("Ignoring event from abandoned transport: {:?}", event);
            return;
        }

        match (link.intent, event) {
            (ConnectionIntent::Connecting, TransportEvent::Open) => {
                debug!("Transport open, sending handshake");
                let handshake = Handshake::new(self.settings.password());
                self.send_locked(&link, &handshake);
            }
            (ConnectionIntent::Connecting, TransportEvent::Message(text)) => {
                self.on_message(&text);
            }
            (ConnectionIntent::Connecting, TransportEvent::Close { code, reason }) => {
                self.on_close(&mut link, code, reason);
            }
            (ConnectionIntent::Closing, TransportEvent::Close { code, .. }) => {
                debug!("Transport confirmed close ({})", code);
                link.intent = ConnectionIntent::Idle;
            }
            (intent, event) => {
                debug!("Ignoring {:?} while {:?}", event, intent);
            }
        }
    }

    fn on_message(&self, text: &str) {
        let push = match parse_push(text) {
            Ok(push) => push,
            Err(e) => {
                warn!("Ignoring server push: {}", e);
                return;
            }
        };

        let was_connected = self.snapshot.borrow().connected;
        self.update(|snapshot| snapshot.merged(&push));
        if !was_connected {
            info!("Connected and authenticated");
        }
    }

    fn on_close(&self, link: &mut Link, code: u16, reason: String) {
        if CloseKind::classify(code).is_fatal() {
            error!("Disconnected from websocket on purpose! ({})", reason);
            let failure = (!reason.is_empty()).then_some(reason);
            self.settle(link, failure);
            return;
        }

        let authenticated = self.snapshot.borrow().authenticated;
        if authenticated {
            warn!("Connection dropped ({}), waiting for reconnect", code);
            self.update(Snapshot::with_reconnecting);
        } else {
            let failure = connect_failure_reason(&reason);
            warn!("Could not connect ({}): {}", code, failure);
            self.settle(link, Some(failure));
        }
    }

    /// Teardown after the transport already reported its close, so there is
    /// no confirmation left to wait for.
    fn settle(&self, link: &mut Link, reason: Option<String>) {
        self.teardown(link, reason);
        link.intent = ConnectionIntent::Idle;
    }
}

/// Keeps a [`SessionManager::subscribe_fn`] callback alive.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
