//! Persisted user settings: the device password and server URL.

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::storage::FileStore;

pub const PASSWORD_KEY: &str = "password";
pub const SERVER_URL_KEY: &str = "server-url";

/// Two string cells read synchronously by the session.
pub trait SettingsStore: Send + Sync {
    fn password(&self) -> String;
    fn set_password(&self, value: &str);
    fn server_url(&self) -> String;
    fn set_server_url(&self, value: &str);

    /// A URL given at start-up replaces whatever was saved before.
    fn apply_url_override(&self, url: Option<&str>) {
        if let Some(url) = url.filter(|url| !url.is_empty()) {
            info!("Using server URL from command line: {}", url);
            self.set_server_url(url);
        }
    }
}

#[derive(Debug, Default)]
struct Cells {
    password: String,
    server_url: String,
}

/// Settings kept only for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemorySettings {
    cells: RwLock<Cells>,
}

impl MemorySettings {
    pub fn new(server_url: &str, password: &str) -> Self {
        Self {
            cells: RwLock::new(Cells {
                password: password.to_string(),
                server_url: server_url.to_string(),
            }),
        }
    }
}

impl SettingsStore for MemorySettings {
    fn password(&self) -> String {
        self.cells.read().password.clone()
    }

    fn set_password(&self, value: &str) {
        self.cells.write().password = value.to_string();
    }

    fn server_url(&self) -> String {
        self.cells.read().server_url.clone()
    }

    fn set_server_url(&self, value: &str) {
        self.cells.write().server_url = value.to_string();
    }
}

/// Settings that survive restarts, written through to a [`FileStore`].
///
/// Storage failures are logged and never surface to callers; the in-memory
/// value stays authoritative for this process.
#[derive(Debug)]
pub struct PersistedSettings {
    store: FileStore,
    cells: RwLock<Cells>,
}

impl PersistedSettings {
    pub fn load(store: FileStore) -> Self {
        let password = load_or_default(&store, PASSWORD_KEY);
        let server_url = load_or_default(&store, SERVER_URL_KEY);
        Self {
            store,
            cells: RwLock::new(Cells {
                password,
                server_url,
            }),
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.store.save(key, &value) {
            warn!("Failed to persist setting '{}': {}", key, e);
        }
    }
}

fn load_or_default(store: &FileStore, key: &str) -> String {
    match store.load::<String>(key) {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            warn!("Ignoring unreadable setting '{}': {}", key, e);
            String::new()
        }
    }
}

impl SettingsStore for PersistedSettings {
    fn password(&self) -> String {
        self.cells.read().password.clone()
    }

    fn set_password(&self, value: &str) {
        self.cells.write().password = value.to_string();
        self.persist(PASSWORD_KEY, value);
    }

    fn server_url(&self) -> String {
        self.cells.read().server_url.clone()
    }

    fn set_server_url(&self, value: &str) {
        self.cells.write().server_url = value.to_string();
        self.persist(SERVER_URL_KEY, value);
    }
}
