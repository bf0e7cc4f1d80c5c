//! Session snapshot model and helpers over the device's pushed state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::PushError;

/// Pushed keys that must all be present once the session has authenticated.
pub const REQUIRED_STATE_KEYS: [&str; 5] =
    ["current_rating", "ratings", "state", "version", "videos_db"];

/// Connection flags owned by the client; pushed values for these are ignored.
const CONNECTION_KEYS: [&str; 4] = ["authenticated", "connecting", "connected", "failure"];

/// Point-in-time view of the connection and of the device's pushed state.
///
/// Snapshots are never patched in place once published: every change builds a
/// new value and replaces the old one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Handshake succeeded at least once since the last full disconnect
    pub authenticated: bool,
    /// A connection attempt (or reconnection) is outstanding
    pub connecting: bool,
    /// Transport is open and the device has answered the handshake
    pub connected: bool,
    /// Why the last connection ended, if it ended badly
    pub failure: Option<String>,
    pub current_rating: Option<Value>,
    pub ratings: Option<Value>,
    pub state: Option<Value>,
    pub version: Option<Value>,
    pub videos_db: Option<Value>,
    /// Any other top-level keys the device pushed (e.g. `volume`)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Coarse phase derived from the snapshot flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Reset,
    Connecting,
    Connected,
    Reconnecting,
}

impl Snapshot {
    /// The all-absent state, optionally carrying a failure reason.
    pub fn reset(failure: Option<String>) -> Self {
        Self {
            failure,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match (self.connected, self.connecting, self.authenticated) {
            (true, _, _) => SessionPhase::Connected,
            (false, true, true) => SessionPhase::Reconnecting,
            (false, true, false) => SessionPhase::Connecting,
            (false, false, _) => SessionPhase::Reset,
        }
    }

    /// A new attempt is outstanding; everything else is kept.
    pub fn with_connecting(&self) -> Self {
        Self {
            connecting: true,
            ..self.clone()
        }
    }

    /// Transport dropped after authenticating; stale pushed state is kept while it retries.
    pub fn with_reconnecting(&self) -> Self {
        Self {
            connected: false,
            connecting: true,
            ..self.clone()
        }
    }

    pub fn without_failure(&self) -> Self {
        Self {
            failure: None,
            ..self.clone()
        }
    }

    /// Merge a server push and mark the session authenticated and connected.
    pub fn merged(&self, push: &Map<String, Value>) -> Self {
        let mut next = self.clone();
        for (key, value) in push {
            let value = if value.is_null() {
                None
            } else {
                Some(value.clone())
            };
            match key.as_str() {
                "current_rating" => next.current_rating = value,
                "ratings" => next.ratings = value,
                "state" => next.state = value,
                "version" => next.version = value,
                "videos_db" => next.videos_db = value,
                k if CONNECTION_KEYS.contains(&k) => {}
                _ => match value {
                    Some(value) => {
                        next.extra.insert(key.clone(), value);
                    }
                    None => {
                        next.extra.remove(key);
                    }
                },
            }
        }
        next.authenticated = true;
        next.connecting = false;
        next.connected = true;
        next.failure = None;
        next
    }

    /// True when every required pushed field is present.
    pub fn has_required_state(&self) -> bool {
        self.current_rating.is_some()
            && self.ratings.is_some()
            && self.state.is_some()
            && self.version.is_some()
            && self.videos_db.is_some()
    }

    /// Ratings list pushed by the device, empty if absent or malformed.
    pub fn rating_list(&self) -> Vec<Rating> {
        self.ratings
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    pub fn current_rating_str(&self) -> Option<&str> {
        self.current_rating.as_ref().and_then(Value::as_str)
    }

    /// Whether content with `rating` may be shown under the current rating.
    pub fn is_viewable(&self, rating: Option<&str>) -> bool {
        is_viewable(rating, self.current_rating_str(), &self.rating_list())
    }
}

/// Parse an inbound text frame into the key/value map to merge.
pub fn parse_push(text: &str) -> Result<Map<String, Value>, PushError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        _ => Err(PushError::NotAnObject),
    }
}

/// One entry of the device's ordered ratings list (least to most restrictive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub rating: String,
    #[serde(default)]
    pub description: String,
}

/// Check a rating against the current rating using the order of `ratings`.
///
/// Anything that can't be decoded is treated as viewable.
pub fn is_viewable(rating: Option<&str>, current_rating: Option<&str>, ratings: &[Rating]) -> bool {
    let (Some(rating), Some(current_rating)) = (rating, current_rating) else {
        return true;
    };

    let position = |name: &str| ratings.iter().position(|r| r.rating == name);
    match (position(rating), position(current_rating)) {
        (Some(num), Some(current_num)) => num <= current_num,
        _ => {
            warn!(rating, current_rating, "Could not decode ratings");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn push(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn ratings() -> Vec<Rating> {
        serde_json::from_value(json!([
            { "rating": "G", "description": "General" },
            { "rating": "PG", "description": "Parental Guidance" },
            { "rating": "R", "description": "Restricted" },
        ]))
        .unwrap()
    }

    #[test]
    fn reset_is_all_absent() {
        let snapshot = Snapshot::reset(Some("bye".to_string()));
        assert_eq!(snapshot.phase(), SessionPhase::Reset);
        assert_eq!(snapshot.failure.as_deref(), Some("bye"));
        assert!(!snapshot.authenticated);
        assert!(!snapshot.has_required_state());
        assert!(snapshot.extra.is_empty());
    }

    #[test]
    fn merge_populates_fields_and_forces_flags() {
        let start = Snapshot::reset(Some("old".to_string())).with_connecting();
        let next = start.merged(&push(json!({
            "current_rating": "PG",
            "ratings": [],
            "state": { "state": "playing" },
            "version": "1.2.3",
            "videos_db": { "videos": [] },
            "volume": 80,
            "connected": false,
            "failure": "ignored",
        })));

        assert!(next.authenticated && next.connected && !next.connecting);
        assert_eq!(next.failure, None);
        assert_eq!(next.phase(), SessionPhase::Connected);
        assert!(next.has_required_state());
        assert_eq!(next.version, Some(json!("1.2.3")));
        assert_eq!(next.extra.get("volume"), Some(&json!(80)));
        assert!(!next.extra.contains_key("connected"));
    }

    #[test]
    fn merge_keeps_unmentioned_fields_and_clears_nulls() {
        let first = Snapshot::default().merged(&push(json!({
            "current_rating": "G",
            "state": "idle",
            "volume": 10,
        })));
        let second = first.merged(&push(json!({ "state": null, "volume": null })));

        assert_eq!(second.current_rating, Some(json!("G")));
        assert_eq!(second.state, None);
        assert!(!second.extra.contains_key("volume"));
    }

    #[test]
    fn reconnecting_keeps_pushed_state() {
        let connected = Snapshot::default().merged(&push(json!({ "version": "1" })));
        let reconnecting = connected.with_reconnecting();
        assert_eq!(reconnecting.phase(), SessionPhase::Reconnecting);
        assert_eq!(reconnecting.version, connected.version);
        assert!(reconnecting.authenticated);
    }

    #[test]
    fn parse_push_rejects_non_objects() {
        assert!(parse_push(r#"{"state": 1}"#).is_ok());
        assert!(matches!(parse_push("[1, 2]"), Err(PushError::NotAnObject)));
        assert!(matches!(parse_push("{nope"), Err(PushError::Json(_))));
    }

    #[test]
    fn viewable_follows_rating_order() {
        let ratings = ratings();
        assert!(is_viewable(Some("G"), Some("PG"), &ratings));
        assert!(is_viewable(Some("PG"), Some("PG"), &ratings));
        assert!(!is_viewable(Some("R"), Some("PG"), &ratings));
    }

    #[test]
    fn viewable_when_undecodable() {
        let ratings = ratings();
        assert!(is_viewable(None, Some("G"), &ratings));
        assert!(is_viewable(Some("R"), None, &ratings));
        assert!(is_viewable(Some("X"), Some("G"), &ratings));
    }

    #[test]
    fn snapshot_viewable_uses_pushed_ratings() {
        let snapshot = Snapshot::default().merged(&push(json!({
            "current_rating": "G",
            "ratings": [{ "rating": "G" }, { "rating": "R" }],
        })));
        assert!(snapshot.is_viewable(Some("G")));
        assert!(!snapshot.is_viewable(Some("R")));
    }
}
