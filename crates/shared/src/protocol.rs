//! Vintage Pi TV websocket protocol: handshake, close codes and user actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::ServerUrlError;

/// Protocol version sent in the handshake. The device closes with
/// [`CLOSE_INVALID_HANDSHAKE`] when it doesn't match its own.
pub const PROTOCOL_VERSION: u32 = 1;

/// Close code the device uses for a wrong password.
pub const CLOSE_INVALID_PASSWORD: u16 = 4000;

/// Close code the device uses for a malformed handshake or a protocol mismatch.
pub const CLOSE_INVALID_HANDSHAKE: u16 = 4001;

/// First code of the application-reserved range. Standard protocol codes are all below it.
pub const CLOSE_APPLICATION_MIN: u16 = 4000;

/// Failure text used when a never-authenticated connection drops without a reason.
pub const DEFAULT_CONNECT_FAILURE: &str = "Problem connecting, try again";

/// First message sent after the socket opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub password: String,
    pub protocol_version: u32,
}

impl Handshake {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

/// How a transport close should be treated by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Ordinary network-level close; the transport will retry.
    Transient,
    /// Deliberate termination by the device. Never retried.
    Fatal,
}

impl CloseKind {
    pub fn classify(code: u16) -> Self {
        if code >= CLOSE_APPLICATION_MIN {
            CloseKind::Fatal
        } else {
            CloseKind::Transient
        }
    }

    pub fn is_fatal(self) -> bool {
        matches!(self, CloseKind::Fatal)
    }
}

/// Upper-case the first character of `s`.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Failure text for a connection that closed before ever authenticating.
pub fn connect_failure_reason(reason: &str) -> String {
    if reason.is_empty() {
        DEFAULT_CONNECT_FAILURE.to_string()
    } else {
        capitalize(reason)
    }
}

/// Parse a server URL, accepting only `ws://` and `wss://`.
pub fn parse_server_url(raw: &str) -> Result<Url, ServerUrlError> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ServerUrlError::Scheme(other.to_string())),
    }
}

/// Remote-control actions understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserAction {
    Osd,
    Random,
    Pause,
    Up,
    Down,
    Right,
    Left,
    Rewind,
    VolumeUp,
    VolumeDown,
    Mute,
    Ratings,
    Power,
}

impl UserAction {
    pub const ALL: [UserAction; 13] = [
        UserAction::Osd,
        UserAction::Random,
        UserAction::Pause,
        UserAction::Up,
        UserAction::Down,
        UserAction::Right,
        UserAction::Left,
        UserAction::Rewind,
        UserAction::VolumeUp,
        UserAction::VolumeDown,
        UserAction::Mute,
        UserAction::Ratings,
        UserAction::Power,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UserAction::Osd => "osd",
            UserAction::Random => "random",
            UserAction::Pause => "pause",
            UserAction::Up => "up",
            UserAction::Down => "down",
            UserAction::Right => "right",
            UserAction::Left => "left",
            UserAction::Rewind => "rewind",
            UserAction::VolumeUp => "volume-up",
            UserAction::VolumeDown => "volume-down",
            UserAction::Mute => "mute",
            UserAction::Ratings => "ratings",
            UserAction::Power => "power",
        }
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("Unknown action: {}", s))
    }
}

/// Outbound action command: `{"action": "...", ...extras}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCommand {
    pub action: UserAction,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl From<UserAction> for ActionCommand {
    fn from(action: UserAction) -> Self {
        Self {
            action,
            extras: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_wire_shape() {
        let json = serde_json::to_value(Handshake::new("hunter2")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "password": "hunter2", "protocol_version": PROTOCOL_VERSION })
        );
    }

    #[test]
    fn close_codes_split_at_application_range() {
        assert_eq!(CloseKind::classify(1000), CloseKind::Transient);
        assert_eq!(CloseKind::classify(1006), CloseKind::Transient);
        assert_eq!(CloseKind::classify(3999), CloseKind::Transient);
        assert!(CloseKind::classify(CLOSE_INVALID_PASSWORD).is_fatal());
        assert!(CloseKind::classify(CLOSE_INVALID_HANDSHAKE).is_fatal());
        assert!(CloseKind::classify(4999).is_fatal());
    }

    #[test]
    fn connect_failure_reason_capitalizes_or_defaults() {
        assert_eq!(connect_failure_reason(""), DEFAULT_CONNECT_FAILURE);
        assert_eq!(connect_failure_reason("server gone"), "Server gone");
        assert_eq!(capitalize("ünicode"), "Ünicode");
    }

    #[test]
    fn server_url_requires_ws_scheme() {
        assert!(parse_server_url("ws://tv.local:6672/ws").is_ok());
        assert!(parse_server_url("WSS://tv.local/ws").is_ok());
        assert_eq!(
            parse_server_url("http://tv.local").unwrap_err(),
            ServerUrlError::Scheme("http".to_string())
        );
        assert!(matches!(
            parse_server_url("not a url"),
            Err(ServerUrlError::Invalid(_))
        ));
    }

    #[test]
    fn action_command_serializes_with_extras() {
        let mut cmd = ActionCommand::from(UserAction::VolumeUp);
        cmd.extras.insert("amount".to_string(), Value::from(5));
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json, serde_json::json!({ "action": "volume-up", "amount": 5 }));
    }

    #[test]
    fn action_names_parse() {
        for action in UserAction::ALL {
            assert_eq!(action.as_str().parse::<UserAction>(), Ok(action));
        }
        assert!("channel-up".parse::<UserAction>().is_err());
    }
}
