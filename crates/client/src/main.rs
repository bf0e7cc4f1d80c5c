//! Vintage Pi TV remote - terminal entry point
//!
//! Connects to the device, prints every change of the session snapshot and
//! turns lines typed on stdin into remote-control actions.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use vintagetv_client::{
    logging, ClientConfig, FileStore, PersistedSettings, SessionConfig, SessionManager,
    SettingsStore, WsTransport,
};
use vintagetv_shared::{SessionPhase, Snapshot, UserAction};

#[derive(Debug, Parser)]
#[command(name = "vintagetv-remote", version, about = "Remote control for a Vintage Pi TV")]
struct Args {
    /// Server URL (ws:// or wss://), saved for next time
    #[arg(long)]
    url: Option<String>,

    /// Device password, saved for next time
    #[arg(long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = ClientConfig::from_env();
    logging::init(&config.log_filter);

    let store = FileStore::open(config.config_dir.as_deref())
        .context("Cannot locate a settings directory, set VINTAGETV_CONFIG_DIR")?;
    info!("Settings stored in {}", store.dir().display());

    let settings = Arc::new(PersistedSettings::load(store));
    settings.apply_url_override(args.url.as_deref());
    if let Some(password) = args.password.as_deref() {
        settings.set_password(password);
    }

    let session = SessionManager::new(settings, Arc::new(WsTransport), SessionConfig::from(&config));

    let mut last_line = None;
    let _printer = session.subscribe_fn(move |snapshot| {
        let line = describe(snapshot);
        if last_line.as_ref() != Some(&line) {
            println!("{}", line);
            last_line = Some(line);
        }
    });

    session.connect();
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "quit" | "exit" => break,
            "connect" => session.connect(),
            "disconnect" => session.disconnect(None),
            "clear" => session.clear_failure(),
            "help" => print_help(),
            other => match other.parse::<UserAction>() {
                Ok(action) if session.snapshot().connected => session.send_action(action),
                Ok(action) => warn!("Not connected, '{}' not sent", action),
                Err(e) => eprintln!("{} (type 'help')", e),
            },
        }
    }

    session.disconnect(None);
    Ok(())
}

fn describe(snapshot: &Snapshot) -> String {
    let mut line = match snapshot.phase() {
        SessionPhase::Reset => "[disconnected]".to_string(),
        SessionPhase::Connecting => "[connecting]".to_string(),
        SessionPhase::Reconnecting => "[reconnecting]".to_string(),
        SessionPhase::Connected => "[connected]".to_string(),
    };
    if let Some(failure) = &snapshot.failure {
        line.push_str(&format!(" {}", failure));
    }
    if let Some(version) = snapshot.version.as_ref().and_then(|v| v.as_str()) {
        line.push_str(&format!(" version={}", version));
    }
    if let Some(rating) = snapshot.current_rating_str() {
        line.push_str(&format!(" rating={}", rating));
    }
    if let Some(state) = snapshot.state.as_ref().and_then(|s| s.get("state")) {
        line.push_str(&format!(" state={}", state));
    }
    line
}

fn print_help() {
    let actions: Vec<&str> = UserAction::ALL.iter().map(|a| a.as_str()).collect();
    println!("Commands: connect, disconnect, clear, help, quit");
    println!("Actions:  {}", actions.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn describe_reset_with_failure() {
        let snapshot = Snapshot::reset(Some("Invalid password. Try again.".to_string()));
        assert_eq!(describe(&snapshot), "[disconnected] Invalid password. Try again.");
    }

    #[test]
    fn describe_connected_state() {
        let push = json!({
            "version": "0.4.1",
            "current_rating": "PG",
            "state": { "state": "playing" },
        });
        let snapshot = Snapshot::default().merged(push.as_object().unwrap());
        assert_eq!(
            describe(&snapshot),
            "[connected] version=0.4.1 rating=PG state=\"playing\""
        );
    }
}
