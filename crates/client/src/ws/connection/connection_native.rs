//! Native WebSocket transport using tokio-tungstenite.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use super::{EventHandler, Transport, TransportEvent, TransportHandle, TransportOptions};

/// Close code reported when the socket went away without a close frame
const CLOSE_ABNORMAL: u16 = 1006;
/// Close code reported when a close frame carried no status
const CLOSE_NO_STATUS: u16 = 1005;
/// Close code we send (and report) for a client-requested close
const CLOSE_NORMAL: u16 = 1000;

const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

enum Command {
    Send(String),
    Close,
}

/// Reconnecting WebSocket transport. Each `open` spawns a background tokio
/// task, so it must be called from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl Transport for WsTransport {
    fn open(
        &self,
        url: &Url,
        options: &TransportOptions,
        on_event: EventHandler,
    ) -> Box<dyn TransportHandle> {
        let (sender, receiver) = unbounded_channel();
        tokio::spawn(run_connection_loop(
            url.clone(),
            options.clone(),
            receiver,
            on_event,
        ));
        Box::new(WsHandle { sender })
    }
}

/// Handle for a running connection loop. Dropping it also stops the loop.
struct WsHandle {
    sender: UnboundedSender<Command>,
}

impl TransportHandle for WsHandle {
    fn send(&self, text: String) {
        if self.sender.send(Command::Send(text)).is_err() {
            debug!("Transport already stopped, dropping message");
        }
    }

    fn close(&self) {
        let _ = self.sender.send(Command::Close);
    }
}

/// Connection management loop: connect, pump frames, back off, repeat.
async fn run_connection_loop(
    url: Url,
    options: TransportOptions,
    mut commands: UnboundedReceiver<Command>,
    on_event: EventHandler,
) {
    let mut pending = VecDeque::new();
    let mut attempt = 0u32;

    loop {
        if options.retries_exhausted(attempt) {
            warn!("Giving up on {} after {} retries", url, attempt - 1);
            return;
        }

        let connect = tokio::time::timeout(options.connection_timeout, connect_async(url.as_str()));
        let outcome = tokio::select! {
            outcome = connect => outcome,
            _ = wait_for_close(&mut commands, &mut pending, options.max_enqueued_messages) => {
                debug!("Transport closed while connecting to {}", url);
                on_event(closed_by_client());
                return;
            }
        };

        match outcome {
            Ok(Ok((ws_stream, _response))) => {
                info!("WebSocket connected to {}", url);
                attempt = 0;
                on_event(TransportEvent::Open);

                let (mut write, mut read) = ws_stream.split();

                while let Some(text) = pending.pop_front() {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        warn!("Failed to flush queued message: {}", e);
                        break;
                    }
                }

                let (code, reason) = loop {
                    tokio::select! {
                        frame = read.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                on_event(TransportEvent::Message(text.as_str().to_owned()));
                            }
                            Some(Ok(Message::Close(frame))) => {
                                break match frame {
                                    Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_owned()),
                                    None => (CLOSE_NO_STATUS, String::new()),
                                };
                            }
                            Some(Ok(_)) => {
                                // Ping/pong handled by tungstenite; binary frames aren't part of the protocol
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket read error: {}", e);
                                break (CLOSE_ABNORMAL, String::new());
                            }
                            None => break (CLOSE_ABNORMAL, String::new()),
                        },
                        command = commands.recv() => match command {
                            Some(Command::Send(text)) => {
                                if let Err(e) = write.send(Message::Text(text.into())).await {
                                    warn!("Send failed: {}", e);
                                }
                            }
                            Some(Command::Close) | None => {
                                let frame = CloseFrame {
                                    code: CloseCode::Normal,
                                    reason: "".into(),
                                };
                                let _ = tokio::time::timeout(
                                    CLOSE_FLUSH_TIMEOUT,
                                    write.send(Message::Close(Some(frame))),
                                )
                                .await;
                                info!("WebSocket to {} closed by client", url);
                                on_event(closed_by_client());
                                return;
                            }
                        }
                    }
                };

                // Lets tungstenite answer the peer's close frame
                let _ = tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, write.close()).await;
                info!("WebSocket to {} closed ({}: {})", url, code, reason);
                on_event(TransportEvent::Close { code, reason });
            }
            Ok(Err(e)) => {
                warn!("WebSocket error for {}: {}", url, e);
                on_event(TransportEvent::Close {
                    code: CLOSE_ABNORMAL,
                    reason: String::new(),
                });
            }
            Err(_) => {
                warn!("Timed out connecting to {}", url);
                on_event(TransportEvent::Close {
                    code: CLOSE_ABNORMAL,
                    reason: String::new(),
                });
            }
        }

        // Wait before reconnecting
        let delay = options.delay_for_attempt(attempt);
        attempt += 1;
        debug!(
            "Reconnecting to {} in {}ms (attempt {})",
            url,
            delay.as_millis(),
            attempt
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wait_for_close(&mut commands, &mut pending, options.max_enqueued_messages) => {
                debug!("Transport closed while waiting to reconnect to {}", url);
                on_event(closed_by_client());
                return;
            }
        }
    }
}

fn closed_by_client() -> TransportEvent {
    TransportEvent::Close {
        code: CLOSE_NORMAL,
        reason: String::new(),
    }
}

/// Consume commands while the socket is down, returning once a close is
/// requested or every handle is gone.
async fn wait_for_close(
    commands: &mut UnboundedReceiver<Command>,
    pending: &mut VecDeque<String>,
    max_enqueued: usize,
) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Send(text) => {
                if pending.len() < max_enqueued {
                    pending.push_back(text);
                } else {
                    debug!("Socket not open, dropping message");
                }
            }
            Command::Close => return,
        }
    }
}
