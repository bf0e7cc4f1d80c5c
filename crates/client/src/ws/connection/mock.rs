//! Scripted transport for driving the session manager in tests.

use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use super::{EventHandler, Transport, TransportEvent, TransportHandle, TransportOptions};

#[derive(Default)]
struct Wire {
    sent: Vec<String>,
    closed: bool,
}

/// One `open` call seen by [`MockTransport`].
#[derive(Clone)]
pub(crate) struct MockConnection {
    pub url: Url,
    pub options: TransportOptions,
    on_event: EventHandler,
    wire: Arc<Mutex<Wire>>,
}

impl MockConnection {
    pub fn emit(&self, event: TransportEvent) {
        (self.on_event)(event);
    }

    pub fn open(&self) {
        self.emit(TransportEvent::Open);
    }

    pub fn message(&self, text: &str) {
        self.emit(TransportEvent::Message(text.to_string()));
    }

    pub fn close(&self, code: u16, reason: &str) {
        self.emit(TransportEvent::Close {
            code,
            reason: reason.to_string(),
        });
    }

    pub fn sent(&self) -> Vec<String> {
        self.wire.lock().sent.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.wire.lock().closed
    }
}

struct MockHandle {
    wire: Arc<Mutex<Wire>>,
}

impl TransportHandle for MockHandle {
    fn send(&self, text: String) {
        let mut wire = self.wire.lock();
        if !wire.closed {
            wire.sent.push(text);
        }
    }

    fn close(&self) {
        self.wire.lock().closed = true;
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    opened: Arc<Mutex<Vec<MockConnection>>>,
}

impl MockTransport {
    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn connection(&self, index: usize) -> MockConnection {
        self.opened.lock()[index].clone()
    }

    pub fn last(&self) -> MockConnection {
        self.opened
            .lock()
            .last()
            .cloned()
            .expect("no connection was opened")
    }
}

impl Transport for MockTransport {
    fn open(
        &self,
        url: &Url,
        options: &TransportOptions,
        on_event: EventHandler,
    ) -> Box<dyn TransportHandle> {
        let wire = Arc::new(Mutex::new(Wire::default()));
        self.opened.lock().push(MockConnection {
            url: url.clone(),
            options: options.clone(),
            on_event,
            wire: wire.clone(),
        });
        Box::new(MockHandle { wire })
    }
}
