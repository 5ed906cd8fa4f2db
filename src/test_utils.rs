use crate::connection::{Connection, ConnectionDelegate};
use crate::frames::{Frame, HeaderBlock};
use crate::framer::Framer;
use crate::request::RequestDelegate;
use crate::transport::Transport;
use crate::{ConnectionConfig, Error, Result, Version};
use bytes::BytesMut;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
pub(crate) struct Wire {
    pub inbound: BytesMut,
    pub outbound: Vec<u8>,
    pub eof: bool,
    pub read_error: Option<io::ErrorKind>,
    pub write_error: Option<io::ErrorKind>,
    /// Bytes the wire still accepts before writes block. `None` is unlimited.
    pub write_budget: Option<usize>,
    pub connected: Option<(String, u16, bool)>,
    pub closed: bool,
}

/// In-memory transport. Clones share the same wire, so a test keeps one
/// handle while the connection owns another.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    wire: Arc<Mutex<Wire>>,
}

impl MockTransport {
    pub fn wire(&self) -> MutexGuard<'_, Wire> {
        self.wire.lock().unwrap()
    }

    pub fn push_inbound(&self, bytes: &[u8]) {
        self.wire().inbound.extend_from_slice(bytes);
    }

    pub fn take_outbound(&self) -> Vec<u8> {
        std::mem::take(&mut self.wire().outbound)
    }

    pub fn set_eof(&self) {
        self.wire().eof = true;
    }

    pub fn set_write_budget(&self, budget: Option<usize>) {
        self.wire().write_budget = budget;
    }

    pub fn is_closed(&self) -> bool {
        self.wire().closed
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, host: &str, port: u16, secure: bool) -> io::Result<()> {
        self.wire().connected = Some((host.to_string(), port, secure));
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.wire();
        if let Some(kind) = wire.read_error {
            return Err(io::Error::new(kind, "injected read failure"));
        }
        if wire.inbound.is_empty() {
            return match wire.eof {
                true => Ok(0),
                false => Err(io::ErrorKind::WouldBlock.into()),
            };
        }
        let n = buf.len().min(wire.inbound.len());
        buf[..n].copy_from_slice(&wire.inbound.split_to(n));

        Ok(n)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut wire = self.wire();
        if let Some(kind) = wire.write_error {
            return Err(io::Error::new(kind, "injected write failure"));
        }
        if wire.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        let n = match wire.write_budget {
            Some(0) => return Err(io::ErrorKind::WouldBlock.into()),
            Some(budget) => budget.min(bytes.len()),
            None => bytes.len(),
        };
        if let Some(budget) = wire.write_budget.as_mut() {
            *budget -= n;
        }
        wire.outbound.extend_from_slice(&bytes[..n]);

        Ok(n)
    }

    fn close(&mut self) {
        self.wire().closed = true;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Headers(HeaderBlock),
    Input(Vec<u8>),
    Error(Error),
    End,
}

/// Remembers every callback in arrival order.
#[derive(Default)]
pub(crate) struct RecordingDelegate {
    events: Mutex<Vec<Event>>,
}

impl RecordingDelegate {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<Error> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    pub fn input(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Input(bytes) => Some(bytes),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn ends(&self) -> usize {
        self.events().iter().filter(|e| **e == Event::End).count()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl RequestDelegate for RecordingDelegate {
    fn on_error(&self, err: &Error) {
        self.record(Event::Error(err.clone()));
    }

    fn on_input(&self, input: &[u8]) {
        self.record(Event::Input(input.to_vec()));
    }

    fn on_end(&self) {
        self.record(Event::End);
    }

    fn on_headers(&self, headers: &HeaderBlock) {
        self.record(Event::Headers(headers.clone()));
    }
}

impl ConnectionDelegate for RecordingDelegate {
    fn on_error(&self, err: &Error) {
        self.record(Event::Error(err.clone()));
    }
}

/// The server end of a mock wire: a framer that reads what the client wrote
/// and encodes what the server answers.
pub(crate) struct Peer {
    pub framer: Framer,
    pub transport: MockTransport,
}

impl Peer {
    pub fn new(version: Version, transport: MockTransport) -> Self {
        Self {
            framer: Framer::new(version).unwrap(),
            transport,
        }
    }

    /// Frames the client has put on the wire since the last call.
    pub fn received(&mut self) -> Vec<Frame> {
        let bytes = self.transport.take_outbound();
        self.framer
            .decode(&bytes)
            .collect::<Result<Vec<Frame>>>()
            .unwrap()
    }

    pub fn send(&mut self, frame: Frame) {
        let bytes = self.framer.encode(&frame).unwrap();
        self.transport.push_inbound(&bytes);
    }
}

pub(crate) fn connected(
    version: Version,
    config: ConnectionConfig,
) -> (Connection<MockTransport>, Peer) {
    let transport = MockTransport::default();
    let mut conn = Connection::new(version, transport.clone(), config).unwrap();
    conn.connect("example.com", 443, true).unwrap();

    (conn, Peer::new(version, transport))
}
