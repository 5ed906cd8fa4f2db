//! Client side of one multiplexed connection.
//!
//! A `Connection` is driven from a single context: the owner calls
//! [`Connection::on_readable`] and [`Connection::on_writable`] when the
//! transport is ready, and [`Connection::process_commands`] to apply what
//! request handles submitted from other threads.

use crate::config::ConnectionConfig;
use crate::error::ErrorKind;
use crate::frames::*;
use crate::framer::Framer;
use crate::request::{Command, Request};
use crate::stream::{Pending, Stream, StreamState, Window};
use crate::transport::Transport;
use crate::{Error, Result, StreamId, Success, Version};
use bytes::{Buf, Bytes, BytesMut};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace, warn};

pub trait ConnectionDelegate: Send + Sync {
    fn on_error(&self, err: &Error);
}

struct Detached;

impl ConnectionDelegate for Detached {
    fn on_error(&self, _err: &Error) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Open,
    /// The peer sent GOAWAY. Open streams finish, new ones are refused.
    Draining,
    Closed,
}

/// Values the peer announced through SETTINGS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerSettings {
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: Option<u32>,
}

pub struct Connection<T: Transport> {
    version: Version,
    transport: T,
    framer: Framer,
    config: ConnectionConfig,
    state: ConnectionState,
    host: String,
    secure: bool,
    next_stream_id: StreamId,
    streams: BTreeMap<StreamId, Stream>,
    outbound: BytesMut,
    commands: Receiver<Command>,
    command_tx: Sender<Command>,
    peer: PeerSettings,
    /// Send window new streams start with.
    send_window: Option<u32>,
    receive_window: Option<u32>,
    next_ping_id: u32,
    pings: HashSet<u32>,
    delegate: Weak<dyn ConnectionDelegate>,
    read_buf: Vec<u8>,
}

impl<T: Transport> Connection<T> {
    pub fn new(version: Version, transport: T, config: ConnectionConfig) -> Result<Self> {
        let mut framer = Framer::new(version)?;
        if let Some(size) = config.max_frame_size {
            framer.set_max_frame_size(size);
        }
        let (command_tx, commands) = channel();

        Ok(Self {
            version,
            transport,
            framer,
            send_window: version.initial_window_size(),
            receive_window: config.receive_window(version),
            read_buf: vec![0; config.read_buffer_size.max(1)],
            config,
            state: ConnectionState::Idle,
            host: String::new(),
            secure: false,
            next_stream_id: 1,
            streams: BTreeMap::new(),
            outbound: BytesMut::with_capacity(Framer::DEFAULT_BUFFER),
            commands,
            command_tx,
            peer: PeerSettings::default(),
            next_ping_id: 1,
            pings: HashSet::new(),
            delegate: Weak::<Detached>::new(),
        })
    }

    pub fn delegate<D: ConnectionDelegate + 'static>(&mut self, delegate: &Arc<D>) {
        let delegate: Arc<dyn ConnectionDelegate> = delegate.clone();
        self.delegate = Arc::downgrade(&delegate);
    }

    pub fn connect(&mut self, host: &str, port: u16, secure: bool) -> Success {
        if self.state != ConnectionState::Idle {
            return Err(Error::usage("connection already started"));
        }
        self.transport.connect(host, port, secure)?;
        self.host = host.to_string();
        self.secure = secure;
        self.state = ConnectionState::Open;
        debug!(host, port, secure, version = %self.version, "connection open");

        match (self.receive_window, self.version.initial_window_size()) {
            (Some(ours), Some(default)) if ours != default => self.queue_frame(&Frame::Settings(
                Settings::new(vec![Setting::new(SETTINGS_INITIAL_WINDOW_SIZE, ours)]),
            )),
            _ => Ok(()),
        }
    }

    /// Opens a stream for `request` and queues its SYN_STREAM.
    pub fn send(&mut self, request: &mut Request) -> Result<StreamId> {
        if request.is_sent() {
            return Err(Error::usage("request was already sent"));
        }
        match self.state {
            ConnectionState::Open => {}
            ConnectionState::Idle => return Err(Error::usage("connection is not open")),
            ConnectionState::Draining => return Err(Error::usage("connection is going away")),
            ConnectionState::Closed => return Err(Error::usage("connection is closed")),
        }
        let id = self.next_stream_id;
        if id > STREAM_ID_MASK {
            return Err(Error::usage("stream ids exhausted"));
        }
        let headers = request.header_block(self.version, &self.host, self.secure);
        self.queue_frame(&Frame::SynStream(SynStream::new(id, headers.clone())))?;
        self.next_stream_id += 2;
        let (flags, delegate) = request.attach(id, self.command_tx.clone());
        let stream = Stream::new(
            id,
            request.method().to_string(),
            request.url().to_string(),
            headers,
            flags,
            delegate,
            Window::new(self.send_window),
        );
        debug!(
            stream = id,
            method = %stream.method,
            url = %stream.url,
            headers = stream.headers.len(),
            "stream opened"
        );
        self.streams.insert(id, stream);

        Ok(id)
    }

    /// Queues `data` on the stream. Whatever the send window does not cover
    /// waits for WINDOW_UPDATE.
    pub fn write_data(&mut self, id: StreamId, data: impl Into<Bytes>) -> Success {
        let stream = self.open_stream(id)?;
        stream.pending.push_back(Pending {
            data: data.into(),
            fin: false,
        });

        self.flush_stream(id)
    }

    /// Half-closes our side with an empty FIN frame behind any queued data.
    /// The stream counts as closed by us once that frame is in the outbound
    /// buffer.
    pub fn end(&mut self, id: StreamId) -> Success {
        let stream = self.open_stream(id)?;
        stream.fin_queued = true;
        stream.pending.push_back(Pending {
            data: Bytes::new(),
            fin: true,
        });

        self.flush_stream(id)
    }

    /// Cancels the stream. A stream that is already gone is left alone.
    pub fn close(&mut self, id: StreamId) -> Success {
        let Some(stream) = self.streams.remove(&id) else {
            trace!(stream = id, "close on finished stream");
            return Ok(());
        };
        if stream.has_pending() {
            warn!(stream = id, "dropping queued data of cancelled stream");
        }
        stream.finish();
        debug!(stream = id, "stream cancelled");

        self.queue_frame(&Frame::RstStream(RstStream::new(id, RstStatus::Cancel)))
    }

    /// Tears the connection down: every open stream gets `err` and then its
    /// end, the connection delegate hears about it once.
    pub fn handle_error(&mut self, err: Error) {
        if self.state == ConnectionState::Closed {
            return;
        }
        warn!(error = %err.message(), kind = ?err.kind(), "connection failed");
        if let ErrorKind::Protocol { .. } = err.kind() {
            // Pushed streams are never accepted, so none was good.
            let go_away = GoAway::new(0, GoAwayStatus::ProtocolError);
            match self.framer.encode(&Frame::GoAway(go_away)) {
                Ok(bytes) => {
                    self.outbound.extend_from_slice(&bytes);
                    if let Err(e) = self.flush_outbound() {
                        debug!(error = %e.message(), "could not deliver goaway");
                    }
                }
                Err(e) => debug!(error = %e.message(), "could not encode goaway"),
            }
        }
        self.teardown(&err);
        if let Some(delegate) = self.delegate.upgrade() {
            delegate.on_error(&err);
        }
    }

    /// Says goodbye to the peer and closes the transport.
    pub fn shutdown(&mut self) -> Success {
        match self.state {
            ConnectionState::Closed => return Ok(()),
            ConnectionState::Idle => {
                self.state = ConnectionState::Closed;
                return Ok(());
            }
            ConnectionState::Open | ConnectionState::Draining => {}
        }
        if let Ok(bytes) = self
            .framer
            .encode(&Frame::GoAway(GoAway::new(0, GoAwayStatus::Ok)))
        {
            self.outbound.extend_from_slice(&bytes);
        }
        let flushed = self.flush_outbound();
        self.teardown(&Error::new(
            "connection shut down locally",
            ErrorKind::ConnectionEnd,
        ));

        flushed
    }

    /// Sends a PING and returns its id. The peer's echo is swallowed.
    pub fn ping(&mut self) -> Result<u32> {
        if self.state != ConnectionState::Open {
            return Err(Error::usage("connection is not open"));
        }
        let id = self.next_ping_id;
        self.next_ping_id = match self.next_ping_id.checked_add(2) {
            Some(next) => next,
            None => 1,
        };
        self.queue_frame(&Frame::Ping(Ping::new(id)))?;
        self.pings.insert(id);

        Ok(id)
    }

    /// Applies every command request handles submitted so far, in order.
    pub fn process_commands(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command)?;
            applied += 1;
        }

        Ok(applied)
    }

    /// Like [`Self::process_commands`], but first waits up to `timeout` for
    /// one to arrive.
    pub fn wait_commands(&mut self, timeout: Duration) -> Result<usize> {
        match self.commands.recv_timeout(timeout) {
            Ok(command) => {
                self.apply(command)?;
                Ok(1 + self.process_commands()?)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(0),
        }
    }

    /// Reads everything the transport has and dispatches the frames.
    pub fn on_readable(&mut self) -> Success {
        if matches!(self.state, ConnectionState::Idle | ConnectionState::Closed) {
            return Ok(());
        }
        let mut buf = std::mem::take(&mut self.read_buf);
        let result = self.read_all(&mut buf);
        self.read_buf = buf;
        if let Err(e) = &result {
            self.handle_error(e.clone());
        }

        result
    }

    /// Hands queued bytes to the transport.
    pub fn on_writable(&mut self) -> Success {
        if matches!(self.state, ConnectionState::Idle | ConnectionState::Closed) {
            return Ok(());
        }
        let result = self.flush_outbound();
        if let Err(e) = &result {
            self.handle_error(e.clone());
        }

        result
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn settings(&self) -> &PeerSettings {
        &self.peer
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.outbound.is_empty()
    }

    pub fn contains_stream(&self, id: StreamId) -> bool {
        self.streams.contains_key(&id)
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn stream_state(&self, id: StreamId) -> Option<StreamState> {
        self.streams.get(&id).map(Stream::state)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn apply(&mut self, command: Command) -> Success {
        trace!(?command, "applying command");
        let result = match command {
            Command::WriteData { stream_id, data } => self.write_data(stream_id, data),
            Command::End { stream_id } => self.end(stream_id),
            Command::Close { stream_id } => self.close(stream_id),
        };
        match result {
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!(error = %e.message(), stream = ?e.stream_id(), "command refused");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// The stream, if we may still send on it. A refused write is reported to
    /// the stream's delegate as well.
    fn open_stream(&mut self, id: StreamId) -> Result<&mut Stream> {
        let stream = self
            .streams
            .get_mut(&id)
            .ok_or_else(|| Error::usage("no such stream").on_stream(id))?;
        if stream.flags.closed_by_us() || stream.fin_queued {
            let err = Error::usage("stream already ended").on_stream(id);
            stream.deliver_error(&err);
            return Err(err);
        }

        Ok(stream)
    }

    fn queue_frame(&mut self, frame: &Frame) -> Success {
        trace!(%frame, "queueing frame");
        match self.framer.encode(frame) {
            Ok(bytes) => {
                self.outbound.extend_from_slice(&bytes);
                Ok(())
            }
            Err(e) => {
                if e.is_fatal() {
                    self.handle_error(e.clone());
                }
                Err(e)
            }
        }
    }

    /// Moves as much queued data as the send window and frame size allow
    /// into the outbound buffer, then collapses the stream if that sent our
    /// FIN after the peer's.
    fn flush_stream(&mut self, id: StreamId) -> Success {
        let max = self.framer.max_frame_size() as usize;
        let Some(stream) = self.streams.get_mut(&id) else {
            return Ok(());
        };
        while let Some(mut chunk) = stream.pending.pop_front() {
            if chunk.data.is_empty() && !chunk.fin {
                continue;
            }
            let credit = stream.send_window.available();
            if !chunk.data.is_empty() && credit == 0 {
                trace!(stream = id, queued = chunk.data.len(), "send window exhausted");
                stream.pending.push_front(chunk);
                break;
            }
            let take = chunk.data.len().min(credit).min(max);
            let payload = chunk.data.split_to(take);
            let last = chunk.data.is_empty();
            stream.send_window.consume(take);
            let fin = last && chunk.fin;
            let bytes = self.framer.encode(&Frame::Data(Data::new(id, payload, fin)))?;
            self.outbound.extend_from_slice(&bytes);
            if fin {
                stream.close_local();
            }
            if !last {
                stream.pending.push_front(chunk);
            }
        }
        self.collapse(id);

        Ok(())
    }

    /// Removes the stream once both sides are done with it and nothing of
    /// ours is left to send.
    fn collapse(&mut self, id: StreamId) {
        let done = self
            .streams
            .get(&id)
            .is_some_and(|stream| stream.is_closed() && !stream.has_pending());
        if !done {
            return;
        }
        if let Some(stream) = self.streams.remove(&id) {
            debug!(stream = id, "stream closed");
            stream.finish();
        }
    }

    fn teardown(&mut self, err: &Error) {
        self.transport.close();
        self.state = ConnectionState::Closed;
        self.outbound.clear();
        self.pings.clear();
        let streams = std::mem::take(&mut self.streams);
        for (id, stream) in streams {
            stream.deliver_error(&err.clone().on_stream(id));
            stream.finish();
        }
    }

    fn flush_outbound(&mut self) -> Success {
        while !self.outbound.is_empty() {
            match self.transport.write(&self.outbound) {
                Ok(0) => {
                    return Err(Error::transport(
                        "transport accepted no bytes",
                        io::ErrorKind::WriteZero,
                    ))
                }
                Ok(n) => {
                    trace!(written = n, left = self.outbound.len() - n, "wrote bytes");
                    self.outbound.advance(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match self.transport.flush() {
            Err(e) if e.kind() != io::ErrorKind::WouldBlock => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn read_all(&mut self, buf: &mut [u8]) -> Success {
        loop {
            match self.transport.read(buf) {
                Ok(0) => return Err(Error::connection_end()),
                Ok(n) => {
                    trace!(read = n, "read bytes");
                    self.ingest(&buf[..n])?;
                    if self.state == ConnectionState::Closed {
                        return Ok(());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn ingest(&mut self, chunk: &[u8]) -> Success {
        let frames = self.framer.decode(chunk).collect::<Vec<Result<Frame>>>();
        for frame in frames {
            self.dispatch(frame?)?;
            if self.state == ConnectionState::Closed {
                break;
            }
        }

        Ok(())
    }

    fn dispatch(&mut self, frame: Frame) -> Success {
        trace!(%frame, "dispatching frame");
        match frame {
            Frame::SynStream(syn) => self.on_push(syn),
            Frame::SynReply(reply) => {
                self.on_headers(reply.stream_id, &reply.headers, reply.fin);
                Ok(())
            }
            Frame::Headers(headers) => {
                self.on_headers(headers.stream_id, &headers.headers, headers.fin);
                Ok(())
            }
            Frame::Data(data) => self.on_data(data),
            Frame::RstStream(rst) => {
                self.on_reset(rst);
                Ok(())
            }
            Frame::WindowUpdate(update) => self.on_window_update(update),
            Frame::Ping(ping) => self.on_ping(ping),
            Frame::Settings(settings) => {
                self.on_settings(settings);
                Ok(())
            }
            Frame::GoAway(go_away) => {
                self.on_go_away(go_away);
                Ok(())
            }
        }
    }

    fn on_push(&mut self, syn: SynStream) -> Success {
        debug!(stream = syn.stream_id, associated = syn.associated_id, "refusing pushed stream");
        match self.version {
            Version::V3 => self.queue_frame(&Frame::RstStream(RstStream::new(
                syn.stream_id,
                RstStatus::RefusedStream,
            ))),
            Version::V2 => Ok(()),
        }
    }

    fn on_headers(&mut self, id: StreamId, headers: &HeaderBlock, fin: bool) {
        let Some(stream) = self.streams.get(&id) else {
            trace!(stream = id, "headers for unknown stream");
            return;
        };
        stream.deliver_headers(headers);
        if fin {
            stream.close_remote();
            self.collapse(id);
        }
    }

    fn on_data(&mut self, data: Data) -> Success {
        let id = data.stream_id;
        let Some(stream) = self.streams.get_mut(&id) else {
            trace!(stream = id, len = data.payload.len(), "data for unknown stream");
            return Ok(());
        };
        if stream.flags.closed_by_them() {
            trace!(stream = id, "data after peer finished");
            return Ok(());
        }
        if !data.payload.is_empty() {
            stream.deliver_input(&data.payload);
        }
        let mut acknowledge = None;
        if let Some(window) = self.receive_window {
            stream.unacked = stream.unacked.saturating_add(data.payload.len() as u32);
            if !data.fin && stream.unacked >= window / 2 {
                acknowledge = Some(stream.unacked);
                stream.unacked = 0;
            }
        }
        if data.fin {
            stream.close_remote();
            self.collapse(id);
        }
        match acknowledge {
            Some(delta) if delta > 0 => self.queue_frame(&Frame::WindowUpdate(WindowUpdate::new(id, delta))),
            _ => Ok(()),
        }
    }

    fn on_reset(&mut self, rst: RstStream) {
        let Some(stream) = self.streams.remove(&rst.stream_id) else {
            trace!(stream = rst.stream_id, "reset for unknown stream");
            return;
        };
        debug!(stream = rst.stream_id, status = ?rst.status, "stream reset by peer");
        stream.deliver_error(&Error::reset(rst.stream_id, rst.status));
        stream.finish();
    }

    fn on_window_update(&mut self, update: WindowUpdate) -> Success {
        if !self.version.has_flow_control() {
            return Ok(());
        }
        match self.streams.get_mut(&update.stream_id) {
            Some(stream) => stream.send_window.increase(update.delta),
            None => return Ok(()),
        }

        self.flush_stream(update.stream_id)
    }

    fn on_ping(&mut self, ping: Ping) -> Success {
        if ping.is_client_initiated() && self.pings.remove(&ping.id) {
            trace!(id = ping.id, "ping answered");
            return Ok(());
        }

        self.queue_frame(&Frame::Ping(ping))
    }

    fn on_settings(&mut self, settings: Settings) {
        if settings.clear {
            self.peer = PeerSettings::default();
        }
        for setting in settings.entries.iter() {
            match setting.id {
                SETTINGS_MAX_CONCURRENT_STREAMS => {
                    self.peer.max_concurrent_streams = Some(setting.value)
                }
                SETTINGS_INITIAL_WINDOW_SIZE if self.version.has_flow_control() => {
                    self.peer.initial_window_size = Some(setting.value);
                    self.send_window = Some(setting.value);
                }
                id => trace!(id, value = setting.value, "ignoring setting"),
            }
        }
        debug!(settings = ?self.peer, "peer settings");
    }

    fn on_go_away(&mut self, go_away: GoAway) {
        debug!(
            last_good = go_away.last_good_stream_id,
            status = ?go_away.status,
            "peer is going away"
        );
        if self.state == ConnectionState::Open {
            self.state = ConnectionState::Draining;
        }
    }
}

#[cfg(test)]
mod tests;
