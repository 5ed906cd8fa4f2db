use crate::error::Error;
use crate::frames::HeaderBlock;
use crate::request::RequestDelegate;
use crate::StreamId;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Constructed, not yet sent.
    Idle,
    Open,
    /// We sent FIN, the peer may still send.
    HalfClosedLocal,
    /// The peer sent FIN, we may still send.
    HalfClosedRemote,
    Closed,
}

/// Close flags shared between the connection's stream record and the
/// application's request handle.
#[derive(Debug, Default)]
pub(crate) struct StreamFlags {
    closed_by_us: AtomicBool,
    closed_by_them: AtomicBool,
    finished: AtomicBool,
}

impl StreamFlags {
    pub(crate) fn closed_by_us(&self) -> bool {
        self.closed_by_us.load(Ordering::Acquire)
    }

    pub(crate) fn closed_by_them(&self) -> bool {
        self.closed_by_them.load(Ordering::Acquire)
    }

    /// Set once the stream left the table and `on_end` went out.
    pub(crate) fn finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> StreamState {
        match (self.closed_by_us(), self.closed_by_them()) {
            (false, false) => StreamState::Open,
            (true, false) => StreamState::HalfClosedLocal,
            (false, true) => StreamState::HalfClosedRemote,
            (true, true) => StreamState::Closed,
        }
    }

    fn set_closed_by_us(&self) {
        self.closed_by_us.store(true, Ordering::Release);
    }

    fn set_closed_by_them(&self) {
        self.closed_by_them.store(true, Ordering::Release);
    }

    fn set_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

/// Data waiting for send credit, in submission order.
#[derive(Debug)]
pub(crate) struct Pending {
    pub data: Bytes,
    pub fin: bool,
}

/// Credit based send window. `None` means unbounded.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window(Option<i64>);

impl Window {
    pub(crate) fn new(size: Option<u32>) -> Self {
        Self(size.map(i64::from))
    }

    pub(crate) fn available(&self) -> usize {
        match self.0 {
            Some(w) if w <= 0 => 0,
            Some(w) => w as usize,
            None => usize::MAX,
        }
    }

    pub(crate) fn consume(&mut self, amount: usize) {
        if let Some(w) = self.0.as_mut() {
            *w -= amount as i64;
        }
    }

    pub(crate) fn increase(&mut self, delta: u32) {
        if let Some(w) = self.0.as_mut() {
            *w = w.saturating_add(i64::from(delta));
        }
    }
}

/// The connection's record of one open stream.
pub(crate) struct Stream {
    pub id: StreamId,
    pub method: String,
    pub url: String,
    pub headers: HeaderBlock,
    pub flags: Arc<StreamFlags>,
    pub delegate: Weak<dyn RequestDelegate>,
    pub pending: VecDeque<Pending>,
    pub send_window: Window,
    /// `end` was called; the FIN sits in `pending` until the window lets it
    /// through.
    pub fin_queued: bool,
    /// Received bytes not yet acknowledged with a WINDOW_UPDATE.
    pub unacked: u32,
}

impl Stream {
    pub(crate) fn new(
        id: StreamId,
        method: String,
        url: String,
        headers: HeaderBlock,
        flags: Arc<StreamFlags>,
        delegate: Weak<dyn RequestDelegate>,
        send_window: Window,
    ) -> Self {
        Self {
            id,
            method,
            url,
            headers,
            flags,
            delegate,
            pending: VecDeque::new(),
            send_window,
            fin_queued: false,
            unacked: 0,
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.flags.state()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state() == StreamState::Closed
    }

    pub(crate) fn close_local(&self) {
        self.flags.set_closed_by_us();
    }

    pub(crate) fn close_remote(&self) {
        self.flags.set_closed_by_them();
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn deliver_headers(&self, headers: &HeaderBlock) {
        if let Some(delegate) = self.delegate.upgrade() {
            delegate.on_headers(headers);
        }
    }

    pub(crate) fn deliver_input(&self, input: &[u8]) {
        if let Some(delegate) = self.delegate.upgrade() {
            delegate.on_input(input);
        }
    }

    pub(crate) fn deliver_error(&self, err: &Error) {
        if let Some(delegate) = self.delegate.upgrade() {
            delegate.on_error(err);
        }
    }

    /// Last callback the delegate ever sees for this stream.
    pub(crate) fn finish(&self) {
        self.flags.set_closed_by_us();
        self.flags.set_closed_by_them();
        self.flags.set_finished();
        if let Some(delegate) = self.delegate.upgrade() {
            delegate.on_end();
        }
    }
}
