use crate::error::ErrorKind;
use crate::frames::HeaderBlock;
use crate::stream::{StreamFlags, StreamState};
use crate::{Error, Result, StreamId, Success, Version};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Weak};

/// Headers that describe a single HTTP/1.1 hop and have no meaning on a
/// multiplexed connection.
const CONNECTION_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
];

/// Receives everything that happens on one stream.
///
/// `on_end` is the last call a delegate gets for its stream.
pub trait RequestDelegate: Send + Sync {
    fn on_error(&self, err: &Error);
    fn on_input(&self, input: &[u8]);
    fn on_end(&self);
    fn on_headers(&self, _headers: &HeaderBlock) {}
}

struct Detached;

impl RequestDelegate for Detached {
    fn on_error(&self, _err: &Error) {}
    fn on_input(&self, _input: &[u8]) {}
    fn on_end(&self) {}
}

/// Application calls marshalled onto the connection.
#[derive(Debug)]
pub(crate) enum Command {
    WriteData { stream_id: StreamId, data: Bytes },
    End { stream_id: StreamId },
    Close { stream_id: StreamId },
}

/// One request/response exchange.
///
/// Built by the application, handed to [`Connection::send`](crate::Connection::send)
/// to open its stream, then written to from any thread.
pub struct Request {
    method: String,
    url: String,
    headers: HashMap<String, String>,
    delegate: Weak<dyn RequestDelegate>,
    stream_id: Option<StreamId>,
    flags: Arc<StreamFlags>,
    commands: Option<Sender<Command>>,
    ended: bool,
    cancelled: bool,
}

impl Request {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            headers: HashMap::new(),
            delegate: Weak::<Detached>::new(),
            stream_id: None,
            flags: Arc::new(StreamFlags::default()),
            commands: None,
            ended: false,
            cancelled: false,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: &str) -> Self {
        Self::new("POST", url)
    }

    /// The request keeps only a weak reference; dropping the delegate silences
    /// the stream rather than failing it.
    pub fn delegate<D: RequestDelegate + 'static>(mut self, delegate: &Arc<D>) -> Self {
        let delegate: Arc<dyn RequestDelegate> = delegate.clone();
        self.delegate = Arc::downgrade(&delegate);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn headers(&mut self, headers: &[(&str, &str)]) {
        self.headers.extend(
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn header_map(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn stream_id(&self) -> Option<StreamId> {
        self.stream_id
    }

    pub fn state(&self) -> StreamState {
        match self.stream_id {
            None => StreamState::Idle,
            Some(_) if self.cancelled => StreamState::Closed,
            Some(_) => self.flags.state(),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.stream_id.is_some()
    }

    pub fn write_data(&mut self, data: impl Into<Bytes>) -> Success {
        let stream_id = self.attached()?;
        if self.ended || self.flags.closed_by_us() {
            return Err(self.refuse(Error::usage("write after end of request").on_stream(stream_id)));
        }

        self.submit(Command::WriteData {
            stream_id,
            data: data.into(),
        })
    }

    pub fn write_text(&mut self, text: &str) -> Success {
        self.write_data(Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Half-closes our side. The stream finishes once the peer ends too.
    pub fn end(&mut self) -> Success {
        let stream_id = self.attached()?;
        if self.ended || self.flags.closed_by_us() {
            return Err(self.refuse(Error::usage("request already ended").on_stream(stream_id)));
        }
        self.ended = true;

        self.submit(Command::End { stream_id })
    }

    /// Cancels the stream. The handle reports `Closed` right away, the reset
    /// goes out when the connection processes its commands. Closing a
    /// finished or cancelled stream does nothing.
    pub fn close(&mut self) -> Success {
        let stream_id = self.attached()?;
        if self.flags.finished() || self.cancelled {
            return Ok(());
        }
        self.ended = true;
        self.cancelled = true;

        self.submit(Command::Close { stream_id })
    }

    pub(crate) fn attach(
        &mut self,
        stream_id: StreamId,
        commands: Sender<Command>,
    ) -> (Arc<StreamFlags>, Weak<dyn RequestDelegate>) {
        self.stream_id = Some(stream_id);
        self.commands = Some(commands);

        (self.flags.clone(), self.delegate.clone())
    }

    /// Name/value block for the SYN_STREAM opening this request.
    pub(crate) fn header_block(&self, version: Version, host: &str, secure: bool) -> HeaderBlock {
        let scheme = match secure {
            true => "https",
            false => "http",
        };
        let url = match self.url.is_empty() {
            true => "/",
            false => self.url.as_str(),
        };
        let mut block = match version {
            Version::V2 => [
                ("method", self.method.as_str()),
                ("url", url),
                ("version", "HTTP/1.1"),
                ("host", host),
                ("scheme", scheme),
            ],
            Version::V3 => [
                (":method", self.method.as_str()),
                (":path", url),
                (":version", "HTTP/1.1"),
                (":host", host),
                (":scheme", scheme),
            ],
        }
        .into_iter()
        .collect::<HeaderBlock>();
        let mut names = self.headers.keys().collect::<Vec<&String>>();
        names.sort();
        for name in names {
            let lower = name.to_ascii_lowercase();
            if CONNECTION_HEADERS.contains(&lower.as_str()) || (lower == "host" && version == Version::V2) {
                continue;
            }
            block.insert(&lower, &self.headers[name]);
        }

        block
    }

    fn attached(&self) -> Result<StreamId> {
        match self.stream_id {
            Some(id) => Ok(id),
            None => Err(self.refuse(Error::usage("request has not been sent"))),
        }
    }

    /// Usage errors go to the delegate too, unless the stream already ended.
    fn refuse(&self, err: Error) -> Error {
        if !self.flags.finished() {
            if let Some(delegate) = self.delegate.upgrade() {
                delegate.on_error(&err);
            }
        }

        err
    }

    fn submit(&self, command: Command) -> Success {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| Error::usage("request has not been sent"))?;
        commands.send(command).map_err(|_| {
            Error::new("connection is no longer running", ErrorKind::ConnectionEnd)
        })
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("stream_id", &self.stream_id)
            .field("state", &self.state())
            .finish()
    }
}
