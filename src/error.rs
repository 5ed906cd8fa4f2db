use crate::frames::RstStatus;
use crate::StreamId;
use std::fmt::{Display, Formatter};
use std::io;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Error {
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
    pub(crate) stream_id: Option<StreamId>,
}

impl Error {
    pub fn new(message: &str, kind: ErrorKind) -> Self {
        Self {
            message: message.to_string(),
            kind,
            stream_id: None,
        }
    }

    pub fn connection_end() -> Self {
        Self::new("connection closed by peer", ErrorKind::ConnectionEnd)
    }

    pub fn protocol(message: &str) -> Self {
        Self::new(message, ErrorKind::Protocol { frame_type: None })
    }

    pub fn frame(message: &str, frame_type: u16) -> Self {
        Self::new(
            message,
            ErrorKind::Protocol {
                frame_type: Some(frame_type),
            },
        )
    }

    pub fn reset(stream_id: StreamId, status: RstStatus) -> Self {
        Self::new("stream reset", ErrorKind::StreamReset { status }).on_stream(stream_id)
    }

    pub fn transport(message: &str, kind: io::ErrorKind) -> Self {
        Self::new(message, ErrorKind::Transport(kind))
    }

    pub fn usage(message: &str) -> Self {
        Self::new(message, ErrorKind::Usage)
    }

    pub fn on_stream(mut self, stream_id: StreamId) -> Self {
        self.stream_id = Some(stream_id);
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stream_id(&self) -> Option<StreamId> {
        self.stream_id
    }

    /// Errors that tear the whole connection down.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ConnectionEnd | ErrorKind::Protocol { .. } | ErrorKind::Transport(_)
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error: {}\nKind: {:?}", self.message, self.kind)?;
        if let Some(id) = self.stream_id {
            write!(f, "\nStream: {id}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    ConnectionEnd,
    Protocol { frame_type: Option<u16> },
    StreamReset { status: RstStatus },
    Transport(io::ErrorKind),
    Usage,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::transport(&e.to_string(), e.kind())
    }
}
