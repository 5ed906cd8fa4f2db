use std::fmt::{Display, Formatter};

pub mod config;
pub mod connection;
pub mod error;
pub mod frames;
pub mod framer;
pub mod request;
pub(crate) mod stream;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod transport;
mod zlib;

pub use config::{ConfigBuilder, ConnectionConfig};
pub use connection::{Connection, ConnectionDelegate, ConnectionState, PeerSettings};
pub use error::{Error, ErrorKind};
pub use frames::{Frame, HeaderBlock, RstStatus};
pub use framer::Framer;
pub use request::{Request, RequestDelegate};
pub use stream::StreamState;
pub use transport::{TcpTransport, Transport};

pub type Result<T> = std::result::Result<T, Error>;
pub type Success = Result<()>;
pub type StreamId = u32;

/// Largest payload a 24-bit frame length can describe.
pub const MAX_FRAME_SIZE: u32 = 0x00ff_ffff;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Version {
    V2,
    V3,
}

impl Version {
    pub fn number(self) -> u16 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }

    pub fn alpn(self) -> &'static [u8] {
        match self {
            Self::V2 => b"spdy/2",
            Self::V3 => b"spdy/3",
        }
    }

    pub fn max_frame_size(self) -> u32 {
        MAX_FRAME_SIZE
    }

    /// Per-stream send window a new stream starts with, `None` when the
    /// version has no flow control.
    pub fn initial_window_size(self) -> Option<u32> {
        match self {
            Self::V2 => None,
            Self::V3 => Some(64 * 1024),
        }
    }

    pub(crate) fn has_flow_control(self) -> bool {
        self.initial_window_size().is_some()
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::V3
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let v = match &self {
            Self::V2 => "SPDY/2",
            Self::V3 => "SPDY/3",
        };
        write!(f, "{v}")
    }
}

impl TryFrom<u16> for Version {
    type Error = Error;

    fn try_from(number: u16) -> Result<Self> {
        match number {
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            _ => Err(Error::protocol(&format!("unsupported spdy version {number}"))),
        }
    }
}
