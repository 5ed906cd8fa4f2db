pub(crate) mod data;
pub(crate) mod go_away;
pub(crate) mod header_block;
pub(crate) mod headers;
pub(crate) mod ping;
pub(crate) mod rst_stream;
pub(crate) mod settings;
pub(crate) mod syn_stream;
pub(crate) mod window_update;

pub use data::Data;
pub use go_away::{GoAway, GoAwayStatus};
pub use header_block::HeaderBlock;
pub use headers::{Headers, SynReply};
pub use ping::Ping;
pub use rst_stream::{RstStatus, RstStream};
pub use settings::*;
pub use syn_stream::SynStream;
pub use window_update::WindowUpdate;

use crate::zlib::HeaderZlib;
use crate::{Error, Result, StreamId, Version};
use std::fmt::{Display, Formatter};

pub const SYN_STREAM: u16 = 0x01;
pub const SYN_REPLY: u16 = 0x02;
pub const RST_STREAM: u16 = 0x03;
pub const SETTINGS: u16 = 0x04;
pub const NOOP: u16 = 0x05;
pub const PING: u16 = 0x06;
pub const GOAWAY: u16 = 0x07;
pub const HEADERS: u16 = 0x08;
pub const WINDOW_UPDATE: u16 = 0x09;
pub const CREDENTIAL: u16 = 0x0a;

pub const FLAG_FIN: u8 = 0x01;
pub const FLAG_UNIDIRECTIONAL: u8 = 0x02;

pub const FRAME_HEADER_SIZE: usize = 8;

pub(crate) const CONTROL_BIT: u8 = 0x80;
pub(crate) const STREAM_ID_MASK: u32 = 0x7fff_ffff;

/// Everything a control payload needs besides its own bytes.
pub(crate) struct Context<'a> {
    pub version: Version,
    pub flags: u8,
    pub zlib: &'a mut HeaderZlib,
}

pub(crate) trait ControlPayload: Sized {
    const KIND: u16;

    fn parse(bytes: &[u8], ctx: &mut Context) -> Result<Self>;
    fn encode(&self, ctx: &mut Context) -> Result<Vec<u8>>;
    fn flags(&self) -> u8 {
        0
    }
}

/// One decoded unit of the wire protocol.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Frame {
    SynStream(SynStream),
    SynReply(SynReply),
    Headers(Headers),
    Data(Data),
    RstStream(RstStream),
    Settings(Settings),
    Ping(Ping),
    GoAway(GoAway),
    WindowUpdate(WindowUpdate),
}

impl Frame {
    /// `None` for connection scoped frames.
    pub fn stream_id(&self) -> Option<StreamId> {
        match self {
            Self::SynStream(f) => Some(f.stream_id),
            Self::SynReply(f) => Some(f.stream_id),
            Self::Headers(f) => Some(f.stream_id),
            Self::Data(f) => Some(f.stream_id),
            Self::RstStream(f) => Some(f.stream_id),
            Self::WindowUpdate(f) => Some(f.stream_id),
            Self::Settings(_) | Self::Ping(_) | Self::GoAway(_) => None,
        }
    }

    pub fn is_fin(&self) -> bool {
        match self {
            Self::SynStream(f) => f.fin,
            Self::SynReply(f) => f.fin,
            Self::Headers(f) => f.fin,
            Self::Data(f) => f.fin,
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::SynStream(_) => "SynStream",
            Self::SynReply(_) => "SynReply",
            Self::Headers(_) => "Headers",
            Self::Data(_) => "Data",
            Self::RstStream(_) => "RstStream",
            Self::Settings(_) => "Settings",
            Self::Ping(_) => "Ping",
            Self::GoAway(_) => "GoAway",
            Self::WindowUpdate(_) => "WindowUpdate",
        }
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.stream_id() {
            Some(id) => write!(f, "{} {{ stream: {id}, fin: {} }}", self.kind_name(), self.is_fin()),
            None => write!(f, "{}", self.kind_name()),
        }
    }
}

/// The fixed eight bytes in front of every frame.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FrameHeader {
    Control {
        version: u16,
        kind: u16,
        flags: u8,
        length: u32,
    },
    Data {
        stream_id: StreamId,
        flags: u8,
        length: u32,
    },
}

impl FrameHeader {
    pub fn length(&self) -> u32 {
        match self {
            Self::Control { length, .. } | Self::Data { length, .. } => *length,
        }
    }

    pub fn flags(&self) -> u8 {
        match self {
            Self::Control { flags, .. } | Self::Data { flags, .. } => *flags,
        }
    }

    pub fn to_bytes(self) -> [u8; FRAME_HEADER_SIZE] {
        let mut bytes = [0; FRAME_HEADER_SIZE];
        let (first, flags, length) = match self {
            Self::Control {
                version,
                kind,
                flags,
                length,
            } => {
                let first = (((version as u32) | 0x8000) << 16) | kind as u32;
                (first, flags, length)
            }
            Self::Data {
                stream_id,
                flags,
                length,
            } => (stream_id & STREAM_ID_MASK, flags, length),
        };
        bytes[0..4].copy_from_slice(&first.to_be_bytes());
        bytes[4] = flags;
        bytes[5..8].copy_from_slice(&length.to_be_bytes()[1..]);

        bytes
    }
}

impl From<&[u8; FRAME_HEADER_SIZE]> for FrameHeader {
    fn from(bytes: &[u8; FRAME_HEADER_SIZE]) -> Self {
        let flags = bytes[4];
        let length = u32::from_be_bytes([0x00, bytes[5], bytes[6], bytes[7]]);
        match bytes[0] & CONTROL_BIT != 0 {
            true => Self::Control {
                version: u16::from_be_bytes([bytes[0] & !CONTROL_BIT, bytes[1]]),
                kind: u16::from_be_bytes([bytes[2], bytes[3]]),
                flags,
                length,
            },
            false => Self::Data {
                stream_id: read_stream_id(&bytes[0..4]),
                flags,
                length,
            },
        }
    }
}

impl TryFrom<&[u8]> for FrameHeader {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> std::result::Result<Self, Self::Error> {
        let bytes = bytes
            .get(..FRAME_HEADER_SIZE)
            .and_then(|b| <&[u8; FRAME_HEADER_SIZE]>::try_from(b).ok())
            .ok_or_else(|| Error::protocol("truncated frame header"))?;

        Ok(Self::from(bytes))
    }
}

pub(crate) fn flag_is_present(flag: u8, delivered: u8) -> bool {
    delivered & flag != 0x00
}

/// Reads a 31-bit stream id, ignoring the reserved top bit.
pub(crate) fn read_stream_id(bytes: &[u8]) -> StreamId {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) & STREAM_ID_MASK
}

pub(crate) fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub(crate) fn expect_len(bytes: &[u8], expected: usize, kind: u16) -> Result<()> {
    match bytes.len() == expected {
        true => Ok(()),
        false => Err(Error::frame(
            &format!(
                "control frame {kind} has length {}, expected {expected}",
                bytes.len()
            ),
            kind,
        )),
    }
}

pub(crate) fn expect_stream(stream_id: StreamId, kind: u16) -> Result<StreamId> {
    match stream_id {
        0 => Err(Error::frame("frame requires a stream id", kind)),
        id => Ok(id),
    }
}
