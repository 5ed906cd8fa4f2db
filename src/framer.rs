//! Resumable frame codec.
//!
//! The framer owns the connection's decode cursor and both header compression
//! contexts. Bytes may arrive in arbitrary slices; whatever does not yet form a
//! whole frame stays buffered until the next call.

use crate::frames::*;
use crate::zlib::HeaderZlib;
use crate::{Error, Result, Version};
use bytes::{Buf, BytesMut};
use tracing::trace;

pub struct Framer {
    version: Version,
    zlib: HeaderZlib,
    buffer: BytesMut,
    max_frame_size: u32,
    /// Set once the inbound byte stream can no longer be trusted.
    read_failure: Option<Error>,
    /// Set once the deflate history may have drifted from the peer's.
    write_failure: Option<Error>,
}

impl Framer {
    pub const DEFAULT_BUFFER: usize = 16384;

    pub fn new(version: Version) -> Result<Self> {
        Ok(Self {
            version,
            zlib: HeaderZlib::new(version)?,
            buffer: BytesMut::with_capacity(Self::DEFAULT_BUFFER),
            max_frame_size: version.max_frame_size(),
            read_failure: None,
            write_failure: None,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    /// Lowers the frame size limit; it never rises above what the version's
    /// 24-bit length field allows.
    pub fn set_max_frame_size(&mut self, size: u32) {
        self.max_frame_size = size.clamp(1, self.version.max_frame_size());
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_failed(&self) -> bool {
        self.read_failure.is_some() || self.write_failure.is_some()
    }

    /// Appends `chunk` to the decode buffer and returns the frames that are now
    /// complete. The iterator stops at the first error, after which the framer
    /// refuses all further input. Encoding frames without a header block still
    /// works, so a GOAWAY can go out.
    pub fn decode(&mut self, chunk: &[u8]) -> Decoded<'_> {
        if self.read_failure.is_none() {
            self.buffer.extend_from_slice(chunk);
        }

        Decoded {
            framer: self,
            done: false,
        }
    }

    pub fn encode(&mut self, frame: &Frame) -> Result<Vec<u8>> {
        if let Some(err) = &self.write_failure {
            return Err(err.clone());
        }
        match frame {
            Frame::Data(data) => self.encode_data(data),
            Frame::SynStream(f) => self.encode_control(f),
            Frame::SynReply(f) => self.encode_control(f),
            Frame::Headers(f) => self.encode_control(f),
            Frame::RstStream(f) => self.encode_control(f),
            Frame::Settings(f) => self.encode_control(f),
            Frame::Ping(f) => self.encode_control(f),
            Frame::GoAway(f) => self.encode_control(f),
            Frame::WindowUpdate(f) => self.encode_control(f),
        }
    }

    fn encode_data(&self, data: &Data) -> Result<Vec<u8>> {
        if data.payload.len() > self.max_frame_size as usize {
            return Err(Error::usage(&format!(
                "data frame of {} bytes exceeds the {} byte limit",
                data.payload.len(),
                self.max_frame_size
            ))
            .on_stream(data.stream_id));
        }
        let mut bytes = Vec::with_capacity(FRAME_HEADER_SIZE + data.payload.len());
        bytes.extend(data.header().to_bytes());
        bytes.extend(&data.payload[..]);

        Ok(bytes)
    }

    fn encode_control<P: ControlPayload>(&mut self, payload: &P) -> Result<Vec<u8>> {
        let flags = payload.flags();
        let mut ctx = Context {
            version: self.version,
            flags,
            zlib: &mut self.zlib,
        };
        let body = match payload.encode(&mut ctx) {
            Ok(body) => body,
            // Refused before anything reached the deflate history.
            Err(e) if !e.is_fatal() => return Err(e),
            Err(e) => return Err(self.fail_write(e)),
        };
        if body.len() > self.max_frame_size as usize {
            // The header block is already part of the deflate history.
            return Err(self.fail_write(Error::frame(
                "control frame exceeds frame size limit",
                P::KIND,
            )));
        }
        let header = FrameHeader::Control {
            version: self.version.number(),
            kind: P::KIND,
            flags,
            length: body.len() as u32,
        };
        let mut bytes = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
        bytes.extend(header.to_bytes());
        bytes.extend(body);

        Ok(bytes)
    }

    fn fail_read(&mut self, err: Error) -> Error {
        self.buffer.clear();
        self.read_failure = Some(err.clone());

        err
    }

    fn fail_write(&mut self, err: Error) -> Error {
        self.write_failure = Some(err.clone());

        err
    }

    fn next_frame(&mut self) -> Option<Result<Frame>> {
        if let Some(err) = &self.read_failure {
            return Some(Err(err.clone()));
        }
        loop {
            if self.buffer.len() < FRAME_HEADER_SIZE {
                return None;
            }
            let header = match FrameHeader::try_from(&self.buffer[..]) {
                Ok(header) => header,
                Err(e) => return Some(Err(self.fail_read(e))),
            };
            if let Err(e) = self.check_header(&header) {
                return Some(Err(self.fail_read(e)));
            }
            let length = header.length() as usize;
            if self.buffer.len() < FRAME_HEADER_SIZE + length {
                return None;
            }
            self.buffer.advance(FRAME_HEADER_SIZE);
            let payload = self.buffer.split_to(length).freeze();
            let frame = match header {
                FrameHeader::Data {
                    stream_id, flags, ..
                } => Data::parse(stream_id, flags, payload).map(Frame::Data),
                FrameHeader::Control { kind, flags, .. } => {
                    match self.parse_control(kind, flags, &payload) {
                        Some(frame) => frame,
                        None => {
                            trace!(kind, "skipping control frame");
                            continue;
                        }
                    }
                }
            };
            return match frame {
                Ok(frame) => {
                    trace!(%frame, "decoded frame");
                    Some(Ok(frame))
                }
                Err(e) => Some(Err(self.fail_read(e))),
            };
        }
    }

    fn check_header(&self, header: &FrameHeader) -> Result<()> {
        if header.length() > self.max_frame_size {
            return Err(Error::protocol(&format!(
                "frame length {} exceeds the {} byte limit",
                header.length(),
                self.max_frame_size
            )));
        }
        match header {
            FrameHeader::Control { version, kind, .. } if *version != self.version.number() => {
                Err(Error::frame(
                    &format!("control frame for version {version}, expected {}", self.version.number()),
                    *kind,
                ))
            }
            _ => Ok(()),
        }
    }

    /// `None` for frame types this client accepts but has no use for.
    fn parse_control(&mut self, kind: u16, flags: u8, payload: &[u8]) -> Option<Result<Frame>> {
        let mut ctx = Context {
            version: self.version,
            flags,
            zlib: &mut self.zlib,
        };
        let frame = match kind {
            SYN_STREAM => SynStream::parse(payload, &mut ctx).map(Frame::SynStream),
            SYN_REPLY => SynReply::parse(payload, &mut ctx).map(Frame::SynReply),
            HEADERS => Headers::parse(payload, &mut ctx).map(Frame::Headers),
            RST_STREAM => RstStream::parse(payload, &mut ctx).map(Frame::RstStream),
            SETTINGS => Settings::parse(payload, &mut ctx).map(Frame::Settings),
            PING => Ping::parse(payload, &mut ctx).map(Frame::Ping),
            GOAWAY => GoAway::parse(payload, &mut ctx).map(Frame::GoAway),
            WINDOW_UPDATE => WindowUpdate::parse(payload, &mut ctx).map(Frame::WindowUpdate),
            NOOP if self.version == Version::V2 => return None,
            CREDENTIAL if self.version == Version::V3 => return None,
            unknown => Err(Error::frame(&format!("unknown control frame type {unknown}"), unknown)),
        };

        Some(frame)
    }
}

/// Frames completed by one [`Framer::decode`] call.
pub struct Decoded<'a> {
    framer: &'a mut Framer,
    done: bool,
}

impl Iterator for Decoded<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.framer.next_frame();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }

        next
    }
}
