use super::*;
use bytes::Bytes;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Data {
    pub stream_id: StreamId,
    pub fin: bool,
    pub payload: Bytes,
}

impl Data {
    pub fn new(stream_id: StreamId, payload: impl Into<Bytes>, fin: bool) -> Self {
        Self {
            stream_id,
            fin,
            payload: payload.into(),
        }
    }

    pub(crate) fn header(&self) -> FrameHeader {
        FrameHeader::Data {
            stream_id: self.stream_id,
            flags: match self.fin {
                true => FLAG_FIN,
                false => 0,
            },
            length: self.payload.len() as u32,
        }
    }

    pub(crate) fn parse(stream_id: StreamId, flags: u8, payload: Bytes) -> Result<Self> {
        if stream_id == 0 {
            return Err(Error::protocol("data frame on stream 0"));
        }

        Ok(Self {
            stream_id,
            fin: flag_is_present(FLAG_FIN, flags),
            payload,
        })
    }
}
