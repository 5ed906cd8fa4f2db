use super::*;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum RstStatus {
    ProtocolError,
    InvalidStream,
    RefusedStream,
    UnsupportedVersion,
    Cancel,
    InternalError,
    FlowControlError,
    StreamInUse,
    StreamAlreadyClosed,
    InvalidCredentials,
    FrameTooLarge,
    Unknown(u32),
}

impl RstStatus {
    pub fn to_u32(self) -> u32 {
        match self {
            Self::ProtocolError => 1,
            Self::InvalidStream => 2,
            Self::RefusedStream => 3,
            Self::UnsupportedVersion => 4,
            Self::Cancel => 5,
            Self::InternalError => 6,
            Self::FlowControlError => 7,
            Self::StreamInUse => 8,
            Self::StreamAlreadyClosed => 9,
            Self::InvalidCredentials => 10,
            Self::FrameTooLarge => 11,
            Self::Unknown(code) => code,
        }
    }
}

impl From<u32> for RstStatus {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::ProtocolError,
            2 => Self::InvalidStream,
            3 => Self::RefusedStream,
            4 => Self::UnsupportedVersion,
            5 => Self::Cancel,
            6 => Self::InternalError,
            7 => Self::FlowControlError,
            8 => Self::StreamInUse,
            9 => Self::StreamAlreadyClosed,
            10 => Self::InvalidCredentials,
            11 => Self::FrameTooLarge,
            code => Self::Unknown(code),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RstStream {
    pub stream_id: StreamId,
    pub status: RstStatus,
}

impl RstStream {
    pub fn new(stream_id: StreamId, status: RstStatus) -> Self {
        Self { stream_id, status }
    }
}

impl ControlPayload for RstStream {
    const KIND: u16 = RST_STREAM;

    fn parse(bytes: &[u8], _ctx: &mut Context) -> Result<Self> {
        expect_len(bytes, 8, Self::KIND)?;

        Ok(Self {
            stream_id: expect_stream(read_stream_id(&bytes[0..4]), Self::KIND)?,
            status: RstStatus::from(read_u32(&bytes[4..8])),
        })
    }

    fn encode(&self, _ctx: &mut Context) -> Result<Vec<u8>> {
        let mut bytes = (self.stream_id & STREAM_ID_MASK).to_be_bytes().to_vec();
        bytes.extend(self.status.to_u32().to_be_bytes());

        Ok(bytes)
    }
}
