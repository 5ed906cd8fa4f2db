use super::*;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GoAwayStatus {
    Ok,
    ProtocolError,
    InternalError,
    Unknown(u32),
}

impl GoAwayStatus {
    pub fn to_u32(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::ProtocolError => 1,
            Self::InternalError => 2,
            Self::Unknown(code) => code,
        }
    }
}

impl From<u32> for GoAwayStatus {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::ProtocolError,
            2 => Self::InternalError,
            code => Self::Unknown(code),
        }
    }
}

/// SPDY/2 has no status on the wire; it decodes as `Ok`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct GoAway {
    pub last_good_stream_id: StreamId,
    pub status: GoAwayStatus,
}

impl GoAway {
    pub fn new(last_good_stream_id: StreamId, status: GoAwayStatus) -> Self {
        Self {
            last_good_stream_id,
            status,
        }
    }
}

impl ControlPayload for GoAway {
    const KIND: u16 = GOAWAY;

    fn parse(bytes: &[u8], ctx: &mut Context) -> Result<Self> {
        let status = match ctx.version {
            Version::V2 => {
                expect_len(bytes, 4, Self::KIND)?;
                GoAwayStatus::Ok
            }
            Version::V3 => {
                expect_len(bytes, 8, Self::KIND)?;
                GoAwayStatus::from(read_u32(&bytes[4..8]))
            }
        };

        Ok(Self {
            last_good_stream_id: read_stream_id(&bytes[0..4]),
            status,
        })
    }

    fn encode(&self, ctx: &mut Context) -> Result<Vec<u8>> {
        let mut bytes = (self.last_good_stream_id & STREAM_ID_MASK)
            .to_be_bytes()
            .to_vec();
        if ctx.version == Version::V3 {
            bytes.extend(self.status.to_u32().to_be_bytes());
        }

        Ok(bytes)
    }
}
