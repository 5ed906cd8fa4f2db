use super::*;

/// Opens a stream. Sent by us for every request, by the server for pushes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SynStream {
    pub stream_id: StreamId,
    pub associated_id: StreamId,
    pub priority: u8,
    /// Credential slot, always zero on SPDY/2.
    pub slot: u8,
    pub fin: bool,
    pub unidirectional: bool,
    pub headers: HeaderBlock,
}

impl SynStream {
    pub fn new(stream_id: StreamId, headers: HeaderBlock) -> Self {
        Self {
            stream_id,
            associated_id: 0,
            priority: 0,
            slot: 0,
            fin: false,
            unidirectional: false,
            headers,
        }
    }

    fn max_priority(version: Version) -> u8 {
        match version {
            Version::V2 => 3,
            Version::V3 => 7,
        }
    }
}

impl ControlPayload for SynStream {
    const KIND: u16 = SYN_STREAM;

    fn parse(bytes: &[u8], ctx: &mut Context) -> Result<Self> {
        if bytes.len() < 10 {
            return Err(Error::frame("syn_stream frame too short", Self::KIND));
        }
        let (priority, slot) = match ctx.version {
            Version::V2 => (bytes[8] >> 6, 0),
            Version::V3 => (bytes[8] >> 5, bytes[9]),
        };
        let block = ctx.zlib.decompress(&bytes[10..])?;

        Ok(Self {
            stream_id: expect_stream(read_stream_id(&bytes[0..4]), Self::KIND)?,
            associated_id: read_stream_id(&bytes[4..8]),
            priority,
            slot,
            fin: flag_is_present(FLAG_FIN, ctx.flags),
            unidirectional: flag_is_present(FLAG_UNIDIRECTIONAL, ctx.flags),
            headers: HeaderBlock::decode(&block, ctx.version)?,
        })
    }

    fn encode(&self, ctx: &mut Context) -> Result<Vec<u8>> {
        let priority = self.priority.min(Self::max_priority(ctx.version));
        let raw = self.headers.encode(ctx.version)?;
        let block = ctx.zlib.compress(&raw)?;
        let mut bytes = Vec::with_capacity(10 + block.len());
        bytes.extend((self.stream_id & STREAM_ID_MASK).to_be_bytes());
        bytes.extend((self.associated_id & STREAM_ID_MASK).to_be_bytes());
        match ctx.version {
            Version::V2 => bytes.extend([priority << 6, 0]),
            Version::V3 => bytes.extend([priority << 5, self.slot]),
        }
        bytes.extend(block);

        Ok(bytes)
    }

    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.fin {
            flags |= FLAG_FIN;
        }
        if self.unidirectional {
            flags |= FLAG_UNIDIRECTIONAL;
        }

        flags
    }
}
