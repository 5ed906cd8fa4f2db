use super::*;

/// Server's answer to a SYN_STREAM.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SynReply {
    pub stream_id: StreamId,
    pub fin: bool,
    pub headers: HeaderBlock,
}

/// Additional headers on an already open stream.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Headers {
    pub stream_id: StreamId,
    pub fin: bool,
    pub headers: HeaderBlock,
}

/// SYN_REPLY and HEADERS share one layout: a stream id, two unused bytes on
/// SPDY/2, then the compressed block.
fn parse_block(bytes: &[u8], ctx: &mut Context, kind: u16) -> Result<(StreamId, HeaderBlock)> {
    let offset = match ctx.version {
        Version::V2 => 6,
        Version::V3 => 4,
    };
    if bytes.len() < offset {
        return Err(Error::frame("header frame too short", kind));
    }
    let stream_id = expect_stream(read_stream_id(&bytes[0..4]), kind)?;
    let block = ctx.zlib.decompress(&bytes[offset..])?;

    Ok((stream_id, HeaderBlock::decode(&block, ctx.version)?))
}

fn encode_block(stream_id: StreamId, headers: &HeaderBlock, ctx: &mut Context) -> Result<Vec<u8>> {
    let raw = headers.encode(ctx.version)?;
    let block = ctx.zlib.compress(&raw)?;
    let mut bytes = Vec::with_capacity(6 + block.len());
    bytes.extend((stream_id & STREAM_ID_MASK).to_be_bytes());
    if ctx.version == Version::V2 {
        bytes.extend([0, 0]);
    }
    bytes.extend(block);

    Ok(bytes)
}

fn fin_flag(fin: bool) -> u8 {
    match fin {
        true => FLAG_FIN,
        false => 0,
    }
}

impl ControlPayload for SynReply {
    const KIND: u16 = SYN_REPLY;

    fn parse(bytes: &[u8], ctx: &mut Context) -> Result<Self> {
        let (stream_id, headers) = parse_block(bytes, ctx, Self::KIND)?;

        Ok(Self {
            stream_id,
            fin: flag_is_present(FLAG_FIN, ctx.flags),
            headers,
        })
    }

    fn encode(&self, ctx: &mut Context) -> Result<Vec<u8>> {
        encode_block(self.stream_id, &self.headers, ctx)
    }

    fn flags(&self) -> u8 {
        fin_flag(self.fin)
    }
}

impl ControlPayload for Headers {
    const KIND: u16 = HEADERS;

    fn parse(bytes: &[u8], ctx: &mut Context) -> Result<Self> {
        let (stream_id, headers) = parse_block(bytes, ctx, Self::KIND)?;

        Ok(Self {
            stream_id,
            fin: flag_is_present(FLAG_FIN, ctx.flags),
            headers,
        })
    }

    fn encode(&self, ctx: &mut Context) -> Result<Vec<u8>> {
        encode_block(self.stream_id, &self.headers, ctx)
    }

    fn flags(&self) -> u8 {
        fin_flag(self.fin)
    }
}
