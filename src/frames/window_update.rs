use super::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WindowUpdate {
    pub stream_id: StreamId,
    pub delta: u32,
}

impl WindowUpdate {
    pub fn new(stream_id: StreamId, delta: u32) -> Self {
        Self { stream_id, delta }
    }
}

impl ControlPayload for WindowUpdate {
    const KIND: u16 = WINDOW_UPDATE;

    fn parse(bytes: &[u8], _ctx: &mut Context) -> Result<Self> {
        expect_len(bytes, 8, Self::KIND)?;
        let delta = read_u32(&bytes[4..8]) & STREAM_ID_MASK;
        if delta == 0 {
            return Err(Error::frame("window update with zero delta", Self::KIND));
        }

        Ok(Self {
            stream_id: expect_stream(read_stream_id(&bytes[0..4]), Self::KIND)?,
            delta,
        })
    }

    fn encode(&self, _ctx: &mut Context) -> Result<Vec<u8>> {
        let mut bytes = (self.stream_id & STREAM_ID_MASK).to_be_bytes().to_vec();
        bytes.extend((self.delta & STREAM_ID_MASK).to_be_bytes());

        Ok(bytes)
    }
}
