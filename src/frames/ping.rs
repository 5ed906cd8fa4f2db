use super::*;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Ping {
    pub id: u32,
}

impl Ping {
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    /// Client pings carry odd ids, server pings even ones.
    pub fn is_client_initiated(&self) -> bool {
        self.id % 2 == 1
    }
}

impl ControlPayload for Ping {
    const KIND: u16 = PING;

    fn parse(bytes: &[u8], _ctx: &mut Context) -> Result<Self> {
        expect_len(bytes, 4, Self::KIND)?;

        Ok(Self {
            id: read_u32(bytes),
        })
    }

    fn encode(&self, _ctx: &mut Context) -> Result<Vec<u8>> {
        Ok(self.id.to_be_bytes().to_vec())
    }
}
