use super::*;

pub const SETTINGS_UPLOAD_BANDWIDTH: u32 = 1;
pub const SETTINGS_DOWNLOAD_BANDWIDTH: u32 = 2;
pub const SETTINGS_ROUND_TRIP_TIME: u32 = 3;
pub const SETTINGS_MAX_CONCURRENT_STREAMS: u32 = 4;
pub const SETTINGS_CURRENT_CWND: u32 = 5;
pub const SETTINGS_DOWNLOAD_RETRANS_RATE: u32 = 6;
pub const SETTINGS_INITIAL_WINDOW_SIZE: u32 = 7;
pub const SETTINGS_CLIENT_CERTIFICATE_VECTOR_SIZE: u32 = 8;

pub const FLAG_CLEAR_SETTINGS: u8 = 0x01;
pub const FLAG_SETTINGS_PERSIST_VALUE: u8 = 0x01;
pub const FLAG_SETTINGS_PERSISTED: u8 = 0x02;

const ENTRY_SIZE: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Setting {
    /// 24-bit identifier.
    pub id: u32,
    pub flags: u8,
    pub value: u32,
}

impl Setting {
    pub fn new(id: u32, value: u32) -> Self {
        Self {
            id,
            flags: 0,
            value,
        }
    }

    fn parse(bytes: &[u8], version: Version) -> Self {
        let (id, flags) = match version {
            // SPDY/2 put the id on the wire little-endian.
            Version::V2 => (
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]),
                bytes[3],
            ),
            Version::V3 => (
                u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]),
                bytes[0],
            ),
        };

        Self {
            id,
            flags,
            value: read_u32(&bytes[4..8]),
        }
    }

    fn encode(&self, version: Version) -> [u8; ENTRY_SIZE] {
        let mut bytes = [0; ENTRY_SIZE];
        match version {
            Version::V2 => {
                bytes[0..3].copy_from_slice(&self.id.to_le_bytes()[..3]);
                bytes[3] = self.flags;
            }
            Version::V3 => {
                bytes[0] = self.flags;
                bytes[1..4].copy_from_slice(&self.id.to_be_bytes()[1..]);
            }
        }
        bytes[4..8].copy_from_slice(&self.value.to_be_bytes());

        bytes
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Settings {
    pub clear: bool,
    pub entries: Vec<Setting>,
}

impl Settings {
    pub fn new(entries: Vec<Setting>) -> Self {
        Self {
            clear: false,
            entries,
        }
    }

    pub fn get(&self, id: u32) -> Option<u32> {
        self.entries.iter().find(|s| s.id == id).map(|s| s.value)
    }
}

impl ControlPayload for Settings {
    const KIND: u16 = SETTINGS;

    fn parse(bytes: &[u8], ctx: &mut Context) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::frame("settings frame too short", Self::KIND));
        }
        let count = read_u32(&bytes[0..4]) as usize;
        let entries = &bytes[4..];
        if count.checked_mul(ENTRY_SIZE) != Some(entries.len()) {
            return Err(Error::frame(
                "settings entry count does not match frame length",
                Self::KIND,
            ));
        }

        Ok(Self {
            clear: flag_is_present(FLAG_CLEAR_SETTINGS, ctx.flags),
            entries: entries
                .chunks_exact(ENTRY_SIZE)
                .map(|entry| Setting::parse(entry, ctx.version))
                .collect(),
        })
    }

    fn encode(&self, ctx: &mut Context) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(4 + self.entries.len() * ENTRY_SIZE);
        bytes.extend((self.entries.len() as u32).to_be_bytes());
        for setting in self.entries.iter() {
            bytes.extend(setting.encode(ctx.version));
        }

        Ok(bytes)
    }

    fn flags(&self) -> u8 {
        match self.clear {
            true => FLAG_CLEAR_SETTINGS,
            false => 0,
        }
    }
}
