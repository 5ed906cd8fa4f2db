use crate::Version;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Connection tuning knobs. Anything left unset falls back to what the
/// protocol version prescribes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ConnectionConfig {
    /// Upper bound for a single frame payload, in both directions.
    pub max_frame_size: Option<u32>,
    /// Receive window advertised to the peer for every stream (SPDY/3).
    pub initial_window_size: Option<u32>,
    pub read_buffer_size: usize,
    pub tcp_nodelay: bool,
}

impl ConnectionConfig {
    pub const DEFAULT_READ_BUFFER: usize = 16384;

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub(crate) fn receive_window(&self, version: Version) -> Option<u32> {
        match version.initial_window_size() {
            Some(default) => Some(self.initial_window_size.unwrap_or(default)),
            None => None,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_size: None,
            initial_window_size: None,
            read_buffer_size: Self::DEFAULT_READ_BUFFER,
            tcp_nodelay: true,
        }
    }
}

impl From<ConfigBuilder> for ConnectionConfig {
    fn from(builder: ConfigBuilder) -> Self {
        Self {
            max_frame_size: builder.max_frame_size,
            initial_window_size: builder.initial_window_size,
            read_buffer_size: builder.read_buffer_size.max(1),
            tcp_nodelay: builder.tcp_nodelay,
        }
    }
}

pub struct ConfigBuilder {
    pub(crate) max_frame_size: Option<u32>,
    pub(crate) initial_window_size: Option<u32>,
    pub(crate) read_buffer_size: usize,
    pub(crate) tcp_nodelay: bool,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        let config = ConnectionConfig::default();
        Self {
            max_frame_size: config.max_frame_size,
            initial_window_size: config.initial_window_size,
            read_buffer_size: config.read_buffer_size,
            tcp_nodelay: config.tcp_nodelay,
        }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> ConnectionConfig {
        self.into()
    }

    pub fn max_frame_size(self, size: u32) -> Self {
        Self {
            max_frame_size: Some(size),
            ..self
        }
    }

    pub fn initial_window_size(self, size: u32) -> Self {
        Self {
            initial_window_size: Some(size),
            ..self
        }
    }

    pub fn read_buffer_size(self, size: usize) -> Self {
        Self {
            read_buffer_size: size,
            ..self
        }
    }

    pub fn tcp_nodelay(self, enabled: bool) -> Self {
        Self {
            tcp_nodelay: enabled,
            ..self
        }
    }
}
