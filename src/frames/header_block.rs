use crate::{Error, Result, Version};
use std::collections::HashMap;

/// Ordered name/value pairs carried by SYN_STREAM, SYN_REPLY and HEADERS.
///
/// Names are stored lowercase. Multiple values for one name travel as a single
/// NUL separated value, the way the protocol joins them.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct HeaderBlock(Vec<(String, String)>);

impl HeaderBlock {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => {
                existing.push('\0');
                existing.push_str(value);
            }
            None => self.0.push((name, value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Response status, looked up under the version's name for it.
    pub fn status(&self, version: Version) -> Option<&str> {
        match version {
            Version::V2 => self.get("status"),
            Version::V3 => self.get(":status"),
        }
    }

    /// Uncompressed block. Counts and lengths the version's length fields
    /// cannot hold are a usage error.
    pub(crate) fn encode(&self, version: Version) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(
            4 + self.0.iter().map(|(n, v)| n.len() + v.len() + 8).sum::<usize>(),
        );
        write_len(&mut bytes, self.0.len(), version)?;
        for (name, value) in self.0.iter() {
            write_len(&mut bytes, name.len(), version)?;
            bytes.extend(name.as_bytes());
            write_len(&mut bytes, value.len(), version)?;
            bytes.extend(value.as_bytes());
        }

        Ok(bytes)
    }

    pub(crate) fn decode(bytes: &[u8], version: Version) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        let mut cursor = Cursor { bytes, pos: 0 };
        let count = cursor.read_len(version)?;
        let mut pairs = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let name = cursor.read_string(version)?;
            if name.is_empty() {
                return Err(Error::protocol("empty header name"));
            }
            let value = cursor.read_string(version)?;
            pairs.push((name, value));
        }
        if cursor.pos != bytes.len() {
            return Err(Error::protocol("trailing bytes after header block"));
        }

        Ok(Self(pairs))
    }
}

impl From<&HashMap<String, String>> for HeaderBlock {
    fn from(map: &HashMap<String, String>) -> Self {
        let mut block = Self::new();
        let mut names = map.keys().collect::<Vec<&String>>();
        names.sort();
        for name in names {
            block.insert(name, &map[name]);
        }

        block
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for HeaderBlock {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut block = Self::new();
        iter.into_iter().for_each(|(n, v)| block.insert(n, v));

        block
    }
}

fn write_len(bytes: &mut Vec<u8>, len: usize, version: Version) -> Result<()> {
    let too_long = || Error::usage(&format!("header length {len} does not fit {version}"));
    match version {
        Version::V2 => bytes.extend(u16::try_from(len).map_err(|_| too_long())?.to_be_bytes()),
        Version::V3 => bytes.extend(u32::try_from(len).map_err(|_| too_long())?.to_be_bytes()),
    }

    Ok(())
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| Error::protocol("truncated header block"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;

        Ok(slice)
    }

    fn read_len(&mut self, version: Version) -> Result<usize> {
        match version {
            Version::V2 => {
                let b = self.take(2)?;
                Ok(u16::from_be_bytes([b[0], b[1]]) as usize)
            }
            Version::V3 => {
                let b = self.take(4)?;
                Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
            }
        }
    }

    fn read_string(&mut self, version: Version) -> Result<String> {
        let len = self.read_len(version)?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::protocol("header is not valid utf-8"))
    }
}
