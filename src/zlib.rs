//! Per-connection zlib contexts for header blocks.
//!
//! Both directions keep one long-lived stream seeded with the version
//! dictionary. Every block is sync-flushed so the peer can decode it on its
//! own, but the history carries over, so the contexts must never be reset.

mod dictionary;

use crate::{Error, Result, Version};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

const RESERVE: usize = 256;

pub(crate) struct HeaderZlib {
    deflate: Compress,
    inflate: Decompress,
    dictionary: &'static [u8],
}

impl HeaderZlib {
    pub(crate) fn new(version: Version) -> Result<Self> {
        let dictionary = dictionary::for_version(version);
        let mut deflate = Compress::new(Compression::default(), true);
        deflate
            .set_dictionary(dictionary)
            .map_err(|e| Error::protocol(&format!("could not seed header compressor: {e}")))?;

        Ok(Self {
            deflate,
            inflate: Decompress::new(true),
            dictionary,
        })
    }

    pub(crate) fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len() / 2 + RESERVE);
        let start = self.deflate.total_in();
        loop {
            reserve(&mut out);
            let consumed = (self.deflate.total_in() - start) as usize;
            let written = out.len();
            self.deflate
                .compress_vec(&input[consumed..], &mut out, FlushCompress::Sync)
                .map_err(|e| Error::protocol(&format!("header compression failed: {e}")))?;
            let now = (self.deflate.total_in() - start) as usize;
            let progressed = now != consumed || out.len() != written;
            if now == input.len() && (out.len() < out.capacity() || !progressed) {
                break;
            }
            if !progressed {
                return Err(Error::protocol("header compression stalled"));
            }
        }

        Ok(out)
    }

    pub(crate) fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len() * 4 + RESERVE);
        let start = self.inflate.total_in();
        loop {
            reserve(&mut out);
            let consumed = (self.inflate.total_in() - start) as usize;
            let written = out.len();
            match self
                .inflate
                .decompress_vec(&input[consumed..], &mut out, FlushDecompress::Sync)
            {
                Ok(Status::StreamEnd) => {
                    return Err(Error::protocol("peer finished the header compression stream"))
                }
                Ok(_) => {}
                Err(e) => match e.needs_dictionary() {
                    Some(_) => {
                        self.inflate
                            .set_dictionary(self.dictionary)
                            .map_err(|_| Error::protocol("peer used an unknown header dictionary"))?;
                        continue;
                    }
                    None => return Err(Error::protocol(&format!("malformed header block: {e}"))),
                },
            }
            let now = (self.inflate.total_in() - start) as usize;
            let progressed = now != consumed || out.len() != written;
            if now == input.len() && (out.len() < out.capacity() || !progressed) {
                break;
            }
            if !progressed {
                return Err(Error::protocol("truncated header block"));
            }
        }

        Ok(out)
    }
}

fn reserve(out: &mut Vec<u8>) {
    if out.capacity() - out.len() < RESERVE {
        out.reserve(out.capacity().max(RESERVE));
    }
}
