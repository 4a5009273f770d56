//! Secondary compression of ADPCM payloads.
//!
//! Every payload is tagged with a [`CompressionKind`] in the frame's info
//! byte. The selector either applies one kind directly or races several and
//! keeps the smallest output; a backend failure disqualifies that candidate
//! rather than failing the frame, and if nothing wins the payload is stored
//! uncompressed.

mod arith;

use std::io::{Read, Write};

use tracing::warn;

use crate::core::{CompressionKind, DecodeError};

/// decoded payloads are never anywhere near this; caps corrupt-input allocation
const MAX_DECODED_LEN: usize = 1 << 28;

/// selector strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// store uncompressed
    None,
    Brotli,
    Lzma,
    Arithmetic,
    /// race the two cheap coders (arithmetic, lzma), keep the smaller
    Fast,
    /// race everything
    BruteForce,
}

/// a selected payload and the kind tag that goes in the info byte
#[derive(Debug)]
pub struct Compressed {
    pub data: Vec<u8>,
    pub kind: CompressionKind,
}

/// compress `data` with the given strategy
pub fn compress(data: &[u8], algorithm: Algorithm) -> Compressed {
    let candidates: &[CompressionKind] = match algorithm {
        Algorithm::None => {
            return Compressed {
                data: data.to_vec(),
                kind: CompressionKind::None,
            }
        }
        Algorithm::Brotli => &[CompressionKind::Brotli],
        Algorithm::Lzma => &[CompressionKind::Lzma],
        Algorithm::Arithmetic => &[CompressionKind::Arithmetic],
        Algorithm::Fast => &[CompressionKind::Arithmetic, CompressionKind::Lzma],
        Algorithm::BruteForce => &[
            CompressionKind::Arithmetic,
            CompressionKind::Brotli,
            CompressionKind::Lzma,
        ],
    };

    let mut best: Option<Compressed> = None;
    for &kind in candidates {
        match compress_one(data, kind) {
            Some(out) => {
                if best.as_ref().map_or(true, |b| out.len() < b.data.len()) {
                    best = Some(Compressed { data: out, kind });
                }
            }
            None => warn!(kind = kind.label(), "compressor failed, candidate skipped"),
        }
    }
    best.unwrap_or_else(|| Compressed {
        data: data.to_vec(),
        kind: CompressionKind::None,
    })
}

fn compress_one(data: &[u8], kind: CompressionKind) -> Option<Vec<u8>> {
    match kind {
        CompressionKind::None => Some(data.to_vec()),
        CompressionKind::Brotli => {
            let mut out = Vec::new();
            {
                let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 9, 22);
                writer.write_all(data).ok()?;
            }
            Some(out)
        }
        CompressionKind::Lzma => {
            let mut input = data;
            let mut out = Vec::new();
            lzma_rs::lzma_compress(&mut input, &mut out).ok()?;
            Some(out)
        }
        CompressionKind::Arithmetic => Some(arith::encode(data)),
    }
}

/// decompress a payload by its kind tag
pub fn decompress(data: &[u8], kind: CompressionKind) -> Result<Vec<u8>, DecodeError> {
    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Brotli => {
            let mut out = Vec::new();
            let mut reader = brotli::Decompressor::new(data, 4096);
            reader
                .read_to_end(&mut out)
                .map_err(|_| DecodeError::Backend { backend: "brotli" })?;
            if out.len() > MAX_DECODED_LEN {
                return Err(DecodeError::Backend { backend: "brotli" });
            }
            Ok(out)
        }
        CompressionKind::Lzma => {
            let mut input = data;
            let mut out = Vec::new();
            lzma_rs::lzma_decompress(&mut input, &mut out)
                .map_err(|_| DecodeError::Backend { backend: "lzma" })?;
            if out.len() > MAX_DECODED_LEN {
                return Err(DecodeError::Backend { backend: "lzma" });
            }
            Ok(out)
        }
        CompressionKind::Arithmetic => arith::decode(data, MAX_DECODED_LEN),
    }
}
