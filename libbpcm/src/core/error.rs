//! Error types for the BPCM codec

use thiserror::Error;

/// stream-level errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported sample rate {0} Hz (supported: 44100, 48000, 32000, 24000)")]
    UnsupportedSampleRate(u32),

    #[error("unsupported channel count {0} (supported: 1 or 2)")]
    UnsupportedChannels(u16),

    #[error("unsupported bit depth {0} (only 16-bit integer PCM)")]
    UnsupportedBitDepth(u16),

    #[error("frame payload of {0} bytes exceeds the 24-bit length field")]
    PayloadTooLarge(usize),

    #[error("silent run of {0} samples exceeds the 24-bit counter")]
    SilentRunTooLong(u64),

    #[error("no decodable frames in stream")]
    EmptyStream,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// payload-level decode errors, absorbed by the reader (silence substitution)
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("adpcm payload truncated: need at least {needed} bytes, got {got}")]
    TruncatedPayload { needed: usize, got: usize },

    #[error("adpcm step index {0} out of range")]
    CorruptStepIndex(u8),

    #[error("{backend} decompression failed")]
    Backend { backend: &'static str },
}
