//! BPCM - a lossy audio codec built on 4-bit ADPCM.
//!
//! Blocks of 16-bit PCM are ADPCM-compressed (mid/side decorrelated for
//! stereo), squeezed further by whichever secondary compressor wins, and
//! packed into a self-synchronizing frame container. Runs of silence
//! collapse into frames of a few bytes. The reader resynchronizes through
//! corruption and substitutes silence for payloads it cannot decode, so a
//! damaged stream keeps playing.
//!
//! ```
//! use std::io::Cursor;
//! use libbpcm::{BitstreamReader, EncoderParams, FrameResult, StreamEncoder};
//!
//! # fn main() -> Result<(), libbpcm::Error> {
//! let mut encoder = StreamEncoder::new(48000, 1, EncoderParams::default())?;
//! let block: Vec<i16> = (0..4800)
//!     .map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16)
//!     .collect();
//! let mut stream = encoder.encode_block(&block)?;
//! stream.extend(encoder.finish()?);
//!
//! let mut reader = BitstreamReader::new(Cursor::new(stream))?;
//! while let FrameResult::Frame(frame) = reader.get_frame(true)? {
//!     let pcm = frame.data.unwrap();
//!     assert_eq!(pcm.len() as u32, frame.sample_count);
//! }
//! # Ok(()) }
//! ```

pub mod adpcm;
pub mod compress;
pub mod composer;
pub mod core;
pub mod encoder;
pub mod playback;
pub mod silence;
pub mod stream;

pub use compress::{Algorithm, Compressed};
pub use composer::compose_frame;
pub use core::{
    sample_rate_index, CompressionKind, DataLengthMode, DecodeError, Error,
    Frame, FrameResult, InfoByte, VolumeInfo, SUPPORTED_SAMPLE_RATES, SYNC_BYTE,
};
pub use encoder::{EncoderParams, FrameStatus, StreamEncoder};
pub use playback::{
    RingBuffer, StopReason, WaveProvider, RATE_CHANGE_SETTLE,
};
pub use stream::{BitstreamReader, Stats};
