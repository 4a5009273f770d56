//! Core types for the BPCM bitstream

use crate::core::error::Error;

/// marks the start of every frame
pub const SYNC_BYTE: u8 = 0xB1;

/// indexable by the two sample-rate bits of the info byte
pub const SUPPORTED_SAMPLE_RATES: [u32; 4] = [44100, 48000, 32000, 24000];

/// info-byte index for a sample rate, if supported
pub fn sample_rate_index(rate: u32) -> Option<u8> {
    SUPPORTED_SAMPLE_RATES
        .iter()
        .position(|&r| r == rate)
        .map(|i| i as u8)
}

/// width of the data-length field (bits 7..6 of the info byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLengthMode {
    /// no payload; the frame is a silent run
    Silent = 0,
    /// 1-byte length
    Byte = 1,
    /// 2-byte length
    Word = 2,
    /// 3-byte length
    Wide = 3,
}

impl From<u8> for DataLengthMode {
    fn from(value: u8) -> Self {
        match value & 3 {
            1 => DataLengthMode::Byte,
            2 => DataLengthMode::Word,
            3 => DataLengthMode::Wide,
            _ => DataLengthMode::Silent,
        }
    }
}

impl DataLengthMode {
    /// bytes occupied by the length field
    pub fn field_width(self) -> usize {
        self as usize
    }

    /// smallest mode that can hold a payload of `len` bytes
    pub fn for_payload(len: usize) -> Result<Self, Error> {
        match len {
            0..=0xFF => Ok(DataLengthMode::Byte),
            0x100..=0xFFFF => Ok(DataLengthMode::Word),
            0x1_0000..=0xFF_FFFF => Ok(DataLengthMode::Wide),
            _ => Err(Error::PayloadTooLarge(len)),
        }
    }
}

/// secondary compressor applied to the ADPCM payload (bits 5..4 of the info byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    None = 0,
    Brotli = 1,
    Lzma = 2,
    Arithmetic = 3,
}

impl From<u8> for CompressionKind {
    fn from(value: u8) -> Self {
        match value & 3 {
            1 => CompressionKind::Brotli,
            2 => CompressionKind::Lzma,
            3 => CompressionKind::Arithmetic,
            _ => CompressionKind::None,
        }
    }
}

impl CompressionKind {
    pub fn label(self) -> &'static str {
        match self {
            CompressionKind::None => "none",
            CompressionKind::Brotli => "brotli",
            CompressionKind::Lzma => "lzma",
            CompressionKind::Arithmetic => "arithmetic",
        }
    }
}

/// Decoded view of the packed info byte.
///
/// Layout, MSB to LSB: 2-bit data-length mode, 2-bit compression kind,
/// 1-bit channels-1, 1-bit use-last-sample-count, 2-bit sample-rate index.
/// Silent frames reuse the compression bits as the byte width of the
/// sample-count field that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoByte {
    pub data_length: DataLengthMode,
    pub compression: CompressionKind,
    pub channels: u8,
    pub use_last_sample_count: bool,
    pub sample_rate: u32,
}

impl InfoByte {
    /// every bit pattern decodes; plausibility is checked separately
    pub fn parse(byte: u8) -> Self {
        InfoByte {
            data_length: DataLengthMode::from(byte >> 6),
            compression: CompressionKind::from(byte >> 4),
            channels: ((byte >> 3) & 1) + 1,
            use_last_sample_count: (byte >> 2) & 1 == 1,
            sample_rate: SUPPORTED_SAMPLE_RATES[(byte & 3) as usize],
        }
    }

    pub fn compose(&self) -> Result<u8, Error> {
        if !(1..=2).contains(&self.channels) {
            return Err(Error::UnsupportedChannels(self.channels as u16));
        }
        let sr = sample_rate_index(self.sample_rate)
            .ok_or(Error::UnsupportedSampleRate(self.sample_rate))?;
        Ok(((self.data_length as u8) << 6)
            | ((self.compression as u8) << 4)
            | ((self.channels - 1) << 3)
            | ((self.use_last_sample_count as u8) << 2)
            | sr)
    }

    /// a silent frame with zero width bits cannot carry its sample count
    pub fn is_plausible(&self) -> bool {
        !(self.data_length == DataLengthMode::Silent
            && self.compression == CompressionKind::None)
    }

    /// byte width of the sample-count field of a silent frame
    pub fn silent_count_width(&self) -> Option<usize> {
        if self.data_length == DataLengthMode::Silent && self.is_plausible() {
            Some(self.compression as usize)
        } else {
            None
        }
    }
}

/// linear level to dBFS, with a natural -inf for zero
pub(crate) fn to_db(level: u32) -> f64 {
    20.0 * (level as f64 / 32767.0).log10()
}

/// Peak and IIR-averaged levels per channel, in dBFS.
///
/// Measured on the reconstructed signal before volume scaling; channel 1
/// stays at -inf for mono content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeInfo {
    pub peak_db: [f64; 2],
    pub avg_db: [f64; 2],
}

impl VolumeInfo {
    pub fn silent() -> Self {
        VolumeInfo {
            peak_db: [f64::NEG_INFINITY; 2],
            avg_db: [f64::NEG_INFINITY; 2],
        }
    }

    pub(crate) fn from_linear(peak: [u32; 2], avg: [u32; 2]) -> Self {
        VolumeInfo {
            peak_db: [to_db(peak[0]), to_db(peak[1])],
            avg_db: [to_db(avg[0]), to_db(avg[1])],
        }
    }
}

impl Default for VolumeInfo {
    fn default() -> Self {
        VolumeInfo::silent()
    }
}

/// one frame of the stream, as returned by the reader
#[derive(Debug, Clone)]
pub struct Frame {
    /// sequential frame index
    pub number: usize,
    /// start time in seconds from the beginning of the stream
    pub timestamp: f64,
    /// seconds covered by this frame
    pub duration: f64,
    /// samples per channel
    pub sample_count: u32,
    pub channels: u8,
    pub sample_rate: u32,
    pub compression: CompressionKind,
    /// silent-run frame, no payload
    pub silent: bool,
    /// payload bytes on the wire
    pub data_length: u32,
    /// header bytes on the wire (sync + info + count + length fields)
    pub header_length: u8,
    /// byte offset of the sync byte
    pub offset: u64,
    /// interleaved PCM when decoded, None for headers-only reads
    pub data: Option<Vec<i16>>,
    pub volume: VolumeInfo,
}

impl Frame {
    /// display label; silent frames report "silence" rather than a kind
    pub fn compression_label(&self) -> &'static str {
        if self.silent {
            "silence"
        } else {
            self.compression.label()
        }
    }

    /// total bytes this frame occupies on the wire
    pub fn wire_length(&self) -> u64 {
        self.data_length as u64 + self.header_length as u64
    }
}

/// outcome of a `get_frame` call
#[derive(Debug)]
pub enum FrameResult {
    Frame(Frame),
    EndOfStream,
}
