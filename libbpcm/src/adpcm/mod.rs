//! 4-bit ADPCM codecs.
//!
//! Each nibble carries a sign bit and a 3-bit magnitude; the quantizer step
//! adapts through an 89-entry table. Codec state persists across frames, and
//! every compressed block starts with a serialized copy of the state as it
//! was before the block, so any frame can be decoded in isolation.
//!
//! The stereo codec packs one sample pair per byte and reconstructs on a
//! fractional predictor; the mono codec packs two consecutive samples per
//! byte on an integer predictor.

mod mono;
mod stereo;

pub use mono::{decode_mono, MonoCodec};
pub use stereo::{decode_stereo, StereoCodec};

/// state-header bytes at the start of a stereo block
pub const STEREO_STATE_BYTES: usize = 6;
/// state-header bytes at the start of a mono block
pub const MONO_STATE_BYTES: usize = 3;

pub(crate) const INDEX_TABLE: [i8; 16] = [
    -1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8,
];

pub(crate) const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41,
    45, 50, 55, 60, 66, 73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190,
    209, 230, 253, 279, 307, 337, 371, 408, 449, 494, 544, 598, 658, 724,
    796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066, 2272,
    2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132,
    7845, 8630, 9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350,
    22385, 24623, 27086, 29794, 32767,
];

/// per-channel predictor state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CodecState {
    pub valprev: i16,
    pub index: u8,
}

/// Running peak and IIR average per channel, fed the reconstructed signal
/// before volume scaling.
#[derive(Debug, Default)]
pub(crate) struct Meter {
    peak: [u32; 2],
    avg: [u32; 2],
}

impl Meter {
    pub(crate) fn push(&mut self, channel: usize, level: u32) {
        if level > self.peak[channel] {
            self.peak[channel] = level;
        }
        self.avg[channel] =
            ((self.avg[channel] + level * 2) as f64 / 3.0).round_ties_even() as u32;
    }

    pub(crate) fn finish(self) -> crate::core::VolumeInfo {
        crate::core::VolumeInfo::from_linear(self.peak, self.avg)
    }
}
