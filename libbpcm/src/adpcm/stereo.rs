//! Stereo ADPCM with mid/side decorrelation.
//!
//! One byte per sample pair, channel A in the high nibble. With mid/side
//! enabled the channels carry `(l+r)/2` and `(l-r)/2` (truncating division,
//! lossy by design); the decoder runs a fractional predictor and only rounds
//! at the output, which is also where optional dither is applied.

use rand::Rng;

use super::{CodecState, Meter, INDEX_TABLE, STEP_TABLE, STEREO_STATE_BYTES};
use crate::core::{DecodeError, VolumeInfo};

/// stateful stereo encoder
#[derive(Debug, Default)]
pub struct StereoCodec {
    state: [CodecState; 2],
}

impl StereoCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.state = [CodecState::default(); 2];
    }

    pub fn state(&self) -> [CodecState; 2] {
        self.state
    }

    /// Encode one interleaved block. A trailing unpaired sample is dropped.
    ///
    /// The returned payload starts with the 6-byte state header (predictors
    /// and step indices as they were before this block).
    pub fn encode(&mut self, pcm: &[i16], mid_side: bool) -> Vec<u8> {
        let pairs = pcm.len() / 2;
        let mut out = vec![0u8; pairs + STEREO_STATE_BYTES];
        out[0..2].copy_from_slice(&self.state[0].valprev.to_le_bytes());
        out[2..4].copy_from_slice(&self.state[1].valprev.to_le_bytes());
        out[4] = self.state[0].index;
        out[5] = self.state[1].index;

        let mut valprev_a = self.state[0].valprev as i32;
        let mut valprev_b = self.state[1].valprev as i32;
        let mut index_a = self.state[0].index as i32;
        let mut index_b = self.state[1].index as i32;
        let mut step_a = STEP_TABLE[index_a as usize];
        let mut step_b = STEP_TABLE[index_b as usize];

        for (n, pair) in pcm.chunks_exact(2).enumerate() {
            let (l, r) = (pair[0] as i32, pair[1] as i32);
            let (sample_a, sample_b) = if mid_side {
                ((l + r) / 2, (l - r) / 2)
            } else {
                (l, r)
            };

            let nibble_a = quantize(sample_a, &mut valprev_a, &mut index_a, &mut step_a);
            let nibble_b = quantize(sample_b, &mut valprev_b, &mut index_b, &mut step_b);
            out[n + STEREO_STATE_BYTES] = (nibble_a << 4) | nibble_b;
        }

        self.state[0] = CodecState {
            valprev: valprev_a as i16,
            index: index_a as u8,
        };
        self.state[1] = CodecState {
            valprev: valprev_b as i16,
            index: index_b as u8,
        };
        out
    }
}

fn quantize(sample: i32, valprev: &mut i32, index: &mut i32, step: &mut i32) -> u8 {
    let mut delta = sample - *valprev;
    let sign = if delta < 0 { 8 } else { 0 };
    if sign == 8 {
        delta = -delta;
    }

    let mut code = ((delta * 4) as f64 / *step as f64).round_ties_even() as i32;
    if code > 7 {
        code = 7;
    }

    let vpdiff = ((code * *step) as f64 / 4.0).round_ties_even() as i32;
    if sign == 8 {
        *valprev -= vpdiff;
    } else {
        *valprev += vpdiff;
    }
    *valprev = (*valprev).clamp(i16::MIN as i32, i16::MAX as i32);

    let nibble = (code | sign) as u8;
    *index += INDEX_TABLE[nibble as usize] as i32;
    *index = (*index).clamp(0, 88);
    *step = STEP_TABLE[*index as usize];
    nibble
}

/// Decode one stereo block into interleaved PCM, metering levels before
/// `volume` is applied. A payload shorter than the state header is an error;
/// an exactly-header-sized payload decodes to zero samples.
pub fn decode_stereo(
    payload: &[u8],
    mid_side: bool,
    volume: f32,
    dither: bool,
) -> Result<(Vec<i16>, VolumeInfo), DecodeError> {
    if payload.len() < STEREO_STATE_BYTES {
        return Err(DecodeError::TruncatedPayload {
            needed: STEREO_STATE_BYTES,
            got: payload.len(),
        });
    }
    if payload[4] > 88 {
        return Err(DecodeError::CorruptStepIndex(payload[4]));
    }
    if payload[5] > 88 {
        return Err(DecodeError::CorruptStepIndex(payload[5]));
    }

    let mut valprev_a = f64::from(i16::from_le_bytes([payload[0], payload[1]]));
    let mut valprev_b = f64::from(i16::from_le_bytes([payload[2], payload[3]]));
    let mut index_a = payload[4] as i32;
    let mut index_b = payload[5] as i32;
    let mut step_a = STEP_TABLE[index_a as usize];
    let mut step_b = STEP_TABLE[index_b as usize];

    let pairs = payload.len() - STEREO_STATE_BYTES;
    let mut out = Vec::with_capacity(pairs * 2);
    let mut meter = Meter::default();
    let vol = f64::from(volume);
    let mut rng = rand::thread_rng();

    for &byte in &payload[STEREO_STATE_BYTES..] {
        reconstruct(byte >> 4, &mut valprev_a, &mut index_a, &mut step_a);
        reconstruct(byte & 0xF, &mut valprev_b, &mut index_b, &mut step_b);

        let (ta, tb) = if mid_side {
            (valprev_a + valprev_b, valprev_a - valprev_b)
        } else {
            (valprev_a, valprev_b)
        };
        let (ta, tb) = if dither {
            if rng.gen_bool(0.5) {
                (ta.ceil(), tb.ceil())
            } else {
                (ta.floor(), tb.floor())
            }
        } else {
            (ta.round_ties_even(), tb.round_ties_even())
        };

        let mut sa = ta.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i32;
        let mut sb = tb.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i32;
        meter.push(0, sa.unsigned_abs());
        meter.push(1, sb.unsigned_abs());

        if volume != 1.0 {
            sa = (f64::from(sa) * vol).round_ties_even() as i32;
            sb = (f64::from(sb) * vol).round_ties_even() as i32;
            sa = sa.clamp(i16::MIN as i32, i16::MAX as i32);
            sb = sb.clamp(i16::MIN as i32, i16::MAX as i32);
        }

        out.push(sa as i16);
        out.push(sb as i16);
    }

    Ok((out, meter.finish()))
}

fn reconstruct(nibble: u8, valprev: &mut f64, index: &mut i32, step: &mut i32) {
    let code = nibble as i32;
    *index += INDEX_TABLE[code as usize] as i32;
    *index = (*index).clamp(0, 88);

    let vpdiff = ((code & 7) * *step) as f64 / 4.0;
    if code & 8 != 0 {
        *valprev -= vpdiff;
    } else {
        *valprev += vpdiff;
    }
    *step = STEP_TABLE[*index as usize];
}
