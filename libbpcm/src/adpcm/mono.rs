//! Mono ADPCM, two samples per byte (first sample in the high nibble).
//!
//! Runs entirely on an integer predictor clamped in-loop, so there is no
//! fractional output and no dither stage.

use super::{CodecState, Meter, INDEX_TABLE, MONO_STATE_BYTES, STEP_TABLE};
use crate::core::{DecodeError, VolumeInfo};

/// stateful mono encoder
#[derive(Debug, Default)]
pub struct MonoCodec {
    state: CodecState,
}

impl MonoCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.state = CodecState::default();
    }

    pub fn state(&self) -> CodecState {
        self.state
    }

    /// Encode one block. A trailing odd sample is dropped. The payload
    /// starts with the 3-byte state header.
    pub fn encode(&mut self, pcm: &[i16]) -> Vec<u8> {
        let pairs = pcm.len() / 2;
        let mut out = vec![0u8; pairs + MONO_STATE_BYTES];
        out[0..2].copy_from_slice(&self.state.valprev.to_le_bytes());
        out[2] = self.state.index;

        let mut valprev = self.state.valprev as i32;
        let mut index = self.state.index as i32;
        let mut step = STEP_TABLE[index as usize];

        for (n, pair) in pcm.chunks_exact(2).enumerate() {
            let hi = quantize(pair[0] as i32, &mut valprev, &mut index, &mut step);
            let lo = quantize(pair[1] as i32, &mut valprev, &mut index, &mut step);
            out[n + MONO_STATE_BYTES] = (hi << 4) | lo;
        }

        self.state = CodecState {
            valprev: valprev as i16,
            index: index as u8,
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

    let mut code = ((delta << 2) as f64 / *step as f64).round_ties_even() as i32;
    if code > 7 {
        code = 7;
    }

    let vpdiff = (code * *step) >> 2;
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

/// Decode one mono block, metering levels before `volume` is applied.
pub fn decode_mono(
    payload: &[u8],
    volume: f32,
) -> Result<(Vec<i16>, VolumeInfo), DecodeError> {
    if payload.len() < MONO_STATE_BYTES {
        return Err(DecodeError::TruncatedPayload {
            needed: MONO_STATE_BYTES,
            got: payload.len(),
        });
    }
    if payload[2] > 88 {
        return Err(DecodeError::CorruptStepIndex(payload[2]));
    }

    let mut valprev = i16::from_le_bytes([payload[0], payload[1]]) as i32;
    let mut index = payload[2] as i32;
    let mut step = STEP_TABLE[index as usize];

    let bytes = payload.len() - MONO_STATE_BYTES;
    let mut out = Vec::with_capacity(bytes * 2);
    let mut meter = Meter::default();
    let vol = f64::from(volume);

    for &byte in &payload[MONO_STATE_BYTES..] {
        for nibble in [byte >> 4, byte & 0xF] {
            let code = nibble as i32;
            index += INDEX_TABLE[code as usize] as i32;
            index = index.clamp(0, 88);

            let vpdiff = ((code & 7) * step) >> 2;
            if code & 8 != 0 {
                valprev -= vpdiff;
            } else {
                valprev += vpdiff;
            }
            valprev = valprev.clamp(i16::MIN as i32, i16::MAX as i32);
            step = STEP_TABLE[index as usize];

            let mut t = valprev;
            meter.push(0, t.unsigned_abs());
            if volume != 1.0 {
                t = (f64::from(t) * vol).round_ties_even() as i32;
                t = t.clamp(i16::MIN as i32, i16::MAX as i32);
            }
            out.push(t as i16);
        }
    }

    Ok((out, meter.finish()))
}
