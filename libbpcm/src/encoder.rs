//! Block encoder with silent-run collapsing.
//!
//! Feed interleaved PCM blocks of roughly the nominal length; the encoder
//! classifies each block, accumulates totally-silent blocks into a run
//! counter, and emits a single tiny silent frame when signal returns (or
//! when the run would overflow its 24-bit counter). Codec state persists
//! across frames, which is what makes inherited sample counts and seek
//! decoding work.

use tracing::debug;

use crate::adpcm::{MonoCodec, StereoCodec};
use crate::compress::{self, Algorithm};
use crate::composer::compose_frame;
use crate::core::{sample_rate_index, CompressionKind, Error};
use crate::silence::{self, Silence, DEFAULT_THRESHOLD};

/// flush a silent run before its counter overflows the 24-bit field
const SILENT_RUN_CAP: u64 = 0xFF_FFFF;

#[derive(Debug, Clone, Copy)]
pub struct EncoderParams {
    /// nominal block length in milliseconds, clamped to 10..=1000
    pub block_size_ms: u32,
    /// deviation threshold for the silence classifier; 0 or less means default
    pub silence_threshold: i16,
    pub algorithm: Algorithm,
    /// mid/side decorrelation for stereo content
    pub mid_side: bool,
}

impl Default for EncoderParams {
    fn default() -> Self {
        EncoderParams {
            block_size_ms: 100,
            silence_threshold: DEFAULT_THRESHOLD,
            algorithm: Algorithm::Fast,
            mid_side: true,
        }
    }
}

/// per-frame status handed to front ends
#[derive(Debug, Clone, Copy)]
pub struct FrameStatus {
    pub number: usize,
    pub bytes: usize,
    pub duration: f64,
    pub compression: CompressionKind,
    pub silent: bool,
}

pub struct StreamEncoder {
    sample_rate: u32,
    channels: u8,
    params: EncoderParams,
    stereo: StereoCodec,
    mono: MonoCodec,
    blocks_seen: u64,
    frames_written: usize,
    silent_samples: u64,
    after_silence: bool,
    on_frame: Option<Box<dyn FnMut(FrameStatus) + Send>>,
}

impl StreamEncoder {
    pub fn new(
        sample_rate: u32,
        channels: u8,
        mut params: EncoderParams,
    ) -> Result<Self, Error> {
        if sample_rate_index(sample_rate).is_none() {
            return Err(Error::UnsupportedSampleRate(sample_rate));
        }
        if !(1..=2).contains(&channels) {
            return Err(Error::UnsupportedChannels(channels as u16));
        }
        params.block_size_ms = params.block_size_ms.clamp(10, 1000);
        if params.silence_threshold <= 0 {
            params.silence_threshold = DEFAULT_THRESHOLD;
        }
        Ok(StreamEncoder {
            sample_rate,
            channels,
            params,
            stereo: StereoCodec::new(),
            mono: MonoCodec::new(),
            blocks_seen: 0,
            frames_written: 0,
            silent_samples: 0,
            after_silence: false,
            on_frame: None,
        })
    }

    pub fn set_frame_callback<F>(&mut self, callback: F)
    where
        F: FnMut(FrameStatus) + Send + 'static,
    {
        self.on_frame = Some(Box::new(callback));
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// samples per channel in a nominal block
    pub fn nominal_samples(&self) -> u32 {
        (self.params.block_size_ms as f64 / 1000.0 * self.sample_rate as f64) as u32
    }

    /// interleaved samples a caller should feed per block
    pub fn block_samples(&self) -> usize {
        self.nominal_samples() as usize * self.channels as usize
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Encode one interleaved block, returning the bytes to append to the
    /// stream: nothing for a silent block, one data frame, or a silent
    /// frame followed by a data frame.
    pub fn encode_block(&mut self, pcm: &[i16]) -> Result<Vec<u8>, Error> {
        if pcm.is_empty() {
            return Ok(Vec::new());
        }
        let samples = (pcm.len() / self.channels as usize) as u32;
        let mut out = Vec::new();

        if silence::classify(pcm, self.params.silence_threshold)
            == Silence::TotalSilence
        {
            self.silent_samples += samples as u64;
            if self.silent_samples >= SILENT_RUN_CAP {
                let run = self.silent_samples.min(SILENT_RUN_CAP);
                out.extend(self.flush_silence(run)?);
                self.silent_samples -= run;
                self.after_silence = true;
            }
            self.blocks_seen += 1;
            return Ok(out);
        }

        if self.silent_samples > 0 {
            let run = self.silent_samples;
            out.extend(self.flush_silence(run)?);
            self.silent_samples = 0;
            // a run of exactly one nominal block leaves the inherited count
            // correct; anything else forces an explicit count next
            self.after_silence = run != self.nominal_samples() as u64;
        }

        let adpcm = if self.channels == 2 {
            self.stereo.encode(pcm, self.params.mid_side)
        } else {
            self.mono.encode(pcm)
        };
        let packed = compress::compress(&adpcm, self.params.algorithm);
        let write_count = self.blocks_seen == 0
            || samples != self.nominal_samples()
            || self.after_silence;
        let frame = compose_frame(
            Some(&packed.data),
            self.sample_rate,
            self.channels,
            packed.kind,
            write_count,
            samples as u64,
        )?;
        self.emit_status(frame.len(), samples, packed.kind, false);
        out.extend(frame);
        self.after_silence = false;
        self.blocks_seen += 1;
        Ok(out)
    }

    /// flush a trailing silent run; call once after the last block
    pub fn finish(&mut self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        while self.silent_samples > 0 {
            let run = self.silent_samples.min(SILENT_RUN_CAP);
            out.extend(self.flush_silence(run)?);
            self.silent_samples -= run;
        }
        Ok(out)
    }

    fn flush_silence(&mut self, run: u64) -> Result<Vec<u8>, Error> {
        debug!(samples = run, "flushing silent run");
        let frame = compose_frame(
            None,
            self.sample_rate,
            self.channels,
            CompressionKind::None,
            true,
            run,
        )?;
        self.emit_status(frame.len(), run as u32, CompressionKind::None, true);
        Ok(frame)
    }

    fn emit_status(
        &mut self,
        bytes: usize,
        samples: u32,
        compression: CompressionKind,
        silent: bool,
    ) {
        let status = FrameStatus {
            number: self.frames_written,
            bytes,
            duration: samples as f64 / self.sample_rate as f64,
            compression,
            silent,
        };
        self.frames_written += 1;
        if let Some(callback) = &mut self.on_frame {
            callback(status);
        }
    }
}
