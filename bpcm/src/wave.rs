//! WAV input/output glue.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, Context, Result};
use libbpcm::SUPPORTED_SAMPLE_RATES;

pub struct WavInput {
    reader: hound::WavReader<BufReader<File>>,
    pub sample_rate: u32,
    pub channels: u16,
    pub total_samples: u32,
}

impl WavInput {
    /// open and validate: 16-bit integer PCM, supported rate, 1-2 channels
    pub fn open(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            bail!(
                "only 16-bit integer PCM is supported, got {}-bit {:?}",
                spec.bits_per_sample,
                spec.sample_format
            );
        }
        if !SUPPORTED_SAMPLE_RATES.contains(&spec.sample_rate) {
            bail!(
                "unsupported sample rate {} Hz (supported: 44100, 48000, 32000, 24000)",
                spec.sample_rate
            );
        }
        if !(1..=2).contains(&spec.channels) {
            bail!("unsupported channel count {}", spec.channels);
        }
        let total_samples = reader.duration();
        Ok(WavInput {
            reader,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            total_samples,
        })
    }

    pub fn duration_seconds(&self) -> f64 {
        self.total_samples as f64 / self.sample_rate as f64
    }

    /// next interleaved block of at most `samples` values; empty at EOF
    pub fn read_block(&mut self, samples: usize) -> Result<Vec<i16>> {
        let mut block = Vec::with_capacity(samples);
        for sample in self.reader.samples::<i16>().take(samples) {
            block.push(sample.context("wav read failed")?);
        }
        Ok(block)
    }
}

pub struct WavOutput {
    writer: hound::WavWriter<BufWriter<File>>,
    sample_rate: u32,
    channels: u16,
}

impl WavOutput {
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("cannot create {}", path.display()))?;
        Ok(WavOutput {
            writer,
            sample_rate,
            channels,
        })
    }

    pub fn write(&mut self, pcm: &[i16]) -> Result<()> {
        for &sample in pcm {
            self.writer.write_sample(sample)?;
        }
        Ok(())
    }

    /// write `seconds` of zeros, used for silent-run frames
    pub fn write_silence(&mut self, seconds: f64) -> Result<()> {
        let count = (seconds * self.sample_rate as f64).round() as usize
            * self.channels as usize;
        for _ in 0..count {
            self.writer.write_sample(0i16)?;
        }
        Ok(())
    }

    pub fn finalize(self) -> Result<()> {
        self.writer.finalize()?;
        Ok(())
    }
}
