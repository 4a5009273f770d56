//! Pull-model playback provider.
//!
//! A device callback asks [`WaveProvider::read`] for PCM bytes; the provider
//! pulls and decodes frames into a byte FIFO until the request is covered,
//! synthesizing zeros for silent frames. Single producer, single consumer;
//! control operations (seek, rate change) are expected to take a short
//! critical section around the provider at the player layer.

use std::collections::VecDeque;
use std::io::{Read, Seek};
use std::time::Duration;

use tracing::warn;

use crate::core::{Error, Frame, FrameResult, VolumeInfo};
use crate::stream::BitstreamReader;

/// Pause between tearing an output sink down and recreating it on a rate
/// change. Masks a race with the driver's asynchronous stop completion; a
/// completion ack from the driver would be the robust fix.
pub const RATE_CHANGE_SETTLE: Duration = Duration::from_millis(30);

/// why playback ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    StopRequested,
    BufferUnderrun,
    EndOfStream,
    DeviceError(String),
}

/// Byte FIFO between decoder and device callback.
///
/// The capacity is an initial allocation, not a hard cap: a max-length
/// silent frame synthesizes more PCM than any cap sized from the nominal
/// block, so the FIFO grows instead of dropping audio.
#[derive(Debug)]
pub struct RingBuffer {
    buf: VecDeque<u8>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().copied());
    }

    pub fn write_samples(&mut self, pcm: &[i16]) {
        for &sample in pcm {
            self.buf.extend(sample.to_le_bytes());
        }
    }

    pub fn write_zeros(&mut self, count: usize) {
        self.buf.extend(std::iter::repeat(0u8).take(count));
    }

    /// copy out up to `out.len()` bytes, returning how many
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.buf.len());
        for (dst, src) in out.iter_mut().zip(self.buf.drain(..count)) {
            *dst = src;
        }
        count
    }

    /// discard everything wholesale
    pub fn drop_and_reset(&mut self) {
        self.buf = VecDeque::with_capacity(self.capacity);
    }
}

pub type PositionCallback = Box<dyn FnMut(&Frame) + Send>;

pub struct WaveProvider<R: Read + Seek> {
    reader: BitstreamReader<R>,
    ring: RingBuffer,
    current: Frame,
    ts_offset: f64,
    volume: f32,
    rate_factor: f64,
    native_rate: u32,
    output_sample_rate: u32,
    channels: u8,
    on_position: Option<PositionCallback>,
}

impl<R: Read + Seek> WaveProvider<R> {
    pub fn new(reader: BitstreamReader<R>, rate_factor: f64) -> Result<Self, Error> {
        let stats = reader.analysis();
        let first = stats.frames.first().cloned().ok_or(Error::EmptyStream)?;
        let capacity = stats.block_size_maximum.max(1024) as usize
            * first.channels as usize
            * 8;
        let native_rate = first.sample_rate;
        Ok(WaveProvider {
            reader,
            ring: RingBuffer::new(capacity),
            channels: first.channels,
            current: first,
            ts_offset: 0.0,
            volume: 1.0,
            rate_factor,
            native_rate,
            output_sample_rate: (native_rate as f64 * rate_factor).round() as u32,
            on_position: None,
        })
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_dither(&mut self, dither: bool) {
        self.reader.set_dither(dither);
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn native_sample_rate(&self) -> u32 {
        self.native_rate
    }

    /// the rate the output sink should run at
    pub fn output_sample_rate(&self) -> u32 {
        self.output_sample_rate
    }

    pub fn rate_factor(&self) -> f64 {
        self.rate_factor
    }

    pub fn duration(&self) -> f64 {
        self.reader.duration()
    }

    /// playback position in stream seconds
    pub fn position(&self) -> f64 {
        self.current.timestamp
    }

    pub fn set_position_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Frame) + Send + 'static,
    {
        self.on_position = Some(Box::new(callback));
    }

    pub fn reader(&self) -> &BitstreamReader<R> {
        &self.reader
    }

    /// Recompute the output rate and drop buffered audio. The sink itself
    /// has to be recreated by the device layer, waiting
    /// [`RATE_CHANGE_SETTLE`] between teardown and rebuild.
    pub fn set_rate_factor(&mut self, factor: f64) {
        self.rate_factor = factor;
        self.output_sample_rate = (self.native_rate as f64 * factor).round() as u32;
        self.ring.drop_and_reset();
    }

    pub fn seek_to_timestamp(&mut self, timestamp: f64) -> Result<bool, Error> {
        let moved = self.reader.seek_to_timestamp(timestamp)?;
        if moved {
            self.ring.drop_and_reset();
            self.ts_offset = 0.0;
        }
        Ok(moved)
    }

    pub fn drop_and_reset(&mut self) {
        self.ring.drop_and_reset();
    }

    /// Fill `out` with decoded PCM bytes. Short reads happen only at end of
    /// stream; 0 means exhausted.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        self.reader.set_volume(self.volume);

        while self.ring.len() < out.len() {
            match self.reader.get_frame(true) {
                Ok(FrameResult::Frame(mut frame)) => {
                    self.ts_offset = 0.0;
                    if let Some(pcm) = frame.data.take() {
                        self.ring.write_samples(&pcm);
                    } else {
                        let bytes = frame.sample_count as usize
                            * frame.channels as usize
                            * 2;
                        self.ring.write_zeros(bytes);
                        frame.volume = VolumeInfo::silent();
                    }
                    let at_end = self.reader.eof();
                    self.current = frame;
                    if at_end {
                        break;
                    }
                }
                Ok(FrameResult::EndOfStream) => break,
                Err(e) => {
                    warn!(error = %e, "stream read failed during playback");
                    break;
                }
            }
        }

        if self.ring.is_empty() {
            return 0;
        }
        let count = self.ring.read_into(out);

        // re-derive the current frame from the seek index and advance the
        // intra-frame offset by what was just consumed
        let frames = &self.reader.analysis().frames;
        if !frames.is_empty() {
            let index = self.current.number.min(frames.len() - 1);
            let mut current = frames[index].clone();
            current.volume = self.current.volume;
            current.timestamp += self.ts_offset;
            self.ts_offset += count as f64
                / (current.channels as f64 * 2.0 * current.sample_rate as f64);
            self.current = current;
        }
        if let Some(callback) = &mut self.on_position {
            callback(&self.current);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_fifo_order() {
        let mut ring = RingBuffer::new(16);
        ring.write(&[1, 2, 3, 4]);
        ring.write_samples(&[0x0102, -1]);
        let mut out = [0u8; 8];
        assert_eq!(ring.read_into(&mut out), 8);
        assert_eq!(out, [1, 2, 3, 4, 0x02, 0x01, 0xFF, 0xFF]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_ring_buffer_short_read() {
        let mut ring = RingBuffer::new(16);
        ring.write(&[9, 9]);
        let mut out = [0u8; 8];
        assert_eq!(ring.read_into(&mut out), 2);
        assert_eq!(ring.read_into(&mut out), 0);
    }

    #[test]
    fn test_ring_buffer_grows_past_capacity() {
        let mut ring = RingBuffer::new(4);
        ring.write_zeros(1000);
        assert_eq!(ring.len(), 1000);
        ring.drop_and_reset();
        assert!(ring.is_empty());
    }
}
