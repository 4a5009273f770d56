//! Bitstream reader with byte-level resync.
//!
//! Construction runs the analysis pass (headers only) and rewinds, so a
//! reader always knows its frame set, duration and nominal block size.
//! Corruption never surfaces as an error: the reader scans forward for the
//! next plausible sync and substitutes silence for payloads that fail to
//! decode. Only real I/O failures propagate.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use tracing::{debug, warn};

use crate::adpcm::{decode_mono, decode_stereo};
use crate::compress;
use crate::core::{
    CompressionKind, DataLengthMode, Error, Frame, FrameResult, InfoByte,
    VolumeInfo, SYNC_BYTE,
};
use crate::stream::analysis::{analyze, Stats};

pub struct BitstreamReader<R: Read + Seek> {
    stream: R,
    stream_len: u64,
    stats: Stats,
    eof: bool,
    volume: f32,
    dither: bool,
    mid_side: bool,
    frames_decoded: usize,
    last_sample_count: u32,
    seeking: bool,
    resync_events: u64,
}

impl<R: Read + Seek> BitstreamReader<R> {
    pub fn new(stream: R) -> Result<Self, Error> {
        Self::with_progress(stream, |_| {})
    }

    /// `progress` receives percent of bytes consumed during the analysis
    /// pass, throttled
    pub fn with_progress<F>(mut stream: R, progress: F) -> Result<Self, Error>
    where
        F: FnMut(f64),
    {
        let stream_len = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;
        let mut reader = BitstreamReader {
            stream,
            stream_len,
            stats: Stats::default(),
            eof: false,
            volume: 1.0,
            dither: false,
            mid_side: true,
            frames_decoded: 0,
            last_sample_count: 0,
            seeking: false,
            resync_events: 0,
        };
        reader.stats = analyze(&mut reader, progress)?;
        reader.reset()?;
        Ok(reader)
    }

    pub fn analysis(&self) -> &Stats {
        &self.stats
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn duration(&self) -> f64 {
        self.stats.duration
    }

    pub fn frames_decoded(&self) -> usize {
        self.frames_decoded
    }

    /// corrupt regions skipped since construction
    pub fn resync_events(&self) -> u64 {
        self.resync_events
    }

    /// decoding volume, applied after level metering
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_dither(&mut self, dither: bool) {
        self.dither = dither;
    }

    pub fn set_mid_side(&mut self, mid_side: bool) {
        self.mid_side = mid_side;
    }

    pub(crate) fn stream_len(&self) -> u64 {
        self.stream_len
    }

    pub(crate) fn position(&mut self) -> Result<u64, Error> {
        Ok(self.stream.stream_position()?)
    }

    /// back to the first frame; forgets the inherited sample count
    pub fn reset(&mut self) -> Result<(), Error> {
        let offset = self.stats.frames.first().map_or(0, |f| f.offset);
        self.stream.seek(SeekFrom::Start(offset))?;
        self.eof = false;
        self.frames_decoded = 0;
        self.last_sample_count = 0;
        self.seeking = false;
        Ok(())
    }

    /// Reposition to a frame by index, clamped into the frame set.
    ///
    /// `Ok(false)` means a seek was already in flight (it clears when the
    /// next frame is delivered); the caller retries.
    pub fn seek_to_frame_index(&mut self, index: i64) -> Result<bool, Error> {
        if self.seeking || self.stats.frames.is_empty() {
            return Ok(false);
        }
        let index = index.clamp(0, self.stats.frames.len() as i64 - 1) as usize;
        let offset = self.stats.frames[index].offset;
        self.stream.seek(SeekFrom::Start(offset))?;
        self.seeking = true;
        self.frames_decoded = index;
        self.eof = false;
        Ok(true)
    }

    /// seek to the first frame starting at or after `timestamp` seconds
    pub fn seek_to_timestamp(&mut self, timestamp: f64) -> Result<bool, Error> {
        match self
            .stats
            .frames
            .iter()
            .position(|f| f.timestamp >= timestamp)
        {
            Some(index) => self.seek_to_frame_index(index as i64),
            None => Ok(false),
        }
    }

    /// Deliver the next frame, or `EndOfStream`.
    ///
    /// With `decode` false only headers are parsed, except when the frame
    /// inherits a sample count nothing has established yet; then the payload
    /// is decoded anyway just to learn the count.
    pub fn get_frame(&mut self, decode: bool) -> Result<FrameResult, Error> {
        let Some(info) = self.find_next_frame()? else {
            self.eof = true;
            return Ok(FrameResult::EndOfStream);
        };
        let offset = self.stream.stream_position()? - 2;
        let mut header_length = 2u8;
        let mut sample_count: u32 = 0;
        let silent = info.data_length == DataLengthMode::Silent;
        let mut decode_anyways = false;

        if !silent {
            if !info.use_last_sample_count {
                let Some(count) = self.read_uint_le(2)? else {
                    self.eof = true;
                    return Ok(FrameResult::EndOfStream);
                };
                sample_count = count as u32;
                header_length += 2;
                self.last_sample_count = sample_count;
            } else if self.last_sample_count > 0 {
                sample_count = self.last_sample_count;
            } else {
                decode_anyways = true;
            }
        }

        let (data_length, compression) = if silent {
            let width = info.silent_count_width().unwrap_or(1);
            let Some(count) = self.read_uint_le(width)? else {
                self.eof = true;
                return Ok(FrameResult::EndOfStream);
            };
            sample_count = count as u32;
            header_length += width as u8;
            self.last_sample_count = sample_count;
            (0u64, CompressionKind::None)
        } else {
            let width = info.data_length.field_width();
            let Some(length) = self.read_uint_le(width)? else {
                self.eof = true;
                return Ok(FrameResult::EndOfStream);
            };
            header_length += width as u8;
            (length, info.compression)
        };

        let payload_pos = self.stream.stream_position()?;
        if payload_pos + data_length > self.stream_len {
            self.eof = true;
            return Ok(FrameResult::EndOfStream);
        }
        if payload_pos + data_length == self.stream_len {
            self.eof = true;
        }

        let mut data = None;
        let mut volume = VolumeInfo::silent();
        if !silent {
            if decode || decode_anyways {
                let mut payload = vec![0u8; data_length as usize];
                self.stream.read_exact(&mut payload)?;
                let (pcm, vi) =
                    self.decode_payload(&payload, compression, info.channels);
                sample_count = (pcm.len() / info.channels as usize) as u32;
                self.last_sample_count = sample_count;
                volume = vi;
                if decode {
                    data = Some(pcm);
                }
            } else {
                self.stream.seek(SeekFrom::Current(data_length as i64))?;
            }
        }

        let number = self.frames_decoded;
        self.frames_decoded += 1;
        self.seeking = false;
        let timestamp = self.stats.frames.get(number).map_or(0.0, |f| f.timestamp);

        Ok(FrameResult::Frame(Frame {
            number,
            timestamp,
            duration: sample_count as f64 / info.sample_rate as f64,
            sample_count,
            channels: info.channels,
            sample_rate: info.sample_rate,
            compression,
            silent,
            data_length: data_length as u32,
            header_length,
            offset,
            data,
            volume,
        }))
    }

    /// Scan for the next sync byte followed by a plausible info byte.
    ///
    /// A candidate whose info byte is implausible (silent frame with zero
    /// count width) is corruption; scanning resumes one byte after the
    /// candidate. One warning per corrupt region.
    fn find_next_frame(&mut self) -> Result<Option<InfoByte>, Error> {
        if self.eof {
            return Ok(None);
        }
        let mut scanning = false;
        loop {
            let pos = self.stream.stream_position()?;
            if pos + 2 > self.stream_len {
                return Ok(None);
            }
            if self.read_u8()? == SYNC_BYTE {
                let info = InfoByte::parse(self.read_u8()?);
                if info.is_plausible() {
                    if scanning {
                        debug!(offset = pos, "sync reacquired");
                    }
                    return Ok(Some(info));
                }
                self.stream.seek(SeekFrom::Start(pos + 1))?;
            }
            if !scanning {
                scanning = true;
                self.resync_events += 1;
                warn!(offset = pos, "lost sync, scanning for next frame");
            }
        }
    }

    fn decode_payload(
        &mut self,
        payload: &[u8],
        compression: CompressionKind,
        channels: u8,
    ) -> (Vec<i16>, VolumeInfo) {
        let result = compress::decompress(payload, compression).and_then(|raw| {
            if channels == 2 {
                decode_stereo(&raw, self.mid_side, self.volume, self.dither)
            } else {
                decode_mono(&raw, self.volume)
            }
        });
        match result {
            Ok((pcm, vi)) if !pcm.is_empty() => (pcm, vi),
            Ok(_) => {
                warn!("payload decoded to nothing, substituting silence");
                self.substitute_silence(channels)
            }
            Err(e) => {
                warn!(error = %e, "payload decode failed, substituting silence");
                self.substitute_silence(channels)
            }
        }
    }

    fn substitute_silence(&self, channels: u8) -> (Vec<i16>, VolumeInfo) {
        let samples = self.last_sample_count as usize * channels as usize;
        (vec![0i16; samples], VolumeInfo::silent())
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.stream.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// `None` when the stream physically ends inside the field
    fn read_uint_le(&mut self, width: usize) -> Result<Option<u64>, Error> {
        let mut buf = [0u8; 8];
        match self.stream.read_exact(&mut buf[..width]) {
            Ok(()) => Ok(Some(u64::from_le_bytes(buf))),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
