//! One-pass stream statistics.
//!
//! Runs at reader construction: a headers-only sweep that builds the frame
//! set (the seek index) and aggregates block sizes, bitrates, silent runs
//! and the compressors in use.

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::time::{Duration, Instant};

use crate::core::{Error, FrameResult};
use crate::stream::reader::BitstreamReader;

/// progress callbacks fire at most this often
const PROGRESS_INTERVAL: Duration = Duration::from_millis(1000 / 15);

#[derive(Debug, Default, Clone)]
pub struct Stats {
    /// headers-only frame records in stream order; the seek index
    pub frames: Vec<crate::core::Frame>,
    /// bits per second, non-silent frames
    pub bitrate_minimum: u32,
    pub bitrate_average: u32,
    pub bitrate_maximum: u32,
    /// samples per channel, non-silent frames
    pub block_size_minimum: u32,
    pub block_size_average: u32,
    pub block_size_maximum: u32,
    /// the most common non-silent block size
    pub block_size_nominal: u32,
    /// longest single silent-run frame, in samples
    pub longest_silent_run: u32,
    /// whole-stream duration in seconds
    pub duration: f64,
    /// total samples per channel
    pub total_samples: u64,
    /// labels of every compression kind seen, silent runs as "silence"
    pub compressions_used: Vec<&'static str>,
    /// sample-count histogram over all frames
    pub histogram: BTreeMap<u32, u64>,
    /// sample-count histogram over non-silent frames only
    pub histogram_non_silent: BTreeMap<u32, u64>,
}

pub(crate) fn analyze<R, F>(
    reader: &mut BitstreamReader<R>,
    mut progress: F,
) -> Result<Stats, Error>
where
    R: Read + Seek,
    F: FnMut(f64),
{
    let mut stats = Stats {
        bitrate_minimum: u32::MAX,
        block_size_minimum: u32::MAX,
        ..Stats::default()
    };
    let stream_len = reader.stream_len().max(1);
    let mut last_report = Instant::now()
        .checked_sub(PROGRESS_INTERVAL)
        .unwrap_or_else(Instant::now);
    let mut timestamp = 0.0f64;
    let mut total_bytes = 0u64;
    let mut data_frames = 0u64;
    let mut data_samples = 0u64;

    loop {
        let mut frame = match reader.get_frame(false)? {
            FrameResult::Frame(frame) => frame,
            FrameResult::EndOfStream => break,
        };
        frame.timestamp = timestamp;
        frame.data = None;
        timestamp += frame.duration;

        *stats.histogram.entry(frame.sample_count).or_insert(0) += 1;
        if frame.silent {
            if frame.sample_count > stats.longest_silent_run {
                stats.longest_silent_run = frame.sample_count;
            }
        } else {
            *stats
                .histogram_non_silent
                .entry(frame.sample_count)
                .or_insert(0) += 1;
            stats.block_size_minimum =
                stats.block_size_minimum.min(frame.sample_count);
            stats.block_size_maximum =
                stats.block_size_maximum.max(frame.sample_count);
            data_frames += 1;
            data_samples += frame.sample_count as u64;
            if frame.duration > 0.0 {
                let bitrate =
                    (frame.wire_length() as f64 / frame.duration * 8.0) as u32;
                stats.bitrate_minimum = stats.bitrate_minimum.min(bitrate);
                stats.bitrate_maximum = stats.bitrate_maximum.max(bitrate);
            }
        }

        let label = frame.compression_label();
        if !stats.compressions_used.contains(&label) {
            stats.compressions_used.push(label);
        }
        total_bytes += frame.wire_length();
        stats.total_samples += frame.sample_count as u64;
        stats.frames.push(frame);

        if last_report.elapsed() >= PROGRESS_INTERVAL {
            last_report = Instant::now();
            let percent = reader.position()? as f64 / stream_len as f64 * 100.0;
            progress(percent);
        }
    }

    if stats.frames.is_empty() {
        return Err(Error::EmptyStream);
    }
    progress(100.0);

    let rate = stats.frames[0].sample_rate as f64;
    stats.duration = stats.total_samples as f64 / rate;
    if stats.duration > 0.0 {
        stats.bitrate_average =
            (total_bytes as f64 / stats.duration * 8.0).round() as u32;
    }
    if data_frames > 0 {
        stats.block_size_average =
            (data_samples as f64 / data_frames as f64).round() as u32;
        stats.block_size_nominal = stats
            .histogram_non_silent
            .iter()
            .max_by_key(|&(_, &count)| count)
            .map_or(0, |(&size, _)| size);
    }
    if stats.bitrate_minimum == u32::MAX {
        stats.bitrate_minimum = 0;
    }
    if stats.block_size_minimum == u32::MAX {
        stats.block_size_minimum = 0;
    }
    Ok(stats)
}
