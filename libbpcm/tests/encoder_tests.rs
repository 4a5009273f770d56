//! Encoder and stream-statistics tests

use std::io::Cursor;

use libbpcm::{
    Algorithm, BitstreamReader, EncoderParams, FrameResult, StreamEncoder,
};

fn sine(len: usize, step: f32, amplitude: f32) -> Vec<i16> {
    (0..len)
        .map(|i| ((i as f32 * step).sin() * amplitude) as i16)
        .collect()
}

fn encode_blocks(
    encoder: &mut StreamEncoder,
    pcm: &[i16],
) -> Vec<u8> {
    let mut out = Vec::new();
    for block in pcm.chunks(encoder.block_samples()) {
        out.extend(encoder.encode_block(block).unwrap());
    }
    out.extend(encoder.finish().unwrap());
    out
}

fn decode_all(stream: Vec<u8>) -> (Vec<i16>, BitstreamReader<Cursor<Vec<u8>>>) {
    let mut reader = BitstreamReader::new(Cursor::new(stream)).unwrap();
    let mut pcm = Vec::new();
    while let FrameResult::Frame(frame) = reader.get_frame(true).unwrap() {
        match frame.data {
            Some(data) => pcm.extend(data),
            None => pcm.extend(vec![
                0i16;
                frame.sample_count as usize * frame.channels as usize
            ]),
        }
    }
    (pcm, reader)
}

#[test]
fn test_rejects_unsupported_formats() {
    assert!(StreamEncoder::new(22050, 1, EncoderParams::default()).is_err());
    assert!(StreamEncoder::new(48000, 3, EncoderParams::default()).is_err());
    assert!(StreamEncoder::new(48000, 0, EncoderParams::default()).is_err());
}

#[test]
fn test_block_size_clamped() {
    let encoder = StreamEncoder::new(
        48000,
        1,
        EncoderParams {
            block_size_ms: 5000,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(encoder.nominal_samples(), 48000);
}

#[test]
fn test_one_second_of_silence_collapses_to_one_tiny_frame() {
    let mut encoder = StreamEncoder::new(44100, 2, EncoderParams::default()).unwrap();
    let pcm = vec![0i16; 44100 * 2];
    let stream = encode_blocks(&mut encoder, &pcm);
    // one silent frame: sync + info + 3-byte count
    assert_eq!(stream.len(), 5);

    let (decoded, reader) = decode_all(stream);
    assert_eq!(decoded.len(), 44100 * 2);
    assert!(decoded.iter().all(|&s| s == 0));
    let stats = reader.analysis();
    assert_eq!(stats.frames.len(), 1);
    assert_eq!(stats.longest_silent_run, 44100);
    assert_eq!(stats.compressions_used, vec!["silence"]);
}

#[test]
fn test_sine_roundtrip_preserves_rms() {
    let mut encoder = StreamEncoder::new(48000, 1, EncoderParams::default()).unwrap();
    let pcm = sine(48000, 0.0576, 9000.0); // ~440 Hz, one second
    let stream = encode_blocks(&mut encoder, &pcm);
    assert!(stream.len() < pcm.len()); // better than 4:1 on the raw bytes

    let (decoded, _) = decode_all(stream);
    assert_eq!(decoded.len(), pcm.len());

    let rms = |s: &[i16]| {
        (s.iter().map(|&v| (v as f64) * (v as f64)).sum::<f64>() / s.len() as f64)
            .sqrt()
    };
    let drift = (rms(&pcm) - rms(&decoded)).abs() / rms(&pcm);
    assert!(drift < 0.1, "rms drift {drift}");
}

#[test]
fn test_silence_then_signal_roundtrip() {
    let mut encoder = StreamEncoder::new(44100, 1, EncoderParams::default()).unwrap();
    let mut pcm = vec![0i16; 22050];
    pcm.extend(sine(22050, 0.0627, 8000.0));
    let stream = encode_blocks(&mut encoder, &pcm);

    let (decoded, reader) = decode_all(stream);
    assert_eq!(decoded.len(), pcm.len());
    // the silent half stays exactly zero
    assert!(decoded[..22050].iter().all(|&s| s == 0));

    let stats = reader.analysis();
    assert_eq!(stats.longest_silent_run, 22050);
    assert!(stats.compressions_used.contains(&"silence"));
    // silent run plus five signal blocks of 4410
    assert_eq!(stats.frames.len(), 6);
}

#[test]
fn test_trailing_silence_flushed_by_finish() {
    let mut encoder = StreamEncoder::new(48000, 1, EncoderParams::default()).unwrap();
    let mut pcm = sine(4800, 0.0576, 8000.0);
    pcm.extend(vec![0i16; 9600]);
    let stream = encode_blocks(&mut encoder, &pcm);

    let (decoded, reader) = decode_all(stream);
    assert_eq!(decoded.len(), 14400);
    let frames = &reader.analysis().frames;
    assert_eq!(frames.len(), 2);
    assert!(frames[1].silent);
    assert_eq!(frames[1].sample_count, 9600);
}

#[test]
fn test_frame_callback_reports_every_frame() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let counter = Arc::new(AtomicUsize::new(0));
    let seen = counter.clone();
    let mut encoder = StreamEncoder::new(48000, 1, EncoderParams::default()).unwrap();
    encoder.set_frame_callback(move |status| {
        assert_eq!(status.number, seen.fetch_add(1, Ordering::SeqCst));
    });
    let pcm = sine(24000, 0.0576, 8000.0);
    encode_blocks(&mut encoder, &pcm);
    assert_eq!(counter.load(Ordering::SeqCst), 5);
    assert_eq!(encoder.frames_written(), 5);
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn test_nominal_block_size_is_mode_of_non_silent() {
    // frames of 100, 100, 100 and 50 samples: nominal must be 100
    let mut encoder = StreamEncoder::new(
        48000,
        1,
        EncoderParams {
            block_size_ms: 10, // 480 samples nominal
            ..Default::default()
        },
    )
    .unwrap();
    let mut stream = Vec::new();
    for _ in 0..3 {
        stream.extend(encoder.encode_block(&sine(100, 0.3, 8000.0)).unwrap());
    }
    stream.extend(encoder.encode_block(&sine(50, 0.3, 8000.0)).unwrap());
    stream.extend(encoder.finish().unwrap());

    let reader = BitstreamReader::new(Cursor::new(stream)).unwrap();
    let stats = reader.analysis();
    assert_eq!(stats.block_size_nominal, 100);
    assert_eq!(stats.block_size_minimum, 50);
    assert_eq!(stats.block_size_maximum, 100);
    assert_eq!(stats.block_size_average, 88); // round(350 / 4)
    assert_eq!(stats.total_samples, 350);
    assert_eq!(stats.histogram[&100], 3);
    assert_eq!(stats.histogram[&50], 1);
    assert!(stats.bitrate_minimum > 0);
    assert!(stats.bitrate_maximum >= stats.bitrate_minimum);
}

#[test]
fn test_silent_frames_kept_out_of_nominal() {
    let mut encoder = StreamEncoder::new(44100, 1, EncoderParams::default()).unwrap();
    let mut pcm = vec![0i16; 88200]; // two seconds of silence
    pcm.extend(sine(8820, 0.0627, 8000.0));
    let stream = encode_blocks(&mut encoder, &pcm);

    let reader = BitstreamReader::new(Cursor::new(stream)).unwrap();
    let stats = reader.analysis();
    assert_eq!(stats.block_size_nominal, 4410);
    assert_eq!(stats.longest_silent_run, 88200);
    assert_eq!(stats.histogram[&88200], 1);
    assert!(!stats.histogram_non_silent.contains_key(&88200));
    let expected = 88200.0 + 8820.0;
    assert!((stats.duration - expected / 44100.0).abs() < 1e-9);
}

#[test]
fn test_progress_callback_reaches_completion() {
    let mut encoder = StreamEncoder::new(48000, 1, EncoderParams::default()).unwrap();
    let pcm = sine(48000, 0.0576, 8000.0);
    let mut blocks = Vec::new();
    for block in pcm.chunks(encoder.block_samples()) {
        blocks.extend(encoder.encode_block(block).unwrap());
    }
    let mut reports = Vec::new();
    let _ = BitstreamReader::with_progress(Cursor::new(blocks), |p| reports.push(p))
        .unwrap();
    assert!(!reports.is_empty());
    assert_eq!(*reports.last().unwrap(), 100.0);
    assert!(reports.windows(2).all(|w| w[0] <= w[1]));
}
