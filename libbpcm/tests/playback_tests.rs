//! Wave-provider tests

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use libbpcm::{
    BitstreamReader, EncoderParams, StreamEncoder, WaveProvider,
};

fn sine(len: usize, step: f32, amplitude: f32) -> Vec<i16> {
    (0..len)
        .map(|i| ((i as f32 * step).sin() * amplitude) as i16)
        .collect()
}

/// half a second of signal, a silent run, then more signal (mono, 48 kHz)
fn test_stream() -> (Vec<u8>, usize) {
    let mut encoder = StreamEncoder::new(48000, 1, EncoderParams::default()).unwrap();
    let mut pcm = sine(24000, 0.0576, 8000.0);
    pcm.extend(vec![0i16; 24000]);
    pcm.extend(sine(24000, 0.04, 6000.0));
    let mut out = Vec::new();
    for block in pcm.chunks(encoder.block_samples()) {
        out.extend(encoder.encode_block(block).unwrap());
    }
    out.extend(encoder.finish().unwrap());
    (out, pcm.len())
}

fn provider(stream: Vec<u8>) -> WaveProvider<Cursor<Vec<u8>>> {
    let reader = BitstreamReader::new(Cursor::new(stream)).unwrap();
    WaveProvider::new(reader, 1.0).unwrap()
}

#[test]
fn test_pull_delivers_whole_stream_including_final_frame() {
    let (stream, samples) = test_stream();
    let mut provider = provider(stream);

    let mut total = 0usize;
    let mut buf = vec![0u8; 1024];
    loop {
        let n = provider.read(&mut buf);
        if n == 0 {
            break;
        }
        total += n;
    }
    // every sample arrives, silent runs synthesized, nothing dropped at EOF
    assert_eq!(total, samples * 2);
}

#[test]
fn test_odd_request_sizes() {
    let (stream, samples) = test_stream();
    let mut provider = provider(stream);
    let mut total = 0usize;
    let mut buf = vec![0u8; 337];
    loop {
        let n = provider.read(&mut buf);
        if n == 0 {
            break;
        }
        total += n;
    }
    assert_eq!(total, samples * 2);
}

#[test]
fn test_position_callback_moves_forward() {
    let (stream, _) = test_stream();
    let mut provider = provider(stream);

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let last = Arc::new(std::sync::Mutex::new(f64::MIN));
    let last_seen = last.clone();
    provider.set_position_callback(move |frame| {
        seen.fetch_add(1, Ordering::SeqCst);
        let mut prev = last_seen.lock().unwrap();
        // the intra-frame offset can briefly overshoot a frame boundary,
        // so allow a sub-block wobble but never a real jump back
        assert!(
            frame.timestamp >= *prev - 0.2,
            "position jumped backwards: {} after {}",
            frame.timestamp,
            *prev
        );
        *prev = frame.timestamp;
    });

    let mut buf = vec![0u8; 4096];
    while provider.read(&mut buf) > 0 {}
    assert!(calls.load(Ordering::SeqCst) > 10);
}

#[test]
fn test_volume_forwarded_to_decoder() {
    let (stream, _) = test_stream();
    let mut loud = provider(stream.clone());
    let mut quiet = provider(stream);
    quiet.set_volume(0.1);

    let mut a = vec![0u8; 9600];
    let mut b = vec![0u8; 9600];
    assert_eq!(loud.read(&mut a), 9600);
    assert_eq!(quiet.read(&mut b), 9600);

    let energy = |bytes: &[u8]| -> f64 {
        bytes
            .chunks_exact(2)
            .map(|c| {
                let s = i16::from_le_bytes([c[0], c[1]]) as f64;
                s * s
            })
            .sum()
    };
    assert!(energy(&b) < energy(&a) * 0.05);
}

#[test]
fn test_seek_drops_buffered_audio() {
    let (stream, _) = test_stream();
    let mut provider = provider(stream);
    let mut buf = vec![0u8; 4096];
    assert!(provider.read(&mut buf) > 0);

    assert!(provider.seek_to_timestamp(1.2).unwrap());
    // buffered audio from before the seek is gone; the next read starts
    // at the target frame
    let n = provider.read(&mut buf);
    assert!(n > 0);
    assert!(provider.position() >= 1.1);
}

#[test]
fn test_rate_change_recomputes_output_rate() {
    let (stream, _) = test_stream();
    let mut provider = provider(stream);
    assert_eq!(provider.output_sample_rate(), 48000);
    provider.set_rate_factor(1.5);
    assert_eq!(provider.output_sample_rate(), 72000);
    provider.set_rate_factor(0.5);
    assert_eq!(provider.output_sample_rate(), 24000);
    // playback continues after the change
    let mut buf = vec![0u8; 1024];
    assert!(provider.read(&mut buf) > 0);
}

#[test]
fn test_empty_frameset_rejected() {
    // a reader cannot even be built on an empty stream, so the provider
    // constructor only ever sees populated framesets; verify the guard at
    // the reader layer
    assert!(BitstreamReader::new(Cursor::new(Vec::<u8>::new())).is_err());
}
