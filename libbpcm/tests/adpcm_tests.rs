//! ADPCM codec tests

use libbpcm::adpcm::{
    decode_mono, decode_stereo, MonoCodec, StereoCodec, MONO_STATE_BYTES,
    STEREO_STATE_BYTES,
};

fn sine(len: usize, step: f32, amplitude: f32) -> Vec<i16> {
    (0..len)
        .map(|i| ((i as f32 * step).sin() * amplitude) as i16)
        .collect()
}

fn interleave(left: &[i16], right: &[i16]) -> Vec<i16> {
    left.iter()
        .zip(right)
        .flat_map(|(&l, &r)| [l, r])
        .collect()
}

fn rms(pcm: &[i16]) -> f64 {
    if pcm.is_empty() {
        return 0.0;
    }
    let sum: f64 = pcm.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / pcm.len() as f64).sqrt()
}

// ============================================================================
// Mono
// ============================================================================

#[test]
fn test_mono_roundtrip_preserves_energy() {
    let pcm = sine(48000, 0.0576, 9000.0); // ~440 Hz at 48 kHz
    let mut codec = MonoCodec::new();
    let payload = codec.encode(&pcm);
    assert_eq!(payload.len(), pcm.len() / 2 + MONO_STATE_BYTES);

    let (decoded, volume) = decode_mono(&payload, 1.0).unwrap();
    assert_eq!(decoded.len(), pcm.len());

    let original = rms(&pcm);
    let reconstructed = rms(&decoded);
    let error = (original - reconstructed).abs() / original;
    assert!(error < 0.1, "rms drift {error}");
    assert!(volume.peak_db[0] > -15.0 && volume.peak_db[0] <= 0.0);
}

#[test]
fn test_mono_odd_sample_dropped() {
    let pcm = sine(1001, 0.1, 5000.0);
    let mut codec = MonoCodec::new();
    let payload = codec.encode(&pcm);
    let (decoded, _) = decode_mono(&payload, 1.0).unwrap();
    assert_eq!(decoded.len(), 1000);
}

#[test]
fn test_mono_state_persists_across_blocks() {
    let pcm = sine(8000, 0.0576, 9000.0);
    let mut split = MonoCodec::new();
    let first = split.encode(&pcm[..4000]);
    let second = split.encode(&pcm[4000..]);

    let mut whole = MonoCodec::new();
    let joined = whole.encode(&pcm);

    // second block starts from the state the first block left behind
    let (a, _) = decode_mono(&first, 1.0).unwrap();
    let (b, _) = decode_mono(&second, 1.0).unwrap();
    let (reference, _) = decode_mono(&joined, 1.0).unwrap();
    let mut stitched = a;
    stitched.extend(b);
    assert_eq!(stitched, reference);
}

#[test]
fn test_mono_truncated_payload_is_error() {
    assert!(decode_mono(&[0, 0], 1.0).is_err());
}

#[test]
fn test_mono_corrupt_step_index_is_error() {
    assert!(decode_mono(&[0, 0, 200, 0x11], 1.0).is_err());
}

#[test]
fn test_mono_header_only_payload_decodes_empty() {
    let (decoded, volume) = decode_mono(&[0, 0, 0], 1.0).unwrap();
    assert!(decoded.is_empty());
    assert_eq!(volume.peak_db[0], f64::NEG_INFINITY);
}

// ============================================================================
// Stereo
// ============================================================================

#[test]
fn test_stereo_midside_roundtrip_preserves_energy() {
    let left = sine(44100, 0.0627, 8000.0);
    let right = sine(44100, 0.0627, 7000.0);
    let pcm = interleave(&left, &right);

    let mut codec = StereoCodec::new();
    let payload = codec.encode(&pcm, true);
    assert_eq!(payload.len(), pcm.len() / 2 + STEREO_STATE_BYTES);

    let (decoded, _) = decode_stereo(&payload, true, 1.0, false).unwrap();
    assert_eq!(decoded.len(), pcm.len());

    let error = (rms(&pcm) - rms(&decoded)).abs() / rms(&pcm);
    assert!(error < 0.1, "rms drift {error}");
}

#[test]
fn test_stereo_identical_channels_stay_identical() {
    // with mid/side the side channel is exactly zero, so L == R survives
    let mono = sine(4410, 0.0576, 6000.0);
    let pcm = interleave(&mono, &mono);

    let mut codec = StereoCodec::new();
    let payload = codec.encode(&pcm, true);
    let (decoded, _) = decode_stereo(&payload, true, 1.0, false).unwrap();
    for pair in decoded.chunks_exact(2) {
        assert_eq!(pair[0], pair[1]);
    }
}

#[test]
fn test_stereo_decode_is_deterministic_without_dither() {
    let pcm = interleave(&sine(2000, 0.07, 5000.0), &sine(2000, 0.05, 4000.0));
    let mut codec = StereoCodec::new();
    let payload = codec.encode(&pcm, true);
    let (a, _) = decode_stereo(&payload, true, 1.0, false).unwrap();
    let (b, _) = decode_stereo(&payload, true, 1.0, false).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_stereo_dither_keeps_length_and_stays_close() {
    let pcm = interleave(&sine(2000, 0.07, 5000.0), &sine(2000, 0.05, 4000.0));
    let mut codec = StereoCodec::new();
    let payload = codec.encode(&pcm, true);
    let (plain, _) = decode_stereo(&payload, true, 1.0, false).unwrap();
    let (dithered, _) = decode_stereo(&payload, true, 1.0, true).unwrap();
    assert_eq!(dithered.len(), plain.len());
    for (a, b) in plain.iter().zip(&dithered) {
        assert!((*a as i32 - *b as i32).abs() <= 2);
    }
}

#[test]
fn test_stereo_volume_scales_after_metering() {
    let pcm = interleave(&sine(4410, 0.0576, 12000.0), &sine(4410, 0.0576, 12000.0));
    let mut codec = StereoCodec::new();
    let payload = codec.encode(&pcm, true);

    let (full, vi_full) = decode_stereo(&payload, true, 1.0, false).unwrap();
    let mut codec = StereoCodec::new();
    let payload = codec.encode(&pcm, true);
    let (half, vi_half) = decode_stereo(&payload, true, 0.5, false).unwrap();

    // metering reads the pre-volume signal, so levels match
    assert!((vi_full.peak_db[0] - vi_half.peak_db[0]).abs() < 0.01);
    // but the output is scaled
    assert!(rms(&half) < rms(&full) * 0.55);
}

#[test]
fn test_stereo_truncated_payload_is_error() {
    assert!(decode_stereo(&[0; 5], true, 1.0, false).is_err());
}

#[test]
fn test_stereo_corrupt_step_index_is_error() {
    let payload = [0, 0, 0, 0, 89, 0, 0x11];
    assert!(decode_stereo(&payload, true, 1.0, false).is_err());
}

#[test]
fn test_silence_meters_negative_infinity() {
    let pcm = vec![0i16; 2000];
    let mut codec = MonoCodec::new();
    let payload = codec.encode(&pcm);
    let (_, volume) = decode_mono(&payload, 1.0).unwrap();
    assert_eq!(volume.peak_db[0], f64::NEG_INFINITY);
    assert_eq!(volume.avg_db[0], f64::NEG_INFINITY);
}
