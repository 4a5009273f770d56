//! Block silence classifier.
//!
//! Quick and dirty by design: the first sample of the block is the DC
//! reference and every sample is compared against it, interleaved channel
//! layout ignored. A deviation has to exceed the threshold to count as
//! signal, so dither and DC offset pass as silence.

/// samples of leading signal tolerated before a block still counts as
/// starting silent
pub const MAX_DELAY: usize = 10;

/// default deviation threshold
pub const DEFAULT_THRESHOLD: i16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceAt {
    Beginning,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Silence {
    /// signal throughout
    FullSignal,
    /// silent at one end; `pos` is the sample index where it changes
    PartiallySilent { at: SilenceAt, pos: usize },
    /// no deviation anywhere
    TotalSilence,
}

/// classify one interleaved block
pub fn classify(pcm: &[i16], threshold: i16) -> Silence {
    if pcm.len() < 2 {
        return Silence::FullSignal;
    }
    let threshold = threshold as i32;
    let reference = pcm[0] as i32;
    let n = pcm.len();

    // forward scan: where does signal start?
    let mut signal_from_start = false;
    let mut i = 1;
    while i < n - 1 {
        if (pcm[i] as i32 - reference).abs() > threshold {
            if i >= MAX_DELAY {
                return Silence::PartiallySilent {
                    at: SilenceAt::Beginning,
                    pos: i,
                };
            }
            signal_from_start = true;
            break;
        }
        i += 1;
    }
    if !signal_from_start {
        return Silence::TotalSilence;
    }

    // signal starts immediately; scan backward for a silent tail
    let tail_reference = pcm[n - 1] as i32;
    let mut j = n - 2;
    loop {
        if (pcm[j] as i32 - tail_reference).abs() > threshold {
            if n - j > MAX_DELAY {
                return Silence::PartiallySilent {
                    at: SilenceAt::End,
                    pos: j,
                };
            }
            break;
        }
        if j == 0 {
            break;
        }
        j -= 1;
    }
    Silence::FullSignal
}
