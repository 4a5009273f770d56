//! BPCM command-line front end: encode, decode, play and analyze.

mod player;
mod wave;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use libbpcm::{
    Algorithm, BitstreamReader, EncoderParams, FrameResult, StreamEncoder,
};

const EXIT_FAILURE: i32 = 0x7F;

#[derive(Parser)]
#[command(name = "bpcm", version, about = "BPCM lossy audio codec")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a 16-bit PCM WAV file into a .bpcm2 stream
    Encode {
        input: PathBuf,
        output: PathBuf,
        /// secondary compression strategy
        #[arg(short, long, value_enum, default_value_t = Compression::Fast)]
        compression: Compression,
        /// block size in milliseconds (clamped to 10-1000)
        #[arg(short, long, default_value_t = 100)]
        block_size: u32,
        /// silence detection threshold, 0 for the default
        #[arg(short, long, default_value_t = 4)]
        silence_threshold: i16,
    },
    /// Decode a .bpcm2 stream back to WAV
    Decode {
        input: PathBuf,
        output: PathBuf,
        /// dither the reconstruction
        #[arg(long)]
        dither: bool,
    },
    /// Play a .bpcm2 stream
    Play {
        input: PathBuf,
        /// playback volume (applied at decode, after level metering)
        #[arg(short, long, default_value_t = 0.12)]
        volume: f32,
        /// playback rate factor
        #[arg(short, long, default_value_t = 1.0)]
        rate: f64,
        /// output device index, 0 for the default device
        #[arg(short, long, default_value_t = 0)]
        device: usize,
    },
    /// Analyze a .bpcm2 stream and dump statistics as JSON
    Analyze { input: PathBuf },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Compression {
    /// store payloads uncompressed
    None,
    /// adaptive arithmetic coding
    Ac,
    Brotli,
    Lzma,
    /// race arithmetic against lzma, keep the smaller
    Fast,
    /// race everything
    Brute,
}

impl From<Compression> for Algorithm {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => Algorithm::None,
            Compression::Ac => Algorithm::Arithmetic,
            Compression::Brotli => Algorithm::Brotli,
            Compression::Lzma => Algorithm::Lzma,
            Compression::Fast => Algorithm::Fast,
            Compression::Brute => Algorithm::BruteForce,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                e.exit();
            }
            let _ = e.print();
            std::process::exit(EXIT_FAILURE);
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_FAILURE);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Encode {
            input,
            output,
            compression,
            block_size,
            silence_threshold,
        } => encode(&input, &output, compression, block_size, silence_threshold),
        Commands::Decode {
            input,
            output,
            dither,
        } => decode(&input, &output, dither),
        Commands::Play {
            input,
            volume,
            rate,
            device,
        } => player::play(
            &input,
            player::PlayerConfig {
                volume,
                rate,
                device_index: device,
            },
        ),
        Commands::Analyze { input } => analyze(&input),
    }
}

fn encode(
    input: &Path,
    output: &Path,
    compression: Compression,
    block_size: u32,
    silence_threshold: i16,
) -> Result<()> {
    let mut wav = wave::WavInput::open(input)?;
    let mut encoder = StreamEncoder::new(
        wav.sample_rate,
        wav.channels as u8,
        EncoderParams {
            block_size_ms: block_size,
            silence_threshold,
            algorithm: compression.into(),
            mid_side: true,
        },
    )?;
    let mut out = BufWriter::new(
        File::create(output)
            .with_context(|| format!("cannot create {}", output.display()))?,
    );

    let total = wav.duration_seconds();
    let mut position = 0.0f64;
    let mut written = 0u64;
    let mut last_print = Instant::now();
    loop {
        let block = wav.read_block(encoder.block_samples())?;
        if block.is_empty() {
            break;
        }
        position += (block.len() / encoder.channels() as usize) as f64
            / encoder.sample_rate() as f64;
        let bytes = encoder.encode_block(&block)?;
        written += bytes.len() as u64;
        out.write_all(&bytes)?;

        if last_print.elapsed().as_millis() >= 250 {
            last_print = Instant::now();
            let kbps = written as f64 / position.max(1e-9) * 8.0 / 1000.0;
            print!(
                "\rencoding {:6.1}/{:.1} s  {:6} frames  {:7.1} kbit/s",
                position,
                total,
                encoder.frames_written(),
                kbps,
            );
            let _ = std::io::stdout().flush();
        }
    }
    let tail = encoder.finish()?;
    written += tail.len() as u64;
    out.write_all(&tail)?;
    out.flush()?;

    let raw_bytes =
        (total * wav.sample_rate as f64 * wav.channels as f64 * 2.0).max(1.0);
    println!(
        "\rdone: {} frames, {} bytes ({:.1}% of raw PCM)            ",
        encoder.frames_written(),
        written,
        written as f64 / raw_bytes * 100.0,
    );
    Ok(())
}

fn decode(input: &Path, output: &Path, dither: bool) -> Result<()> {
    let file = BufReader::new(
        File::open(input).with_context(|| format!("cannot open {}", input.display()))?,
    );
    let mut reader = BitstreamReader::new(file)?;
    reader.set_dither(dither);

    let stats = reader.analysis();
    let first = &stats.frames[0];
    let (sample_rate, channels) = (first.sample_rate, first.channels);
    let frame_count = stats.frames.len();
    println!(
        "decoding {:.2} s, {} frames, {} ch, {} Hz, avg {} bit/s",
        stats.duration, frame_count, channels, sample_rate, stats.bitrate_average,
    );

    let mut wav = wave::WavOutput::create(output, sample_rate, channels as u16)?;
    let mut last_print = Instant::now();
    let mut decoded = 0usize;
    loop {
        match reader.get_frame(true)? {
            FrameResult::Frame(frame) => {
                match frame.data {
                    Some(pcm) => wav.write(&pcm)?,
                    None => wav.write_silence(frame.duration)?,
                }
                decoded += 1;
                if last_print.elapsed().as_millis() >= 250 {
                    last_print = Instant::now();
                    print!(
                        "\r{:5.1}%",
                        decoded as f64 / frame_count as f64 * 100.0
                    );
                    let _ = std::io::stdout().flush();
                }
            }
            FrameResult::EndOfStream => break,
        }
    }
    wav.finalize()?;
    println!("\r100.0%");
    Ok(())
}

fn analyze(input: &Path) -> Result<()> {
    let file = BufReader::new(
        File::open(input).with_context(|| format!("cannot open {}", input.display()))?,
    );
    let reader = BitstreamReader::with_progress(file, |percent| {
        eprint!("\ranalyzing {percent:5.1}%");
    })?;
    eprintln!();

    let stats = reader.analysis();
    let first = &stats.frames[0];
    let frames: Vec<serde_json::Value> = stats
        .frames
        .iter()
        .map(|f| {
            serde_json::json!({
                "number": f.number,
                "timestamp": f.timestamp,
                "duration": f.duration,
                "sample_count": f.sample_count,
                "channels": f.channels,
                "compression": f.compression_label(),
                "data_length": f.data_length,
                "offset": f.offset,
            })
        })
        .collect();

    let dump = serde_json::json!({
        "sampling_rate": first.sample_rate,
        "channels": first.channels,
        "duration": stats.duration,
        "duration_samples": stats.total_samples,
        "frame_count": stats.frames.len(),
        "bitrate_minimum": stats.bitrate_minimum,
        "bitrate_average": stats.bitrate_average,
        "bitrate_maximum": stats.bitrate_maximum,
        "block_size_minimum": stats.block_size_minimum,
        "block_size_average": stats.block_size_average,
        "block_size_maximum": stats.block_size_maximum,
        "block_size_nominal": stats.block_size_nominal,
        "longest_silent_run": stats.longest_silent_run,
        "resync_events": reader.resync_events(),
        "compression_used": stats.compressions_used,
        "frames": frames,
    });
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}
