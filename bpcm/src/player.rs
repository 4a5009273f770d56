//! Audio-device playback over the pull-model provider.
//!
//! The cpal output callback is the single consumer; the main thread handles
//! line-based control (quit, seek, rate change) and takes the mutex only for
//! short control operations.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use libbpcm::{
    BitstreamReader, StopReason, WaveProvider, RATE_CHANGE_SETTLE,
};

type Provider = WaveProvider<BufReader<File>>;

pub struct PlayerConfig {
    pub volume: f32,
    pub rate: f64,
    /// 0 selects the default output device
    pub device_index: usize,
}

pub fn play(path: &Path, config: PlayerConfig) -> Result<()> {
    let file = BufReader::new(
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
    );
    let reader = BitstreamReader::new(file)?;
    let mut provider = WaveProvider::new(reader, config.rate)?;
    provider.set_volume(config.volume);

    let duration = provider.duration();
    provider.set_position_callback(move |frame| {
        print!(
            "\r{:7.2}/{:.2} s  frame {:6}  {:10}  L {:6.1} dB  R {:6.1} dB   ",
            frame.timestamp,
            duration,
            frame.number,
            frame.compression_label(),
            frame.volume.peak_db[0],
            frame.volume.peak_db[1],
        );
        let _ = std::io::stdout().flush();
    });
    println!(
        "playing {} ({:.2} s, {} ch, {} Hz) - q quits, s <secs> seeks, r <factor> changes rate",
        path.display(),
        duration,
        provider.channels(),
        provider.native_sample_rate(),
    );

    let provider = Arc::new(Mutex::new(provider));
    let (stop_tx, stop_rx) = mpsc::channel::<StopReason>();
    let mut sink = Sink::create(&provider, &stop_tx, config.device_index)?;

    let (line_tx, line_rx) = mpsc::channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if line_tx.send(line.trim().to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    let reason = loop {
        if let Ok(reason) = stop_rx.try_recv() {
            break reason;
        }
        match line_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(command) => {
                if command == "q" {
                    break StopReason::StopRequested;
                } else if let Some(secs) = command
                    .strip_prefix("s ")
                    .and_then(|v| v.parse::<f64>().ok())
                {
                    let moved = provider.lock().unwrap().seek_to_timestamp(secs)?;
                    if !moved {
                        eprintln!("\nseek refused, try again");
                    }
                } else if let Some(factor) = command
                    .strip_prefix("r ")
                    .and_then(|v| v.parse::<f64>().ok())
                {
                    // the sink runs at a fixed rate, so a rate change is a
                    // full teardown and rebuild
                    drop(sink);
                    provider.lock().unwrap().set_rate_factor(factor);
                    std::thread::sleep(RATE_CHANGE_SETTLE);
                    sink = Sink::create(&provider, &stop_tx, config.device_index)?;
                } else if !command.is_empty() {
                    eprintln!("\ncommands: q | s <seconds> | r <factor>");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // stdin closed; keep playing until the stream ends
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    };

    drop(sink);
    println!("\nstopped: {reason:?}");
    Ok(())
}

struct Sink {
    _stream: cpal::Stream,
}

impl Sink {
    fn create(
        provider: &Arc<Mutex<Provider>>,
        stop: &Sender<StopReason>,
        device_index: usize,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let device = select_device(&host, device_index)?;
        let (channels, sample_rate) = {
            let p = provider.lock().unwrap();
            (p.channels() as u16, p.output_sample_rate())
        };
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let provider = Arc::clone(provider);
        let stop_end = stop.clone();
        let stop_err = stop.clone();
        let mut bytes: Vec<u8> = Vec::new();
        let stream = device.build_output_stream(
            &config,
            move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                bytes.resize(out.len() * 2, 0);
                let n = match provider.lock() {
                    Ok(mut p) => p.read(&mut bytes),
                    Err(_) => 0,
                };
                for (i, sample) in out.iter_mut().enumerate() {
                    let b = i * 2;
                    *sample = if b + 1 < n {
                        i16::from_le_bytes([bytes[b], bytes[b + 1]]) as f32 / 32768.0
                    } else {
                        0.0
                    };
                }
                if n == 0 {
                    let _ = stop_end.send(StopReason::EndOfStream);
                }
            },
            move |err| {
                let _ = stop_err.send(StopReason::DeviceError(err.to_string()));
            },
            None,
        )?;
        stream.play()?;
        Ok(Sink { _stream: stream })
    }
}

fn select_device(host: &cpal::Host, index: usize) -> Result<cpal::Device> {
    if index == 0 {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow!("no default output device"));
    }
    host.output_devices()
        .context("cannot enumerate output devices")?
        .nth(index - 1)
        .ok_or_else(|| anyhow!("no output device at index {index}"))
}
