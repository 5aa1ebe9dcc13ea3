//! Dualtone CLI — real-time player and offline renderer for binaural,
//! isochronic and plain dual tones.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dualtone_engine::{
    CpalDevice, DynEngine, Engine, EngineConfig, EngineEvent, OfflineDevice, OutputDevice, RenderStrategy, ToneMode,
    VoiceParams, Waveform,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dualtone")]
#[command(about = "Binaural, isochronic and dual-tone generator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play through an audio output device
    Play {
        #[command(flatten)]
        tone: ToneArgs,

        /// Output device name (default: system default)
        #[arg(long)]
        device: Option<String>,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Session length in minutes (1-45); 0 disables the timer
        #[arg(long, default_value_t = 45)]
        minutes: u32,

        /// Mute output while keeping the volume setting
        #[arg(long)]
        muted: bool,
    },

    /// Render to a 16-bit stereo WAV file
    Render {
        #[command(flatten)]
        tone: ToneArgs,

        /// Output WAV path
        #[arg(short, long)]
        output: PathBuf,

        /// Length in seconds
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f64,
    },

    /// List audio output devices
    Devices,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    Binaural,
    Isochronic,
    Generator,
}

impl From<ModeArg> for ToneMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Binaural => ToneMode::Binaural,
            ModeArg::Isochronic => ToneMode::Isochronic,
            ModeArg::Generator => ToneMode::Generator,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum WaveArg {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl From<WaveArg> for Waveform {
    fn from(w: WaveArg) -> Self {
        match w {
            WaveArg::Sine => Waveform::Sine,
            WaveArg::Square => Waveform::Square,
            WaveArg::Triangle => Waveform::Triangle,
            WaveArg::Sawtooth => Waveform::Sawtooth,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StrategyArg {
    Buffered,
    Streaming,
}

impl From<StrategyArg> for RenderStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Buffered => RenderStrategy::Buffered,
            StrategyArg::Streaming => RenderStrategy::Streaming,
        }
    }
}

#[derive(Args, Debug)]
struct ToneArgs {
    #[arg(long, value_enum, default_value = "binaural")]
    mode: ModeArg,

    /// Left tone, or the carrier in isochronic mode (Hz)
    #[arg(long)]
    left: Option<f64>,

    /// Right tone (Hz)
    #[arg(long, conflicts_with = "beat")]
    right: Option<f64>,

    /// Beat frequency; sets right = left + beat (Hz)
    #[arg(long)]
    beat: Option<f64>,

    /// Isochronic pulse rate (Hz)
    #[arg(long)]
    pulse: Option<f64>,

    #[arg(long, value_enum, default_value = "sine")]
    wave: WaveArg,

    /// Signal amplitude in [0, 1]
    #[arg(long, default_value_t = 0.3)]
    amplitude: f64,

    /// Output gain in [0, 1]
    #[arg(long, default_value_t = 0.15)]
    volume: f64,

    #[arg(long, value_enum, default_value = "streaming")]
    strategy: StrategyArg,

    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,

    /// Buffered loop length in seconds
    #[arg(long, default_value_t = 300)]
    buffer_secs: u64,
}

impl ToneArgs {
    fn config(&self) -> EngineConfig {
        let mode = ToneMode::from(self.mode);
        let d = mode.defaults();
        let left = self.left.unwrap_or(d.left_hz);
        let right = match (self.right, self.beat) {
            (Some(r), _) => r,
            (None, Some(b)) => left + b,
            (None, None) if self.left.is_some() && mode == ToneMode::Isochronic => left,
            (None, None) => d.right_hz,
        };
        let voice = VoiceParams {
            left_hz: left,
            right_hz: right,
            pulse_hz: self.pulse.unwrap_or(d.pulse_hz),
            waveform: self.wave.into(),
            amplitude: self.amplitude,
            mode,
        };
        EngineConfig::default()
            .with_strategy(self.strategy.into())
            .with_sample_rate(self.sample_rate)
            .with_buffer_duration(Duration::from_secs(self.buffer_secs))
            .with_voice(voice)
            .with_volume(self.volume)
    }
}

fn build_engine(config: EngineConfig, device: Box<dyn OutputDevice>) -> Result<DynEngine> {
    let mut engine = Engine::with_strategy(config, device).context("invalid tone settings")?;
    engine.subscribe(|ev: &EngineEvent| match ev {
        EngineEvent::ErrorOccurred(m) => warn!("error: {m}"),
        EngineEvent::AudioDeviceError(m) => warn!("audio device: {m}"),
        EngineEvent::BufferUnderrun => warn!("buffer underrun"),
        EngineEvent::SessionCompleted => info!("session complete"),
        _ => {}
    });
    Ok(engine)
}

fn list_output_devices() -> Result<()> {
    println!("Available output devices:");
    for name in CpalDevice::output_device_names()? {
        println!("- {name}");
    }
    Ok(())
}

fn play(tone: &ToneArgs, device: Option<String>, duration: Option<u64>, minutes: u32, muted: bool) -> Result<()> {
    let session = (minutes > 0).then_some(minutes);
    let config = tone.config().with_session_minutes(session);
    let device = match device {
        Some(name) => CpalDevice::named(name),
        None => CpalDevice::new(),
    };
    let mut engine = build_engine(config, Box::new(device))?;
    if muted {
        engine.mute();
    }
    engine.start().context("could not start playback")?;

    println!("dualtone — {} ({})", engine.summary(), engine.strategy());
    if let Some(d) = duration {
        println!("Auto-stop after {d} seconds");
    }
    println!("Press Ctrl+C to stop…\n");

    let started = Instant::now();
    let limit = duration.map(Duration::from_secs);
    let mut last_report = Instant::now();
    loop {
        std::thread::sleep(Duration::from_millis(100));
        engine.service();
        if !engine.is_playing() {
            break;
        }
        if limit.is_some_and(|l| started.elapsed() >= l) {
            engine.stop();
            break;
        }
        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            info!(
                tone = %engine.summary(),
                level = engine.peak_level(),
                remaining = %engine.session_countdown(),
                "playing"
            );
        }
    }
    Ok(())
}

/// Frames pulled from the offline device per step.
const RENDER_CHUNK: usize = 1024;

fn render(tone: &ToneArgs, output: &Path, seconds: f64) -> Result<()> {
    if !(seconds.is_finite() && seconds > 0.0) {
        bail!("render length must be a positive number of seconds, got {seconds}");
    }
    let config = tone.config().with_session_minutes(None);
    let sample_rate = config.sample_rate;
    let device = OfflineDevice::new();
    let mut engine = build_engine(config, Box::new(device.clone()))?;
    engine.start().context("could not start offline render")?;

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let total = (seconds * f64::from(sample_rate)) as usize;
    let mut done = 0;
    let t0 = Instant::now();
    while done < total {
        let n = RENDER_CHUNK.min(total - done);
        for s in device.pull(n) {
            writer.write_sample(s)?;
        }
        done += n;
        engine.service();
    }
    writer.finalize()?;
    engine.stop();

    info!(
        frames = total,
        path = %output.display(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "render complete"
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Play { tone, device, duration, minutes, muted } => play(&tone, device, duration, minutes, muted),
        Commands::Render { tone, output, seconds } => render(&tone, &output, seconds),
        Commands::Devices => list_output_devices(),
    }
}
